#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Quarterly aggregation, join, correlation and forecast pipeline.
//!
//! Data flows left to right through pure functions:
//!
//! 1. [`aggregate_incidents`] buckets incident records into quarterly counts.
//! 2. [`aggregate_survey`] buckets survey scores into quarterly means.
//! 3. [`join_quarterly`] inner-joins the two on quarter (and region).
//! 4. [`correlate`] and [`forecast`] analyze the joined table.
//!
//! No function holds state between calls, so independent invocations can
//! run concurrently without coordination.

pub mod breakdown;
pub mod correlation;
pub mod distribution;
pub mod forecast;
pub mod join;
pub mod survey;
pub mod temporal;

use thiserror::Error;

pub use correlation::{correlate, correlate_all, correlate_metric};
pub use forecast::{forecast, forecast_by_region, forecast_series, national_totals};
pub use join::join_quarterly;
pub use survey::aggregate_survey;
pub use temporal::aggregate_incidents;

/// Errors that can occur during analytics operations.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Too few complete observations, or a constant series.
    #[error("Insufficient data: {message}")]
    InsufficientData {
        /// Description of what was missing.
        message: String,
    },

    /// Paired series have different lengths.
    #[error("Series length mismatch: {left} vs {right} values")]
    LengthMismatch {
        /// Length of the first series.
        left: usize,
        /// Length of the second series.
        right: usize,
    },

    /// Training data cannot support a trend fit.
    #[error("Degenerate input: {message}")]
    DegenerateInput {
        /// Description of what went wrong.
        message: String,
    },
}

/// Normalizes a region name for keying: trims and collapses internal
/// whitespace. Returns `None` for blank names.
#[must_use]
pub fn normalize_region(region: &str) -> Option<String> {
    let normalized = region.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}
