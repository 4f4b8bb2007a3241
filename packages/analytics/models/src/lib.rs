#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Quarter keys, aggregate buckets and result types for the quarterly
//! analytics pipeline.
//!
//! Every type here is derived data: produced by one pipeline invocation,
//! read by the caller, and never mutated afterwards.

pub mod quarter;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

pub use quarter::QuarterKey;

/// Number of decimal digits reported for means and merged values.
pub const REPORTING_DECIMALS: i32 = 2;

/// Rounds a value to [`REPORTING_DECIMALS`] decimal digits.
#[must_use]
pub fn round_reporting(value: f64) -> f64 {
    let factor = 10f64.powi(REPORTING_DECIMALS);
    (value * factor).round() / factor
}

/// Errors produced when a timestamp or period label cannot be interpreted
/// as a calendar quarter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Timestamp did not match any supported date format.
    #[error("Unparseable timestamp '{value}'")]
    InvalidTimestamp {
        /// The raw timestamp.
        value: String,
    },

    /// Period label is not a recognizable quarter.
    #[error("Unparseable period label '{value}': expected a form like 2023Q1 or 2023 Q1")]
    InvalidPeriod {
        /// The raw period label.
        value: String,
    },

    /// Quarter number outside 1-4.
    #[error("Invalid quarter number {quarter}: expected 1-4")]
    InvalidQuarter {
        /// The invalid quarter number.
        quarter: u8,
    },
}

/// Whether aggregation keeps regions apart or folds them together.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Granularity {
    /// One bucket per quarter.
    #[default]
    National,
    /// One bucket per quarter and region.
    Regional,
}

/// Join key shared by both aggregators: a quarter and, under regional
/// granularity, a region.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketKey {
    /// Calendar quarter.
    pub quarter: QuarterKey,
    /// Region, `None` under national granularity.
    pub region: Option<String>,
}

impl std::fmt::Display for BucketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.region {
            Some(region) => write!(f, "{} ({region})", self.quarter),
            None => write!(f, "{}", self.quarter),
        }
    }
}

/// Incident count for one quarter (and optional region).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentBucket {
    /// Calendar quarter.
    pub quarter: QuarterKey,
    /// Region, `None` under national granularity.
    pub region: Option<String>,
    /// Number of incidents.
    pub count: u64,
}

impl IncidentBucket {
    /// Returns the join key for this bucket.
    #[must_use]
    pub fn key(&self) -> BucketKey {
        BucketKey {
            quarter: self.quarter,
            region: self.region.clone(),
        }
    }
}

/// Mean score of one metric for one quarter (and optional region).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricBucket {
    /// Calendar quarter.
    pub quarter: QuarterKey,
    /// Region, `None` under national granularity.
    pub region: Option<String>,
    /// Metric name.
    pub metric: String,
    /// Arithmetic mean, rounded to [`REPORTING_DECIMALS`].
    pub mean: f64,
}

impl MetricBucket {
    /// Returns the join key for this bucket.
    #[must_use]
    pub fn key(&self) -> BucketKey {
        BucketKey {
            quarter: self.quarter,
            region: self.region.clone(),
        }
    }
}

/// Output of the temporal aggregator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentAggregation {
    /// Buckets sorted ascending by quarter, then region.
    pub buckets: Vec<IncidentBucket>,
    /// Records excluded because their timestamp could not be parsed.
    pub skipped: usize,
}

impl IncidentAggregation {
    /// Sum of all bucket counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.buckets.iter().map(|b| b.count).sum()
    }
}

/// Output of the survey aggregator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyAggregation {
    /// Buckets sorted ascending by quarter, region, then metric.
    pub buckets: Vec<MetricBucket>,
    /// Records excluded because their period label could not be parsed.
    pub skipped: usize,
}

impl SurveyAggregation {
    /// Distinct metric names present in the buckets.
    #[must_use]
    pub fn metric_names(&self) -> BTreeSet<&str> {
        self.buckets.iter().map(|b| b.metric.as_str()).collect()
    }
}

/// One row of the unified quarterly table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedRow {
    /// Calendar quarter.
    pub quarter: QuarterKey,
    /// Region, `None` under national granularity.
    pub region: Option<String>,
    /// Incident count for this key.
    pub incident_count: u64,
    /// Mean score per metric name.
    pub metrics: BTreeMap<String, f64>,
}

impl JoinedRow {
    /// Returns the mean for `metric`, if this row has one.
    #[must_use]
    pub fn metric(&self, metric: &str) -> Option<f64> {
        self.metrics.get(metric).copied()
    }

    /// Returns the join key for this row.
    #[must_use]
    pub fn key(&self) -> BucketKey {
        BucketKey {
            quarter: self.quarter,
            region: self.region.clone(),
        }
    }
}

/// Keys that appeared on only one side of a join.
///
/// A mismatch is informational: unmatched keys are dropped from the joined
/// table, not treated as an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinMismatch {
    /// Keys with incident counts but no survey means.
    pub incident_only: Vec<BucketKey>,
    /// Keys with survey means but no incident counts.
    pub survey_only: Vec<BucketKey>,
}

impl JoinMismatch {
    /// Total number of dropped keys.
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.incident_only.len() + self.survey_only.len()
    }

    /// Whether every key matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dropped() == 0
    }
}

/// Output of the joiner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinOutcome {
    /// Joined rows sorted ascending by quarter, then region.
    pub rows: Vec<JoinedRow>,
    /// Keys dropped because they appeared on only one side.
    pub mismatch: JoinMismatch,
}

/// Pearson correlation between two series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Correlation {
    /// Pearson's r, in [-1, 1].
    pub coefficient: f64,
    /// Two-tailed p-value for the null hypothesis r = 0.
    pub p_value: f64,
    /// Number of complete pairs used.
    pub n: usize,
}

/// Correlation between incident volume and one named metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricCorrelation {
    /// Metric name.
    pub metric: String,
    /// Correlation result.
    #[serde(flatten)]
    pub correlation: Correlation,
}

/// A training-domain point of a linear trend fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FittedPoint {
    /// Calendar quarter.
    pub quarter: QuarterKey,
    /// Synthetic covariate (1-based position in quarter order).
    pub index: u32,
    /// Observed incident count.
    pub actual: f64,
    /// Value on the fitted line.
    pub fitted: f64,
}

/// An extrapolated point beyond the training domain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictedPoint {
    /// Calendar quarter, advanced from the last observed quarter.
    pub quarter: QuarterKey,
    /// Synthetic covariate continuing the training sequence.
    pub index: u32,
    /// Predicted incident count.
    pub predicted: f64,
}

/// Linear trend fit and extrapolation of incident volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastResult {
    /// Change in incidents per quarter.
    pub slope: f64,
    /// Fitted value at index 0.
    pub intercept: f64,
    /// Coefficient of determination over the training domain.
    pub r_squared: f64,
    /// Fitted values over the training domain.
    pub fitted: Vec<FittedPoint>,
    /// Predictions for the requested future quarters.
    pub predicted: Vec<PredictedPoint>,
}

/// Incident count for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    /// Category name as supplied by the source.
    pub category: String,
    /// Number of incidents.
    pub count: u64,
    /// Fraction of all incidents in the input, 0.0-1.0.
    pub share: f64,
}

/// Incident count for one category in one quarter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryQuarterCount {
    /// Calendar quarter.
    pub quarter: QuarterKey,
    /// Category name.
    pub category: String,
    /// Number of incidents.
    pub count: u64,
}

/// A mappable incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationPoint {
    /// Calendar quarter.
    pub quarter: QuarterKey,
    /// Category name.
    pub category: String,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
}

/// Headline figures for a dataset pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    /// Number of incident records supplied.
    pub total_incidents: u64,
    /// Number of quarters in the joined table.
    pub quarters: usize,
    /// Mean of each metric across the joined table.
    pub metric_means: BTreeMap<String, f64>,
}

/// Headline figures for a single region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionSummary {
    /// Region name.
    pub region: String,
    /// Incidents recorded in the region.
    pub total_incidents: u64,
    /// Mean of each metric across the region's survey scores.
    pub metric_means: BTreeMap<String, f64>,
    /// The region's metric means per quarter, ascending by quarter.
    pub quarterly: Vec<QuarterMetrics>,
}

/// Metric means for one quarter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuarterMetrics {
    /// Calendar quarter.
    pub quarter: QuarterKey,
    /// Mean score per metric name.
    pub metrics: BTreeMap<String, f64>,
}

/// Metric means for one demographic group, across all periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMeans {
    /// Grouping column the group belongs to (e.g. `"Age_Group"`).
    pub dimension: String,
    /// Group name.
    pub group: String,
    /// Number of valid observations behind the means.
    pub observations: usize,
    /// Mean score per metric name.
    pub metric_means: BTreeMap<String, f64>,
}

/// One category's quarterly counts set against the well-being metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDeepDive {
    /// Category name.
    pub category: String,
    /// Joined rows with `incident_count` replaced by the category's count
    /// (zero where the category had no incidents that quarter).
    pub rows: Vec<JoinedRow>,
    /// Correlation of the category count with each metric.
    pub correlations: Vec<MetricCorrelation>,
}
