#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Incident and survey record types.
//!
//! Ingestion adapters (CSV exports, spreadsheets, APIs) produce these
//! record types. The analytics pipeline consumes them without caring which
//! adapter produced them.

use serde::{Deserialize, Serialize};

/// A single reported incident as supplied by the source.
///
/// The timestamp is kept as the raw source string. Parsing happens during
/// aggregation so that unparseable values can be counted and skipped rather
/// than rejected at ingestion time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentRecord {
    /// When the incident occurred (e.g. `"2023-01"`, `"2023-01-05"`).
    pub timestamp: String,
    /// Source-specific incident category (e.g. `"Theft from the person"`).
    pub category: String,
    /// Reporting region or force area. `None` if the source lacks it.
    pub region: Option<String>,
    /// Latitude (WGS84).
    pub latitude: Option<f64>,
    /// Longitude (WGS84).
    pub longitude: Option<f64>,
}

impl IncidentRecord {
    /// Creates a record with only a timestamp and category.
    #[must_use]
    pub fn new(timestamp: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            category: category.into(),
            region: None,
            latitude: None,
            longitude: None,
        }
    }

    /// Sets the region.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Sets the coordinates.
    #[must_use]
    pub const fn with_location(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    /// Returns `(latitude, longitude)` when both are present and non-zero.
    #[must_use]
    pub fn location(&self) -> Option<(f64, f64)> {
        let latitude = self.latitude?;
        let longitude = self.longitude?;
        if latitude == 0.0 || longitude == 0.0 {
            return None;
        }
        Some((latitude, longitude))
    }
}

/// One observation of a well-being metric for a period and region.
///
/// Wide survey exports (one column per metric) are melted into one
/// `SurveyScore` per metric cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyScore {
    /// Period label as written in the source (e.g. `"2023 Q1"`).
    pub period: String,
    /// Region the score applies to.
    pub region: String,
    /// Metric name (e.g. `"Life_Satisfaction_Mean_Score"`).
    pub metric: String,
    /// Observed score. `None` when the source cell is empty.
    pub score: Option<f64>,
}

impl SurveyScore {
    /// Creates a score observation.
    #[must_use]
    pub fn new(
        period: impl Into<String>,
        region: impl Into<String>,
        metric: impl Into<String>,
        score: Option<f64>,
    ) -> Self {
        Self {
            period: period.into(),
            region: region.into(),
            metric: metric.into(),
            score,
        }
    }

    /// Returns the score if it is present and finite.
    #[must_use]
    pub fn valid_score(&self) -> Option<f64> {
        self.score.filter(|s| s.is_finite())
    }
}

/// One observation of a well-being metric for a period and demographic
/// group (an age band, a gender, ...).
///
/// `dimension` names the grouping column the observation came from, such
/// as `"Age_Group"` or `"Gender"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupScore {
    /// Period label as written in the source.
    pub period: String,
    /// Name of the grouping column.
    pub dimension: String,
    /// Group the score applies to (e.g. `"16-24"`).
    pub group: String,
    /// Metric name.
    pub metric: String,
    /// Observed score. `None` when the source cell is empty.
    pub score: Option<f64>,
}

impl GroupScore {
    /// Creates a group score observation.
    #[must_use]
    pub fn new(
        period: impl Into<String>,
        dimension: impl Into<String>,
        group: impl Into<String>,
        metric: impl Into<String>,
        score: Option<f64>,
    ) -> Self {
        Self {
            period: period.into(),
            dimension: dimension.into(),
            group: group.into(),
            metric: metric.into(),
            score,
        }
    }

    /// Returns the score if it is present and finite.
    #[must_use]
    pub fn valid_score(&self) -> Option<f64> {
        self.score.filter(|s| s.is_finite())
    }
}
