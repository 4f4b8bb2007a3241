//! Pipeline configuration.
//!
//! [`PipelineConfig`] maps source CSV columns onto record fields and holds
//! analysis defaults. A default configuration is embedded at compile time;
//! a user TOML file may override any subset of it.

use std::path::Path;

use crime_wellbeing_analytics_models::Granularity;
use serde::Deserialize;

use crate::SourceError;

/// Embedded default configuration.
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../config/default.toml");

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Incident CSV column names.
    pub incidents: IncidentColumns,
    /// Survey CSV column names.
    pub survey: SurveyColumns,
    /// Demographic survey CSV column names.
    pub demographics: GroupColumns,
    /// Analysis defaults.
    pub analysis: AnalysisConfig,
}

/// Column names in the incident CSV.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IncidentColumns {
    /// Column holding the incident timestamp (required).
    pub timestamp: String,
    /// Column holding the incident category (required).
    pub category: String,
    /// Column holding the region, if any.
    pub region: Option<String>,
    /// Column holding the latitude, if any.
    pub latitude: Option<String>,
    /// Column holding the longitude, if any.
    pub longitude: Option<String>,
}

impl Default for IncidentColumns {
    fn default() -> Self {
        Self {
            timestamp: "Month".to_string(),
            category: "Crime type".to_string(),
            region: Some("Falls within".to_string()),
            latitude: Some("Latitude".to_string()),
            longitude: Some("Longitude".to_string()),
        }
    }
}

/// Column names in the wide-format survey CSV.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SurveyColumns {
    /// Column holding the period label (required).
    pub period: String,
    /// Column holding the region (required).
    pub region: String,
    /// Metric columns to read. When empty, every column other than
    /// `period` and `region` is treated as a metric.
    pub metrics: Vec<String>,
}

impl Default for SurveyColumns {
    fn default() -> Self {
        Self {
            period: "Quarter".to_string(),
            region: "Area".to_string(),
            metrics: vec![
                "Life_Satisfaction_Mean_Score".to_string(),
                "Anxiety_Mean_Score".to_string(),
            ],
        }
    }
}

/// Column names in a wide-format demographic survey CSV (one row per
/// period and group).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GroupColumns {
    /// Column holding the period label (required).
    pub period: String,
    /// Column holding the group, e.g. `"Age_Group"` or `"Gender"`
    /// (required).
    pub group: String,
    /// Metric columns to read. When empty, every column other than
    /// `period` and `group` is treated as a metric.
    pub metrics: Vec<String>,
}

impl Default for GroupColumns {
    fn default() -> Self {
        Self {
            period: "Quarter".to_string(),
            group: "Age_Group".to_string(),
            metrics: SurveyColumns::default().metrics,
        }
    }
}

/// Analysis defaults used when the caller does not override them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Aggregation granularity.
    pub granularity: Granularity,
    /// Number of future quarters to forecast.
    pub horizon: u32,
    /// Number of categories in the top-categories breakdown.
    pub top_categories: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            granularity: Granularity::National,
            horizon: 4,
            top_categories: 6,
        }
    }
}

/// Parses a TOML string into a [`PipelineConfig`]. Fields not present in
/// the string keep their defaults.
///
/// # Errors
///
/// Returns [`SourceError::Toml`] if the TOML is malformed or contains
/// unknown keys.
pub fn parse_config_toml(toml_str: &str) -> Result<PipelineConfig, SourceError> {
    Ok(toml::de::from_str(toml_str)?)
}

impl PipelineConfig {
    /// Loads configuration from `path`, or the embedded default when no
    /// path is given.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, SourceError> {
        match path {
            Some(path) => {
                log::info!("Loading configuration from {}", path.display());
                let contents = std::fs::read_to_string(path)?;
                parse_config_toml(&contents)
            }
            None => parse_config_toml(DEFAULT_CONFIG_TOML),
        }
    }
}
