#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Source adapters for the crime and well-being pipeline.
//!
//! Reads incident and survey CSV exports into
//! [`crime_wellbeing_source_models`] records. Column names and analysis
//! defaults come from a TOML [`config::PipelineConfig`].

pub mod config;
pub mod csv_file;
pub mod parsing;

pub use config::{PipelineConfig, parse_config_toml};
pub use csv_file::{
    read_group_scores, read_group_scores_file, read_incidents, read_incidents_file, read_survey,
    read_survey_file,
};

/// Errors that can occur while reading source data.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML configuration error.
    #[error("Config error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required column is absent from the CSV header.
    #[error("Missing column: {column}")]
    MissingColumn {
        /// The configured column name that was not found.
        column: String,
    },
}
