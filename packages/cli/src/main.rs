#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the quarterly crime and well-being pipeline.
//!
//! Every subcommand reads its inputs, runs the pipeline, and prints the
//! result as JSON on stdout. Logging goes to stderr, filtered by
//! `RUST_LOG`.

mod pipeline;

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use crime_wellbeing_analytics::{breakdown, correlate_all, correlate_metric};
use crime_wellbeing_analytics_models::{Granularity, MetricCorrelation};
use crime_wellbeing_source::{
    PipelineConfig, read_group_scores_file, read_incidents_file, read_survey_file,
};
use crime_wellbeing_source_models::{IncidentRecord, SurveyScore};
use serde::Serialize;

#[derive(Parser)]
#[command(
    name = "crime_wellbeing",
    about = "Quarterly crime and well-being analysis"
)]
struct Cli {
    /// TOML file overriding the default column mapping and analysis
    /// defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Incident and survey input files.
#[derive(Args)]
struct Inputs {
    /// Incident CSV export
    #[arg(long)]
    incidents: PathBuf,
    /// Wide-format survey CSV export
    #[arg(long)]
    survey: PathBuf,
    /// Keep regions apart instead of aggregating nationally
    #[arg(long)]
    regional: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the joined quarterly table
    Quarterly {
        #[command(flatten)]
        inputs: Inputs,
    },
    /// Correlate quarterly incident counts with survey metrics
    Correlate {
        #[command(flatten)]
        inputs: Inputs,
        /// Only correlate this metric
        #[arg(long)]
        metric: Option<String>,
    },
    /// Fit a linear trend to incident counts and extrapolate it
    Forecast {
        #[command(flatten)]
        inputs: Inputs,
        /// Number of future quarters to predict
        #[arg(long)]
        horizon: Option<u32>,
    },
    /// Break incidents down by category
    Categories {
        /// Incident CSV export
        #[arg(long)]
        incidents: PathBuf,
        /// Number of top categories to list
        #[arg(long)]
        limit: Option<usize>,
        /// Restrict to these categories (repeatable, case-insensitive)
        #[arg(long = "category")]
        categories: Vec<String>,
    },
    /// Summarize one region's incidents and survey scores
    Region {
        /// Incident CSV export
        #[arg(long)]
        incidents: PathBuf,
        /// Wide-format survey CSV export
        #[arg(long)]
        survey: PathBuf,
        /// Region name as it appears in both exports
        #[arg(long)]
        name: String,
    },
    /// Average survey metrics per demographic group (age band, gender, ...)
    Demographics {
        /// Wide-format demographic survey CSV export
        #[arg(long)]
        survey: PathBuf,
        /// Column holding the group (overrides the configured column,
        /// e.g. "Gender")
        #[arg(long)]
        group_column: Option<String>,
    },
    /// Correlate a single incident category with survey metrics
    DeepDive {
        #[command(flatten)]
        inputs: Inputs,
        /// Incident category to isolate
        #[arg(long)]
        category: String,
    },
    /// Run every analysis and print a combined report
    Report {
        #[command(flatten)]
        inputs: Inputs,
        /// Number of future quarters to predict
        #[arg(long)]
        horizon: Option<u32>,
    },
}

const fn granularity(regional: bool, config: &PipelineConfig) -> Granularity {
    if regional {
        Granularity::Regional
    } else {
        config.analysis.granularity
    }
}

fn load_incidents(
    path: &Path,
    config: &PipelineConfig,
) -> Result<Vec<IncidentRecord>, Box<dyn std::error::Error>> {
    Ok(read_incidents_file(path, &config.incidents)?)
}

fn load_inputs(
    inputs: &Inputs,
    config: &PipelineConfig,
) -> Result<(Vec<IncidentRecord>, Vec<SurveyScore>), Box<dyn std::error::Error>> {
    let records = load_incidents(&inputs.incidents, config)?;
    let scores = read_survey_file(&inputs.survey, &config.survey)?;
    Ok((records, scores))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let config = PipelineConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Quarterly { inputs } => {
            let (records, scores) = load_inputs(&inputs, &config)?;
            let table = pipeline::quarterly_table(
                &records,
                &scores,
                granularity(inputs.regional, &config),
            );
            print_json(&table)?;
        }
        Commands::Correlate { inputs, metric } => {
            let (records, scores) = load_inputs(&inputs, &config)?;
            let table = pipeline::quarterly_table(
                &records,
                &scores,
                granularity(inputs.regional, &config),
            );
            let correlations = if let Some(metric) = metric {
                let correlation = correlate_metric(&table.rows, &metric)?;
                vec![MetricCorrelation {
                    metric,
                    correlation,
                }]
            } else {
                correlate_all(&table.rows)
            };
            if correlations.is_empty() {
                log::warn!("No metric had enough complete quarters to correlate");
            }
            print_json(&correlations)?;
        }
        Commands::Forecast { inputs, horizon } => {
            let (records, scores) = load_inputs(&inputs, &config)?;
            let table = pipeline::quarterly_table(
                &records,
                &scores,
                granularity(inputs.regional, &config),
            );
            let horizon = horizon.unwrap_or(config.analysis.horizon);
            print_json(&pipeline::forecasts(&table, horizon))?;
        }
        Commands::Categories {
            incidents,
            limit,
            categories,
        } => {
            let records = load_incidents(&incidents, &config)?;
            let limit = limit.unwrap_or(config.analysis.top_categories);
            print_json(&pipeline::category_breakdown(&records, &categories, limit))?;
        }
        Commands::Region {
            incidents,
            survey,
            name,
        } => {
            let records = load_incidents(&incidents, &config)?;
            let scores = read_survey_file(&survey, &config.survey)?;
            print_json(&breakdown::region_summary(&records, &scores, &name))?;
        }
        Commands::Demographics {
            survey,
            group_column,
        } => {
            let mut columns = config.demographics;
            if let Some(group_column) = group_column {
                columns.group = group_column;
            }
            let scores = read_group_scores_file(&survey, &columns)?;
            print_json(&breakdown::demographic_means(&scores))?;
        }
        Commands::DeepDive { inputs, category } => {
            let (records, scores) = load_inputs(&inputs, &config)?;
            let table = pipeline::quarterly_table(
                &records,
                &scores,
                granularity(inputs.regional, &config),
            );
            print_json(&breakdown::category_deep_dive(
                &records,
                &category,
                &table.rows,
            ))?;
        }
        Commands::Report { inputs, horizon } => {
            let (records, scores) = load_inputs(&inputs, &config)?;
            let report = pipeline::build_report(
                &records,
                &scores,
                granularity(inputs.regional, &config),
                horizon.unwrap_or(config.analysis.horizon),
                config.analysis.top_categories,
            );
            log::info!(
                "Report covers {} quarter(s) and {} incident record(s)",
                report.overview.quarters,
                report.overview.total_incidents
            );
            print_json(&report)?;
        }
    }

    Ok(())
}
