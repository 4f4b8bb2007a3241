//! Pipeline orchestration for the CLI subcommands.
//!
//! Chains aggregate -> join -> analyze over records that have already been
//! read from disk, and packages the results into serializable reports.

use crime_wellbeing_analytics::{
    AnalyticsError, aggregate_incidents, aggregate_survey, breakdown, correlate_all,
    forecast_by_region, forecast_series, join_quarterly, national_totals,
};
use crime_wellbeing_analytics_models::{
    CategoryCount, CategoryQuarterCount, ForecastResult, Granularity, JoinMismatch, JoinedRow,
    LocationPoint, MetricCorrelation, Overview,
};
use crime_wellbeing_source_models::{IncidentRecord, SurveyScore};
use serde::Serialize;

/// The joined quarterly table plus the bookkeeping needed to judge it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuarterlyTable {
    /// Granularity the table was built at.
    pub granularity: Granularity,
    /// Survey metrics that produced at least one quarterly mean.
    pub metrics: Vec<String>,
    /// Joined rows, ascending by quarter then region.
    pub rows: Vec<JoinedRow>,
    /// Keys dropped by the join.
    pub mismatch: JoinMismatch,
    /// Incident records excluded for unparseable timestamps.
    pub incidents_skipped: usize,
    /// Survey observations excluded for unparseable period labels.
    pub survey_skipped: usize,
}

/// Aggregates both sources at `granularity` and joins them.
#[must_use]
pub fn quarterly_table(
    records: &[IncidentRecord],
    scores: &[SurveyScore],
    granularity: Granularity,
) -> QuarterlyTable {
    let incidents = aggregate_incidents(records, granularity);
    let survey = aggregate_survey(scores, granularity);

    let metrics: Vec<String> = survey
        .metric_names()
        .into_iter()
        .map(ToString::to_string)
        .collect();

    let outcome = join_quarterly(&incidents.buckets, &survey.buckets);
    log::debug!(
        "Joined {} row(s) from {} dated incident(s) and {} metric(s) at {granularity} granularity, {} key(s) dropped",
        outcome.rows.len(),
        incidents.total(),
        metrics.len(),
        outcome.mismatch.dropped()
    );

    QuarterlyTable {
        granularity,
        metrics,
        rows: outcome.rows,
        mismatch: outcome.mismatch,
        incidents_skipped: incidents.skipped,
        survey_skipped: survey.skipped,
    }
}

/// Forecast for one series, or the reason it could not be fitted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesForecast {
    /// Region the series belongs to, `None` for the national series.
    pub region: Option<String>,
    /// The fitted trend and predictions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast: Option<ForecastResult>,
    /// Why no forecast was produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SeriesForecast {
    fn new(region: Option<String>, result: Result<ForecastResult, AnalyticsError>) -> Self {
        match result {
            Ok(forecast) => Self {
                region,
                forecast: Some(forecast),
                error: None,
            },
            Err(e) => Self {
                region,
                forecast: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Forecasts the table's incident counts `horizon` quarters ahead.
///
/// A national table yields one series. A regional table yields one series
/// per region.
#[must_use]
pub fn forecasts(table: &QuarterlyTable, horizon: u32) -> Vec<SeriesForecast> {
    match table.granularity {
        Granularity::National => {
            let result = forecast_series(&national_totals(&table.rows), horizon);
            if let Err(e) = &result {
                log::warn!("Cannot forecast national series: {e}");
            }
            vec![SeriesForecast::new(None, result)]
        }
        Granularity::Regional => forecast_by_region(&table.rows, horizon)
            .into_iter()
            .map(|(region, result)| SeriesForecast::new(region, result))
            .collect(),
    }
}

/// Everything the `report` subcommand prints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Headline figures.
    pub overview: Overview,
    /// The joined table.
    pub table: QuarterlyTable,
    /// Incident count against each metric.
    pub correlations: Vec<MetricCorrelation>,
    /// Trend forecasts.
    pub forecasts: Vec<SeriesForecast>,
    /// Most frequent incident categories.
    pub top_categories: Vec<CategoryCount>,
}

/// Runs every analysis over the inputs.
#[must_use]
pub fn build_report(
    records: &[IncidentRecord],
    scores: &[SurveyScore],
    granularity: Granularity,
    horizon: u32,
    category_limit: usize,
) -> Report {
    let table = quarterly_table(records, scores, granularity);
    Report {
        overview: breakdown::overview(records, &table.rows),
        correlations: correlate_all(&table.rows),
        forecasts: forecasts(&table, horizon),
        top_categories: breakdown::top_categories(records, category_limit),
        table,
    }
}

/// Category-level view of the incident records.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryBreakdown {
    /// Most frequent categories with their share of all records.
    pub top_categories: Vec<CategoryCount>,
    /// Counts per quarter and category.
    pub by_quarter: Vec<CategoryQuarterCount>,
    /// Located incidents from the most recent quarter.
    pub latest_locations: Vec<LocationPoint>,
}

/// Breaks the records down by category, optionally restricted to
/// `categories` (case-insensitive). An empty filter keeps every record.
#[must_use]
pub fn category_breakdown(
    records: &[IncidentRecord],
    categories: &[String],
    limit: usize,
) -> CategoryBreakdown {
    let filtered = if categories.is_empty() {
        records.to_vec()
    } else {
        breakdown::filter_by_categories(records, categories)
    };

    CategoryBreakdown {
        top_categories: breakdown::top_categories(&filtered, limit),
        by_quarter: breakdown::category_counts_by_quarter(&filtered),
        latest_locations: breakdown::latest_quarter_locations(&filtered),
    }
}
