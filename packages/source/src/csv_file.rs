//! CSV readers for incident and survey exports.
//!
//! Both readers locate their columns by header name (per
//! [`crate::config::PipelineConfig`]) so column order does not matter.
//! The survey exports are wide (one column per metric) and are melted into
//! one [`SurveyScore`] or [`GroupScore`] per row and metric.

use std::{fs::File, io::Read, path::Path};

use crime_wellbeing_source_models::{GroupScore, IncidentRecord, SurveyScore};

use crate::{
    SourceError,
    config::{GroupColumns, IncidentColumns, SurveyColumns},
    parsing::{non_empty, parse_lat_lng_str, parse_score},
};

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
}

fn read_headers<R: Read>(reader: &mut csv::Reader<R>) -> Result<Vec<String>, SourceError> {
    Ok(reader
        .headers()?
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_owned())
        .collect())
}

fn require_column(headers: &[String], column: &str) -> Result<usize, SourceError> {
    find_column(headers, column).ok_or_else(|| SourceError::MissingColumn {
        column: column.to_owned(),
    })
}

fn find_column(headers: &[String], column: &str) -> Option<usize> {
    headers.iter().position(|h| h == column)
}

/// Resolves an optional column. A configured column that is absent from
/// the file is logged and ignored.
fn optional_column(headers: &[String], column: Option<&str>) -> Option<usize> {
    let column = column?;
    let index = find_column(headers, column);
    if index.is_none() {
        log::warn!("Optional column '{column}' not found in CSV header, ignoring");
    }
    index
}

/// Reads incident records from CSV.
///
/// # Errors
///
/// * [`SourceError::MissingColumn`] if the timestamp or category column is
///   absent from the header
/// * [`SourceError::Csv`] if the CSV is malformed
pub fn read_incidents<R: Read>(
    reader: R,
    columns: &IncidentColumns,
) -> Result<Vec<IncidentRecord>, SourceError> {
    let mut reader = csv_reader(reader);
    let headers = read_headers(&mut reader)?;

    let timestamp_idx = require_column(&headers, &columns.timestamp)?;
    let category_idx = require_column(&headers, &columns.category)?;
    let region_idx = optional_column(&headers, columns.region.as_deref());
    let latitude_idx = optional_column(&headers, columns.latitude.as_deref());
    let longitude_idx = optional_column(&headers, columns.longitude.as_deref());

    let mut records = Vec::new();
    for result in reader.records() {
        let row = result?;
        let cell = |i: usize| row.get(i).unwrap_or("");

        let mut record = IncidentRecord::new(cell(timestamp_idx), cell(category_idx));
        if let Some(region) = region_idx.and_then(|i| non_empty(cell(i))) {
            record = record.with_region(region);
        }
        if let Some((lat, lng)) =
            parse_lat_lng_str(latitude_idx.map(cell), longitude_idx.map(cell))
        {
            record = record.with_location(lat, lng);
        }
        records.push(record);
    }

    log::info!("Read {} incident records", records.len());
    Ok(records)
}

/// Reads incident records from a CSV file on disk.
///
/// # Errors
///
/// Returns [`SourceError::Io`] if the file cannot be opened, otherwise as
/// [`read_incidents`].
pub fn read_incidents_file(
    path: &Path,
    columns: &IncidentColumns,
) -> Result<Vec<IncidentRecord>, SourceError> {
    log::debug!("Opening incident CSV {}", path.display());
    read_incidents(File::open(path)?, columns)
}

/// Melts a wide CSV (one column per metric) keyed by a period column and
/// one more key column. `build` receives `(period, key, metric, score)` for
/// every row and metric column.
fn melt_wide<R: Read, T>(
    reader: R,
    period_column: &str,
    key_column: &str,
    metrics: &[String],
    build: impl Fn(&str, &str, &str, Option<f64>) -> T,
) -> Result<Vec<T>, SourceError> {
    let mut reader = csv_reader(reader);
    let headers = read_headers(&mut reader)?;

    let period_idx = require_column(&headers, period_column)?;
    let key_idx = require_column(&headers, key_column)?;

    let metric_columns: Vec<(usize, &str)> = if metrics.is_empty() {
        headers
            .iter()
            .enumerate()
            .filter(|(i, h)| *i != period_idx && *i != key_idx && !h.is_empty())
            .map(|(i, h)| (i, h.as_str()))
            .collect()
    } else {
        metrics
            .iter()
            .map(|metric| Ok((require_column(&headers, metric)?, metric.as_str())))
            .collect::<Result<_, SourceError>>()?
    };

    log::debug!(
        "Metric columns keyed by '{key_column}': {:?}",
        metric_columns.iter().map(|(_, m)| *m).collect::<Vec<_>>()
    );

    let mut values = Vec::new();
    let mut rows = 0_usize;
    for result in reader.records() {
        let row = result?;
        rows += 1;
        let cell = |i: usize| row.get(i).unwrap_or("");

        let period = cell(period_idx);
        let key = cell(key_idx);
        for &(idx, metric) in &metric_columns {
            values.push(build(period, key, metric, parse_score(cell(idx))));
        }
    }

    log::info!(
        "Read {rows} row(s) keyed by '{key_column}' ({} metric observations)",
        values.len()
    );
    Ok(values)
}

/// Reads a wide-format survey CSV and melts it into one [`SurveyScore`]
/// per row and metric column. Missing cells become `None` scores.
///
/// When `columns.metrics` is empty, every column other than the period and
/// region columns is treated as a metric.
///
/// # Errors
///
/// * [`SourceError::MissingColumn`] if the period, region, or a configured
///   metric column is absent from the header
/// * [`SourceError::Csv`] if the CSV is malformed
pub fn read_survey<R: Read>(
    reader: R,
    columns: &SurveyColumns,
) -> Result<Vec<SurveyScore>, SourceError> {
    melt_wide(
        reader,
        &columns.period,
        &columns.region,
        &columns.metrics,
        |period, region, metric, score| SurveyScore::new(period, region, metric, score),
    )
}

/// Reads a wide-format survey CSV file from disk.
///
/// # Errors
///
/// Returns [`SourceError::Io`] if the file cannot be opened, otherwise as
/// [`read_survey`].
pub fn read_survey_file(
    path: &Path,
    columns: &SurveyColumns,
) -> Result<Vec<SurveyScore>, SourceError> {
    log::debug!("Opening survey CSV {}", path.display());
    read_survey(File::open(path)?, columns)
}

/// Reads a wide-format demographic survey CSV (one row per period and
/// group) into [`GroupScore`]s. The group column's name becomes each
/// score's `dimension`.
///
/// # Errors
///
/// * [`SourceError::MissingColumn`] if the period, group, or a configured
///   metric column is absent from the header
/// * [`SourceError::Csv`] if the CSV is malformed
pub fn read_group_scores<R: Read>(
    reader: R,
    columns: &GroupColumns,
) -> Result<Vec<GroupScore>, SourceError> {
    let dimension = columns.group.as_str();
    melt_wide(
        reader,
        &columns.period,
        dimension,
        &columns.metrics,
        |period, group, metric, score| GroupScore::new(period, dimension, group, metric, score),
    )
}

/// Reads a wide-format demographic survey CSV file from disk.
///
/// # Errors
///
/// Returns [`SourceError::Io`] if the file cannot be opened, otherwise as
/// [`read_group_scores`].
pub fn read_group_scores_file(
    path: &Path,
    columns: &GroupColumns,
) -> Result<Vec<GroupScore>, SourceError> {
    log::debug!("Opening demographic survey CSV {}", path.display());
    read_group_scores(File::open(path)?, columns)
}
