//! Linear trend forecast of quarterly incident volume.
//!
//! Each quarter in the training series gets a synthetic covariate
//! `x = 1..N` in ascending order and incident counts are regressed on it by
//! ordinary least squares. Future quarters continue the covariate and
//! regenerate their keys by rolling the last observed quarter forward.

use std::collections::BTreeMap;

use crime_wellbeing_analytics_models::{
    FittedPoint, ForecastResult, JoinedRow, PredictedPoint, QuarterKey,
};

use crate::AnalyticsError;

/// Largest number of future quarters a forecast will extrapolate.
pub const MAX_FORECAST_HORIZON: u32 = 400;

/// Fits a linear trend to the joined table's incident counts and
/// extrapolates `horizon` quarters past the last observed quarter.
///
/// Rows are ordered by quarter (then region) before fitting, so the input
/// order does not matter. For a regional table use [`national_totals`] or
/// [`forecast_by_region`] first; otherwise every row is one training point.
///
/// # Errors
///
/// Returns [`AnalyticsError::DegenerateInput`] if the table has fewer than
/// two rows, every row has the same incident count, or `horizon` exceeds
/// [`MAX_FORECAST_HORIZON`].
#[allow(clippy::cast_precision_loss)]
pub fn forecast(rows: &[JoinedRow], horizon: u32) -> Result<ForecastResult, AnalyticsError> {
    let mut ordered: Vec<&JoinedRow> = rows.iter().collect();
    ordered.sort_by_key(|row| row.key());

    let series: Vec<(QuarterKey, f64)> = ordered
        .iter()
        .map(|row| (row.quarter, row.incident_count as f64))
        .collect();

    forecast_series(&series, horizon)
}

/// Fits and extrapolates an already ordered `(quarter, value)` series.
///
/// # Errors
///
/// Returns [`AnalyticsError::DegenerateInput`] if the series has fewer than
/// two points, contains a non-finite value, has zero variance, or `horizon`
/// exceeds [`MAX_FORECAST_HORIZON`].
pub fn forecast_series(
    series: &[(QuarterKey, f64)],
    horizon: u32,
) -> Result<ForecastResult, AnalyticsError> {
    let n = series.len();
    if n < 2 {
        return Err(AnalyticsError::DegenerateInput {
            message: format!("need at least 2 quarters to fit a trend, got {n}"),
        });
    }
    let n_points = u32::try_from(n).map_err(|_| AnalyticsError::DegenerateInput {
        message: format!("training series too long ({n} points)"),
    })?;
    if horizon > MAX_FORECAST_HORIZON || n_points.checked_add(horizon).is_none() {
        return Err(AnalyticsError::DegenerateInput {
            message: format!(
                "forecast horizon {horizon} exceeds the maximum of {MAX_FORECAST_HORIZON} quarters"
            ),
        });
    }
    if series.iter().any(|(_, y)| !y.is_finite()) {
        return Err(AnalyticsError::DegenerateInput {
            message: "training series contains non-finite values".to_string(),
        });
    }

    let nf = f64::from(n_points);
    let mean_x = (nf + 1.0) / 2.0;
    let mean_y = series.iter().map(|(_, y)| y).sum::<f64>() / nf;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    let mut ss_tot = 0.0;
    for (x, (_, y)) in (1..=n_points).zip(series) {
        let dx = f64::from(x) - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        sxy += dx * dy;
        ss_tot += dy * dy;
    }

    let first = series[0].1;
    let constant = series
        .iter()
        .all(|(_, y)| (y - first).abs() <= f64::EPSILON * first.abs().max(1.0));
    if constant {
        return Err(AnalyticsError::DegenerateInput {
            message: "incident counts have zero variance".to_string(),
        });
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    let mut ss_res = 0.0;
    let fitted: Vec<FittedPoint> = (1..=n_points)
        .zip(series)
        .map(|(index, (quarter, actual))| {
            let fitted = intercept + slope * f64::from(index);
            ss_res += (actual - fitted).powi(2);
            FittedPoint {
                quarter: *quarter,
                index,
                actual: *actual,
                fitted,
            }
        })
        .collect();

    let r_squared = 1.0 - ss_res / ss_tot;

    let last = series
        .iter()
        .map(|(quarter, _)| *quarter)
        .max()
        .unwrap_or(series[n - 1].0);

    let predicted = (1..=horizon)
        .map(|step| {
            let quarter = last.advance(step).ok_or_else(|| AnalyticsError::DegenerateInput {
                message: format!("forecast horizon {horizon} runs past the last representable year"),
            })?;
            let index = n_points + step;
            Ok(PredictedPoint {
                quarter,
                index,
                predicted: intercept + slope * f64::from(index),
            })
        })
        .collect::<Result<Vec<_>, AnalyticsError>>()?;

    log::debug!(
        "Fitted trend over {n} quarter(s): slope={slope:.3}, intercept={intercept:.3}, R²={r_squared:.3}"
    );

    Ok(ForecastResult {
        slope,
        intercept,
        r_squared,
        fitted,
        predicted,
    })
}

/// Collapses a (possibly regional) joined table into one total incident
/// count per quarter, ordered by quarter.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn national_totals(rows: &[JoinedRow]) -> Vec<(QuarterKey, f64)> {
    let mut totals: BTreeMap<QuarterKey, u64> = BTreeMap::new();
    for row in rows {
        *totals.entry(row.quarter).or_default() += row.incident_count;
    }
    totals
        .into_iter()
        .map(|(quarter, count)| (quarter, count as f64))
        .collect()
}

/// Forecasts each region of a regional joined table independently.
///
/// Regions whose series cannot be fitted map to their error rather than
/// failing the whole call.
#[must_use]
pub fn forecast_by_region(
    rows: &[JoinedRow],
    horizon: u32,
) -> BTreeMap<Option<String>, Result<ForecastResult, AnalyticsError>> {
    let mut partitions: BTreeMap<Option<String>, Vec<JoinedRow>> = BTreeMap::new();
    for row in rows {
        partitions
            .entry(row.region.clone())
            .or_default()
            .push(row.clone());
    }

    partitions
        .into_iter()
        .map(|(region, rows)| {
            let result = forecast(&rows, horizon);
            if let Err(e) = &result {
                log::warn!(
                    "Cannot forecast region {}: {e}",
                    region.as_deref().unwrap_or("(none)")
                );
            }
            (region, result)
        })
        .collect()
}
