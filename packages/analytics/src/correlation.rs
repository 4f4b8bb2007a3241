//! Pearson correlation between incident volume and well-being metrics.

use std::collections::BTreeSet;

use crime_wellbeing_analytics_models::{Correlation, JoinedRow, MetricCorrelation};

use crate::AnalyticsError;
use crate::distribution::student_t_two_tailed;

/// Computes Pearson's r and its two-tailed p-value.
///
/// Accepts plain numbers or `Option`s. Pairs where either side is missing
/// or non-finite are dropped from both series before computing
/// (pairwise-complete cases). The p-value uses Student's t with `n - 2`
/// degrees of freedom; with exactly two pairs it is 1.
///
/// # Errors
///
/// * [`AnalyticsError::LengthMismatch`] if the series differ in length.
/// * [`AnalyticsError::InsufficientData`] if fewer than two complete pairs
///   remain or either series is constant.
#[allow(clippy::cast_precision_loss)]
pub fn correlate<X, Y>(x_values: &[X], y_values: &[Y]) -> Result<Correlation, AnalyticsError>
where
    X: Copy + Into<Option<f64>>,
    Y: Copy + Into<Option<f64>>,
{
    if x_values.len() != y_values.len() {
        return Err(AnalyticsError::LengthMismatch {
            left: x_values.len(),
            right: y_values.len(),
        });
    }

    let (xs, ys): (Vec<f64>, Vec<f64>) = x_values
        .iter()
        .zip(y_values)
        .filter_map(|(x, y)| {
            let x = (*x).into().filter(|v| v.is_finite())?;
            let y = (*y).into().filter(|v| v.is_finite())?;
            Some((x, y))
        })
        .unzip();

    let n = xs.len();
    if n < 2 {
        return Err(AnalyticsError::InsufficientData {
            message: format!("need at least 2 complete pairs, got {n}"),
        });
    }
    if is_constant(&xs) || is_constant(&ys) {
        return Err(AnalyticsError::InsufficientData {
            message: "series has zero variance".to_string(),
        });
    }

    let nf = n as f64;
    let mean_x = xs.iter().map(|x| x / nf).sum::<f64>();
    let mean_y = ys.iter().map(|y| y / nf).sum::<f64>();

    // Deviations are scaled to at most 1 in magnitude so the sums of
    // squares stay finite for very large inputs. r is scale-invariant.
    let scale_x = max_deviation(&xs, mean_x);
    let scale_y = max_deviation(&ys, mean_y);

    let mut sxx = 0.0;
    let mut syy = 0.0;
    let mut sxy = 0.0;
    for (x, y) in xs.iter().zip(&ys) {
        let dx = (x - mean_x) / scale_x;
        let dy = (y - mean_y) / scale_y;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }

    let coefficient = sxy / (sxx.sqrt() * syy.sqrt());
    if !coefficient.is_finite() {
        return Err(AnalyticsError::InsufficientData {
            message: "correlation is not finite for these values".to_string(),
        });
    }
    let coefficient = coefficient.clamp(-1.0, 1.0);
    let p_value = p_value(coefficient, n);

    Ok(Correlation {
        coefficient,
        p_value,
        n,
    })
}

#[allow(clippy::cast_precision_loss)]
fn p_value(r: f64, n: usize) -> f64 {
    if n <= 2 {
        return 1.0;
    }
    let df = (n - 2) as f64;
    let denominator = 1.0 - r * r;
    if denominator <= 0.0 {
        return 0.0;
    }
    let t = r * (df / denominator).sqrt();
    student_t_two_tailed(t, df).clamp(0.0, 1.0)
}

fn max_deviation(values: &[f64], mean: f64) -> f64 {
    values
        .iter()
        .map(|v| (v - mean).abs())
        .fold(0.0, f64::max)
}

fn is_constant(values: &[f64]) -> bool {
    let first = values[0];
    let tolerance = f64::EPSILON * first.abs().max(1.0);
    values.iter().all(|v| (v - first).abs() <= tolerance)
}

/// Correlates `incident_count` with one metric column of the joined table.
///
/// Rows without a value for `metric` count as missing.
///
/// # Errors
///
/// Returns [`AnalyticsError::InsufficientData`] if fewer than two rows carry
/// the metric or either column is constant.
#[allow(clippy::cast_precision_loss)]
pub fn correlate_metric(rows: &[JoinedRow], metric: &str) -> Result<Correlation, AnalyticsError> {
    let counts: Vec<f64> = rows.iter().map(|r| r.incident_count as f64).collect();
    let values: Vec<Option<f64>> = rows.iter().map(|r| r.metric(metric)).collect();
    correlate(&counts, &values)
}

/// Correlates `incident_count` with every metric present in the joined
/// table.
///
/// Metrics that cannot be correlated (too few rows, constant values) are
/// left out of the result.
#[must_use]
pub fn correlate_all(rows: &[JoinedRow]) -> Vec<MetricCorrelation> {
    let metrics: BTreeSet<&str> = rows
        .iter()
        .flat_map(|r| r.metrics.keys().map(String::as_str))
        .collect();

    metrics
        .into_iter()
        .filter_map(|metric| match correlate_metric(rows, metric) {
            Ok(correlation) => Some(MetricCorrelation {
                metric: metric.to_string(),
                correlation,
            }),
            Err(e) => {
                log::debug!("Not correlating {metric}: {e}");
                None
            }
        })
        .collect()
}
