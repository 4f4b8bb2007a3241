//! Inner join of incident counts and survey means on quarter and region.

use std::collections::BTreeMap;

use crime_wellbeing_analytics_models::{
    BucketKey, IncidentBucket, JoinMismatch, JoinOutcome, JoinedRow, MetricBucket, QuarterKey,
    round_reporting,
};

use crate::normalize_region;

fn join_key(quarter: QuarterKey, region: Option<&str>) -> BucketKey {
    BucketKey {
        quarter,
        region: region.and_then(normalize_region),
    }
}

/// Inner-joins incident buckets and survey buckets into the unified
/// quarterly table.
///
/// A row is emitted only for keys present on both sides. Keys present on
/// one side only are dropped and listed in [`JoinOutcome::mismatch`]. All
/// metric means for a key are merged into one row, rounded to the reporting
/// precision. Rows are ordered by quarter, then region.
///
/// `survey_buckets` is expected to hold one mean per key and metric, as
/// [`crate::aggregate_survey`] produces. A repeated key and metric keeps the
/// first mean and logs a warning.
#[must_use]
pub fn join_quarterly(
    incident_buckets: &[IncidentBucket],
    survey_buckets: &[MetricBucket],
) -> JoinOutcome {
    let mut incidents: BTreeMap<BucketKey, u64> = BTreeMap::new();
    for bucket in incident_buckets {
        *incidents
            .entry(join_key(bucket.quarter, bucket.region.as_deref()))
            .or_default() += bucket.count;
    }

    let mut surveys: BTreeMap<BucketKey, BTreeMap<String, f64>> = BTreeMap::new();
    for bucket in survey_buckets {
        if !bucket.mean.is_finite() {
            continue;
        }
        let key = join_key(bucket.quarter, bucket.region.as_deref());
        let metrics = surveys.entry(key).or_default();
        if metrics.contains_key(&bucket.metric) {
            log::warn!(
                "Duplicate survey bucket for {} {}, keeping the first mean",
                bucket.key(),
                bucket.metric
            );
            continue;
        }
        metrics.insert(bucket.metric.clone(), round_reporting(bucket.mean));
    }

    let mut rows = Vec::new();
    let mut mismatch = JoinMismatch::default();

    for (key, count) in &incidents {
        if let Some(metrics) = surveys.get(key) {
            rows.push(JoinedRow {
                quarter: key.quarter,
                region: key.region.clone(),
                incident_count: *count,
                metrics: metrics.clone(),
            });
        } else {
            mismatch.incident_only.push(key.clone());
        }
    }

    mismatch.survey_only = surveys
        .into_keys()
        .filter(|key| !incidents.contains_key(key))
        .collect();

    if rows.is_empty() && !(incidents.is_empty() && mismatch.survey_only.is_empty()) {
        log::warn!(
            "No matching quarters between incident and survey data ({} key(s) dropped)",
            mismatch.dropped()
        );
    } else if !mismatch.is_empty() {
        log::info!(
            "Joined {} quarter(s); dropped {} incident-only and {} survey-only key(s)",
            rows.len(),
            mismatch.incident_only.len(),
            mismatch.survey_only.len()
        );
    }

    JoinOutcome { rows, mismatch }
}
