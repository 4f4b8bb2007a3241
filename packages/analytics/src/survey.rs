//! Survey aggregation of well-being scores into quarterly means.

use std::collections::BTreeMap;

use crime_wellbeing_analytics_models::{
    BucketKey, Granularity, MetricBucket, QuarterKey, SurveyAggregation, round_reporting,
};
use crime_wellbeing_source_models::SurveyScore;

use crate::normalize_region;

/// Running sum and observation count for one metric in one bucket.
#[derive(Default)]
struct MeanAccumulator {
    sum: f64,
    n: usize,
}

impl MeanAccumulator {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.n += 1;
    }

    #[allow(clippy::cast_precision_loss)]
    fn mean(&self) -> f64 {
        self.sum / self.n as f64
    }
}

/// Buckets survey scores into quarterly mean scores per metric.
///
/// Period labels are normalized to canonical quarter keys; unparseable
/// labels are skipped and counted in [`SurveyAggregation::skipped`]. Each
/// metric is averaged independently, so a group with missing values for one
/// metric still reports the others. A metric with no valid observations in
/// a group gets no bucket for that group.
#[must_use]
pub fn aggregate_survey(records: &[SurveyScore], granularity: Granularity) -> SurveyAggregation {
    let mut groups: BTreeMap<(BucketKey, String), MeanAccumulator> = BTreeMap::new();
    let mut skipped = 0;
    let mut missing = 0;

    for record in records {
        let quarter = match QuarterKey::from_label(&record.period) {
            Ok(quarter) => quarter,
            Err(e) => {
                log::debug!("Skipping survey score: {e}");
                skipped += 1;
                continue;
            }
        };

        let Some(score) = record.valid_score() else {
            missing += 1;
            continue;
        };

        let region = match granularity {
            Granularity::National => None,
            Granularity::Regional => normalize_region(&record.region),
        };

        groups
            .entry((BucketKey { quarter, region }, record.metric.clone()))
            .or_default()
            .push(score);
    }

    if skipped > 0 {
        log::warn!("Skipped {skipped} survey score(s) with unparseable period labels");
    }
    if missing > 0 {
        log::debug!("Ignored {missing} missing survey observation(s)");
    }

    let buckets: Vec<MetricBucket> = groups
        .into_iter()
        .map(|((key, metric), acc)| MetricBucket {
            quarter: key.quarter,
            region: key.region,
            metric,
            mean: round_reporting(acc.mean()),
        })
        .collect();

    log::debug!(
        "Aggregated {} survey score(s) into {} {granularity} bucket(s)",
        records.len() - skipped - missing,
        buckets.len()
    );

    SurveyAggregation { buckets, skipped }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIFE: &str = "Life_Satisfaction_Mean_Score";
    const ANXIETY: &str = "Anxiety_Mean_Score";

    fn score(period: &str, region: &str, metric: &str, value: Option<f64>) -> SurveyScore {
        SurveyScore::new(period, region, metric, value)
    }

    #[test]
    fn averages_each_metric_per_quarter() {
        let records = vec![
            score("2023 Q1", "London", LIFE, Some(7.2)),
            score("2023 Q1", "Wales", LIFE, Some(7.5)),
            score("2023 Q1", "London", ANXIETY, Some(3.1)),
            score("2023 Q1", "Wales", ANXIETY, Some(3.4)),
            score("2023 Q2", "London", LIFE, Some(7.0)),
        ];

        let result = aggregate_survey(&records, Granularity::National);

        let buckets: Vec<(String, &str, f64)> = result
            .buckets
            .iter()
            .map(|b| (b.quarter.to_string(), b.metric.as_str(), b.mean))
            .collect();
        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[0].0, "2023Q1");
        assert_eq!(buckets[0].1, ANXIETY);
        assert!((buckets[0].2 - 3.25).abs() < 1e-9);
        assert_eq!(buckets[1].1, LIFE);
        assert!((buckets[1].2 - 7.35).abs() < 1e-9);
        assert_eq!(buckets[2].0, "2023Q2");
        assert!((buckets[2].2 - 7.0).abs() < 1e-9);
    }

    #[test]
    fn rounds_means_to_two_decimals() {
        let records = vec![
            score("2023Q3", "London", LIFE, Some(7.0)),
            score("2023Q3", "Wales", LIFE, Some(7.0)),
            score("2023Q3", "Scotland", LIFE, Some(7.1)),
        ];

        let result = aggregate_survey(&records, Granularity::National);

        assert_eq!(result.buckets.len(), 1);
        assert!((result.buckets[0].mean - 7.03).abs() < 1e-9);
    }

    #[test]
    fn normalizes_period_labels_into_one_bucket() {
        let records = vec![
            score("2023 Q1", "London", LIFE, Some(7.0)),
            score("2023Q1", "London", LIFE, Some(8.0)),
            score("2023 q1", "London", LIFE, Some(9.0)),
        ];

        let result = aggregate_survey(&records, Granularity::National);

        assert_eq!(result.buckets.len(), 1);
        assert_eq!(result.buckets[0].quarter.to_string(), "2023Q1");
        assert!((result.buckets[0].mean - 8.0).abs() < 1e-9);
    }

    #[test]
    fn tolerates_partial_nulls_per_metric() {
        let records = vec![
            score("2023 Q1", "London", LIFE, Some(7.0)),
            score("2023 Q1", "London", ANXIETY, None),
            score("2023 Q1", "Wales", ANXIETY, Some(f64::NAN)),
            score("2023 Q2", "London", ANXIETY, Some(3.0)),
            score("2023 Q2", "London", LIFE, None),
        ];

        let result = aggregate_survey(&records, Granularity::National);

        let buckets: Vec<(String, &str)> = result
            .buckets
            .iter()
            .map(|b| (b.quarter.to_string(), b.metric.as_str()))
            .collect();
        assert_eq!(
            buckets,
            vec![("2023Q1".to_string(), LIFE), ("2023Q2".to_string(), ANXIETY)]
        );
        assert_eq!(result.skipped, 0);
    }

    #[test]
    fn skips_unparseable_periods() {
        let records = vec![
            score("2023 Q1", "London", LIFE, Some(7.0)),
            score("Spring 2023", "London", LIFE, Some(6.0)),
            score("2023 Q7", "London", LIFE, Some(6.0)),
        ];

        let result = aggregate_survey(&records, Granularity::National);

        assert_eq!(result.skipped, 2);
        assert_eq!(result.buckets.len(), 1);
    }

    #[test]
    fn regional_keeps_regions_apart() {
        let records = vec![
            score("2023 Q1", "Wales", LIFE, Some(7.5)),
            score("2023 Q1", "London", LIFE, Some(7.1)),
            score("2023 Q1", "London ", LIFE, Some(7.3)),
        ];

        let result = aggregate_survey(&records, Granularity::Regional);

        let buckets: Vec<(Option<&str>, f64)> = result
            .buckets
            .iter()
            .map(|b| (b.region.as_deref(), b.mean))
            .collect();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].0, Some("London"));
        assert!((buckets[0].1 - 7.2).abs() < 1e-9);
        assert_eq!(buckets[1].0, Some("Wales"));
        assert!((buckets[1].1 - 7.5).abs() < 1e-9);
    }

    #[test]
    fn reports_metric_names() {
        let records = vec![
            score("2023 Q1", "London", LIFE, Some(7.0)),
            score("2023 Q1", "London", ANXIETY, Some(3.0)),
        ];

        let result = aggregate_survey(&records, Granularity::National);

        let names: Vec<&str> = result.metric_names().into_iter().collect();
        assert_eq!(names, vec![ANXIETY, LIFE]);
    }
}
