//! Temporal aggregation of incident records into quarterly counts.

use std::collections::BTreeMap;

use crime_wellbeing_analytics_models::{
    BucketKey, Granularity, IncidentAggregation, IncidentBucket, QuarterKey,
};
use crime_wellbeing_source_models::IncidentRecord;

use crate::normalize_region;

/// Buckets incident records into quarterly counts.
///
/// Records whose timestamp cannot be parsed are skipped and counted in
/// [`IncidentAggregation::skipped`]. Under [`Granularity::Regional`],
/// records without a region are counted under the `None` region so the sum
/// of bucket counts always equals the number of parseable records.
#[must_use]
pub fn aggregate_incidents(
    records: &[IncidentRecord],
    granularity: Granularity,
) -> IncidentAggregation {
    let mut counts: BTreeMap<BucketKey, u64> = BTreeMap::new();
    let mut skipped = 0;

    for record in records {
        let quarter = match QuarterKey::from_timestamp(&record.timestamp) {
            Ok(quarter) => quarter,
            Err(e) => {
                log::debug!("Skipping incident: {e}");
                skipped += 1;
                continue;
            }
        };

        let region = match granularity {
            Granularity::National => None,
            Granularity::Regional => record.region.as_deref().and_then(normalize_region),
        };

        *counts.entry(BucketKey { quarter, region }).or_default() += 1;
    }

    if skipped > 0 {
        log::warn!("Skipped {skipped} incident record(s) with unparseable timestamps");
    }

    let buckets: Vec<IncidentBucket> = counts
        .into_iter()
        .map(|(key, count)| IncidentBucket {
            quarter: key.quarter,
            region: key.region,
            count,
        })
        .collect();

    log::debug!(
        "Aggregated {} incident record(s) into {} {granularity} bucket(s)",
        records.len() - skipped,
        buckets.len()
    );

    IncidentAggregation { buckets, skipped }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(year: i32, quarter: u8) -> QuarterKey {
        QuarterKey::new(year, quarter).unwrap()
    }

    #[test]
    fn buckets_theft_by_quarter() {
        let records = vec![
            IncidentRecord::new("2023-01-05", "theft"),
            IncidentRecord::new("2023-02-10", "theft"),
            IncidentRecord::new("2023-04-01", "theft"),
        ];

        let result = aggregate_incidents(&records, Granularity::National);

        let buckets: Vec<(String, u64)> = result
            .buckets
            .iter()
            .map(|b| (b.quarter.to_string(), b.count))
            .collect();
        assert_eq!(
            buckets,
            vec![("2023Q1".to_string(), 2), ("2023Q2".to_string(), 1)]
        );
        assert_eq!(result.skipped, 0);
    }

    #[test]
    fn skips_unparseable_timestamps() {
        let records = vec![
            IncidentRecord::new("2023-01", "Robbery"),
            IncidentRecord::new("", "Robbery"),
            IncidentRecord::new("last tuesday", "Robbery"),
            IncidentRecord::new("2023-11", "Robbery"),
        ];

        let result = aggregate_incidents(&records, Granularity::National);

        assert_eq!(result.skipped, 2);
        assert_eq!(result.total(), 2);
        assert_eq!(result.buckets.len(), 2);
    }

    #[test]
    fn total_matches_parseable_records() {
        let months = [
            "2022-12", "2023-01", "bad", "2023-06", "2023-06-30", "2024-02", "2022-13",
        ];
        let records: Vec<IncidentRecord> = months
            .iter()
            .enumerate()
            .map(|(i, m)| {
                let record = IncidentRecord::new(*m, "Theft");
                if i % 2 == 0 {
                    record.with_region("London")
                } else {
                    record
                }
            })
            .collect();

        for granularity in [Granularity::National, Granularity::Regional] {
            let result = aggregate_incidents(&records, granularity);
            assert_eq!(result.skipped, 2);
            assert_eq!(result.total(), 5, "{granularity}");
        }
    }

    #[test]
    fn output_sorted_and_unique() {
        let records = vec![
            IncidentRecord::new("2024-05", "Theft"),
            IncidentRecord::new("2023-08", "Theft"),
            IncidentRecord::new("2024-04", "Theft"),
            IncidentRecord::new("2023-01", "Theft"),
        ];

        let result = aggregate_incidents(&records, Granularity::National);

        let quarters: Vec<QuarterKey> = result.buckets.iter().map(|b| b.quarter).collect();
        assert_eq!(quarters, vec![q(2023, 1), q(2023, 3), q(2024, 2)]);
        assert_eq!(result.buckets[2].count, 2);
    }

    #[test]
    fn regional_partitions_by_region() {
        let records = vec![
            IncidentRecord::new("2023-01", "Theft").with_region("Wales"),
            IncidentRecord::new("2023-02", "Theft").with_region("London"),
            IncidentRecord::new("2023-03", "Theft").with_region(" London "),
            IncidentRecord::new("2023-03", "Theft"),
        ];

        let result = aggregate_incidents(&records, Granularity::Regional);

        let buckets: Vec<(Option<&str>, u64)> = result
            .buckets
            .iter()
            .map(|b| (b.region.as_deref(), b.count))
            .collect();
        assert_eq!(
            buckets,
            vec![(None, 1), (Some("London"), 2), (Some("Wales"), 1)]
        );
    }

    #[test]
    fn national_ignores_region() {
        let records = vec![
            IncidentRecord::new("2023-01", "Theft").with_region("Wales"),
            IncidentRecord::new("2023-02", "Theft").with_region("London"),
        ];

        let result = aggregate_incidents(&records, Granularity::National);

        assert_eq!(result.buckets.len(), 1);
        assert!(result.buckets[0].region.is_none());
        assert_eq!(result.buckets[0].count, 2);
    }

    #[test]
    fn empty_input_yields_no_buckets() {
        let result = aggregate_incidents(&[], Granularity::Regional);
        assert!(result.buckets.is_empty());
        assert_eq!(result.skipped, 0);
    }
}
