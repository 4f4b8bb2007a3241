//! Category and region breakdowns layered on top of the quarterly table.
//!
//! These are the views a dashboard shows next to the headline join: which
//! categories dominate, where the latest incidents happened, and how one
//! category on its own tracks the well-being metrics.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crime_wellbeing_analytics_models::{
    CategoryCount, CategoryDeepDive, CategoryQuarterCount, Granularity, GroupMeans, JoinedRow,
    LocationPoint, Overview, QuarterKey, QuarterMetrics, RegionSummary, round_reporting,
};
use crime_wellbeing_source_models::{GroupScore, IncidentRecord, SurveyScore};

use crate::{aggregate_incidents, aggregate_survey, correlate_all, normalize_region};

/// Grouping key for a category: trimmed and lowercased, so spellings that
/// differ only in case or padding count as one category.
fn category_key(category: &str) -> String {
    category.trim().to_lowercase()
}

/// Maps each category key to the first spelling seen in `records`, used as
/// the display label for the group.
fn category_labels(records: &[IncidentRecord]) -> HashMap<String, &str> {
    let mut labels = HashMap::new();
    for record in records {
        labels
            .entry(category_key(&record.category))
            .or_insert_with(|| record.category.trim());
    }
    labels
}

fn label_for(labels: &HashMap<String, &str>, key: String) -> String {
    match labels.get(&key) {
        Some(label) => (*label).to_string(),
        None => key,
    }
}

/// Returns the records whose category is one of `categories`
/// (case-insensitive).
#[must_use]
pub fn filter_by_categories<S: AsRef<str>>(
    records: &[IncidentRecord],
    categories: &[S],
) -> Vec<IncidentRecord> {
    let wanted: BTreeSet<String> = categories
        .iter()
        .map(|c| category_key(c.as_ref()))
        .collect();
    records
        .iter()
        .filter(|r| wanted.contains(&category_key(&r.category)))
        .cloned()
        .collect()
}

/// Counts incidents per quarter and category, ordered by quarter then
/// category. Categories are grouped case-insensitively. Records with
/// unparseable timestamps are skipped.
#[must_use]
pub fn category_counts_by_quarter(records: &[IncidentRecord]) -> Vec<CategoryQuarterCount> {
    let labels = category_labels(records);
    let mut counts: BTreeMap<(QuarterKey, String), u64> = BTreeMap::new();
    for record in records {
        if let Ok(quarter) = QuarterKey::from_timestamp(&record.timestamp) {
            *counts
                .entry((quarter, category_key(&record.category)))
                .or_default() += 1;
        }
    }
    counts
        .into_iter()
        .map(|((quarter, key), count)| CategoryQuarterCount {
            quarter,
            category: label_for(&labels, key),
            count,
        })
        .collect()
}

/// Returns the `limit` most frequent categories, largest first (ties by
/// name). Categories are grouped case-insensitively. `share` is relative to
/// all records in the input.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn top_categories(records: &[IncidentRecord], limit: usize) -> Vec<CategoryCount> {
    let labels = category_labels(records);
    let mut counts: HashMap<String, u64> = HashMap::new();
    for record in records {
        *counts.entry(category_key(&record.category)).or_default() += 1;
    }

    let mut ranked: Vec<(String, u64)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(limit);

    let total = records.len() as f64;
    ranked
        .into_iter()
        .map(|(key, count)| CategoryCount {
            category: label_for(&labels, key),
            count,
            share: count as f64 / total,
        })
        .collect()
}

/// Returns the mappable incidents of the most recent quarter present in
/// `records`. Incidents without both coordinates are left out.
#[must_use]
pub fn latest_quarter_locations(records: &[IncidentRecord]) -> Vec<LocationPoint> {
    let dated: Vec<(QuarterKey, &IncidentRecord)> = records
        .iter()
        .filter_map(|r| {
            QuarterKey::from_timestamp(&r.timestamp)
                .ok()
                .map(|q| (q, r))
        })
        .collect();

    let Some(latest) = dated.iter().map(|(q, _)| *q).max() else {
        return Vec::new();
    };

    dated
        .into_iter()
        .filter(|(q, _)| *q == latest)
        .filter_map(|(quarter, record)| {
            let (latitude, longitude) = record.location()?;
            Some(LocationPoint {
                quarter,
                category: record.category.clone(),
                latitude,
                longitude,
            })
        })
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn metric_means<'a>(values: impl Iterator<Item = (&'a str, f64)>) -> BTreeMap<String, f64> {
    let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for (metric, value) in values {
        if value.is_finite() {
            let entry = sums.entry(metric).or_default();
            entry.0 += value;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(metric, (sum, n))| (metric.to_string(), round_reporting(sum / n as f64)))
        .collect()
}

/// Headline figures: total incident records, number of quarters in the
/// joined table, and each metric's mean across the joined table.
#[must_use]
pub fn overview(records: &[IncidentRecord], rows: &[JoinedRow]) -> Overview {
    let quarters: BTreeSet<QuarterKey> = rows.iter().map(|r| r.quarter).collect();
    Overview {
        total_incidents: records.len() as u64,
        quarters: quarters.len(),
        metric_means: metric_means(
            rows.iter()
                .flat_map(|r| r.metrics.iter().map(|(k, v)| (k.as_str(), *v))),
        ),
    }
}

/// Headline figures for one region: its incident total, each metric's
/// mean across the region's survey scores, and the region's metric means
/// per quarter.
#[must_use]
pub fn region_summary(
    records: &[IncidentRecord],
    scores: &[SurveyScore],
    region: &str,
) -> RegionSummary {
    let wanted = normalize_region(region);

    let total_incidents = records
        .iter()
        .filter(|r| r.region.as_deref().and_then(normalize_region) == wanted)
        .count() as u64;

    let region_scores: Vec<SurveyScore> = scores
        .iter()
        .filter(|s| normalize_region(&s.region) == wanted)
        .cloned()
        .collect();

    let metric_means = metric_means(
        region_scores
            .iter()
            .filter_map(|s| s.valid_score().map(|v| (s.metric.as_str(), v))),
    );

    let mut quarterly: BTreeMap<QuarterKey, BTreeMap<String, f64>> = BTreeMap::new();
    for bucket in aggregate_survey(&region_scores, Granularity::National).buckets {
        quarterly
            .entry(bucket.quarter)
            .or_default()
            .insert(bucket.metric, bucket.mean);
    }

    RegionSummary {
        region: wanted.unwrap_or_default(),
        total_incidents,
        metric_means,
        quarterly: quarterly
            .into_iter()
            .map(|(quarter, metrics)| QuarterMetrics { quarter, metrics })
            .collect(),
    }
}

/// Mean of each metric per demographic group, across all periods.
///
/// Groups are keyed by dimension and whitespace-normalized group name and
/// returned in that order. Missing scores are ignored; a group with no
/// valid scores is left out.
#[must_use]
pub fn demographic_means(scores: &[GroupScore]) -> Vec<GroupMeans> {
    let mut groups: BTreeMap<(&str, String), Vec<(&str, f64)>> = BTreeMap::new();
    for score in scores {
        let (Some(group), Some(value)) = (normalize_region(&score.group), score.valid_score())
        else {
            continue;
        };
        groups
            .entry((score.dimension.trim(), group))
            .or_default()
            .push((score.metric.as_str(), value));
    }

    groups
        .into_iter()
        .map(|((dimension, group), values)| GroupMeans {
            dimension: dimension.to_string(),
            group,
            observations: values.len(),
            metric_means: metric_means(values.into_iter()),
        })
        .collect()
}

/// Sets one category's quarterly counts against the joined table.
///
/// The category's counts are left-joined onto `rows`: every joined row is
/// kept, with `incident_count` replaced by the category's count for that
/// key, or zero where the category had none. The result is then correlated
/// against each metric.
#[must_use]
pub fn category_deep_dive(
    records: &[IncidentRecord],
    category: &str,
    rows: &[JoinedRow],
) -> CategoryDeepDive {
    let granularity = if rows.iter().any(|r| r.region.is_some()) {
        Granularity::Regional
    } else {
        Granularity::National
    };

    let filtered = filter_by_categories(records, &[category]);
    let counts: BTreeMap<_, _> = aggregate_incidents(&filtered, granularity)
        .buckets
        .into_iter()
        .map(|b| (b.key(), b.count))
        .collect();

    let rows: Vec<JoinedRow> = rows
        .iter()
        .map(|row| JoinedRow {
            incident_count: counts.get(&row.key()).copied().unwrap_or(0),
            ..row.clone()
        })
        .collect();

    let correlations = correlate_all(&rows);

    CategoryDeepDive {
        category: category.trim().to_string(),
        rows,
        correlations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIFE: &str = "Life_Satisfaction_Mean_Score";
    const ANXIETY: &str = "Anxiety_Mean_Score";

    fn records() -> Vec<IncidentRecord> {
        vec![
            IncidentRecord::new("2023-01", "Theft from the person")
                .with_region("London")
                .with_location(51.50, -0.12),
            IncidentRecord::new("2023-02", "Violence and sexual offences").with_region("London"),
            IncidentRecord::new("2023-04", "theft from the person")
                .with_region("Wales")
                .with_location(51.48, -3.18),
            IncidentRecord::new("2023-05", "Public order").with_region("London"),
            IncidentRecord::new("2023-06", "Theft from the person")
                .with_region("London")
                .with_location(51.52, -0.10),
            IncidentRecord::new("2023-06", "Public order").with_region("London"),
            IncidentRecord::new("garbage", "Public order"),
        ]
    }

    fn joined(quarter: &str, count: u64, life: f64) -> JoinedRow {
        JoinedRow {
            quarter: quarter.parse().unwrap(),
            region: None,
            incident_count: count,
            metrics: BTreeMap::from([(LIFE.to_string(), life)]),
        }
    }

    #[test]
    fn filters_categories_case_insensitively() {
        let filtered = filter_by_categories(&records(), &["THEFT FROM THE PERSON"]);
        assert_eq!(filtered.len(), 3);

        let filtered = filter_by_categories(&records(), &["Public order", "Robbery"]);
        assert_eq!(filtered.len(), 3);

        let none: [&str; 0] = [];
        assert!(filter_by_categories(&records(), &none).is_empty());
    }

    #[test]
    fn counts_categories_per_quarter() {
        let counts = category_counts_by_quarter(&records());

        let rows: Vec<(String, &str, u64)> = counts
            .iter()
            .map(|c| (c.quarter.to_string(), c.category.as_str(), c.count))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("2023Q1".to_string(), "Theft from the person", 1),
                ("2023Q1".to_string(), "Violence and sexual offences", 1),
                ("2023Q2".to_string(), "Public order", 2),
                ("2023Q2".to_string(), "Theft from the person", 2),
            ]
        );
    }

    #[test]
    fn ranks_top_categories() {
        let top = top_categories(&records(), 2);

        assert_eq!(top.len(), 2);
        assert_eq!(top[0].category, "Public order");
        assert_eq!(top[0].count, 3);
        assert!((top[0].share - 3.0 / 7.0).abs() < 1e-12);
        assert_eq!(top[1].category, "Theft from the person");
        assert_eq!(top[1].count, 3);
    }

    #[test]
    fn groups_categories_that_differ_in_case() {
        let records = vec![
            IncidentRecord::new("2023-01", "Theft"),
            IncidentRecord::new("2023-02", " theft "),
            IncidentRecord::new("2023-03", "Robbery"),
        ];

        let top = top_categories(&records, 10);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].category, "Theft");
        assert_eq!(top[0].count, 2);
        assert!((top[0].share - 2.0 / 3.0).abs() < 1e-12);

        let counts = category_counts_by_quarter(&records);
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[1].category, "Theft");
        assert_eq!(counts[1].count, 2);

        assert_eq!(filter_by_categories(&records, &["THEFT"]).len(), 2);
    }

    #[test]
    fn maps_latest_quarter_only() {
        let points = latest_quarter_locations(&records());

        assert_eq!(points.len(), 2);
        assert!(points.iter().all(|p| p.quarter.to_string() == "2023Q2"));
        assert!(points.iter().any(|p| (p.longitude - -3.18).abs() < 1e-9));
    }

    #[test]
    fn no_locations_without_dated_records() {
        let records = vec![IncidentRecord::new("unknown", "Theft").with_location(51.5, -0.1)];
        assert!(latest_quarter_locations(&records).is_empty());
    }

    #[test]
    fn summarizes_overview() {
        let rows = vec![joined("2023Q1", 2, 7.2), joined("2023Q2", 4, 7.5)];

        let summary = overview(&records(), &rows);

        assert_eq!(summary.total_incidents, 7);
        assert_eq!(summary.quarters, 2);
        assert!((summary.metric_means[LIFE] - 7.35).abs() < 1e-9);
    }

    #[test]
    fn summarizes_region() {
        let scores = vec![
            SurveyScore::new("2023 Q1", "London", LIFE, Some(7.0)),
            SurveyScore::new("2023 Q2", "London ", LIFE, Some(7.3)),
            SurveyScore::new("2023 Q2", "London", LIFE, None),
            SurveyScore::new("2023 Q1", "Wales", LIFE, Some(9.0)),
        ];

        let summary = region_summary(&records(), &scores, "London");

        assert_eq!(summary.region, "London");
        assert_eq!(summary.total_incidents, 5);
        assert!((summary.metric_means[LIFE] - 7.15).abs() < 1e-9);
    }

    #[test]
    fn region_summary_tracks_metrics_per_quarter() {
        let scores = vec![
            SurveyScore::new("2023 Q2", "London", LIFE, Some(7.3)),
            SurveyScore::new("2023 Q1", "London", LIFE, Some(7.0)),
            SurveyScore::new("2023 Q1", "London", ANXIETY, Some(3.1)),
            SurveyScore::new("2023 Q2", "London", ANXIETY, None),
            SurveyScore::new("2023 Q1", "Wales", LIFE, Some(9.0)),
            SurveyScore::new("not a quarter", "London", LIFE, Some(1.0)),
        ];

        let summary = region_summary(&records(), &scores, " London ");

        let quarters: Vec<String> = summary
            .quarterly
            .iter()
            .map(|q| q.quarter.to_string())
            .collect();
        assert_eq!(quarters, vec!["2023Q1", "2023Q2"]);
        assert_eq!(summary.quarterly[0].metrics.get(LIFE), Some(&7.0));
        assert_eq!(summary.quarterly[0].metrics.get(ANXIETY), Some(&3.1));
        assert_eq!(summary.quarterly[1].metrics.get(LIFE), Some(&7.3));
        assert!(!summary.quarterly[1].metrics.contains_key(ANXIETY));
    }

    #[test]
    fn region_summary_for_unknown_region_is_empty() {
        let scores = vec![SurveyScore::new("2023 Q1", "Wales", LIFE, Some(9.0))];

        let summary = region_summary(&records(), &scores, "Scotland");

        assert_eq!(summary.total_incidents, 0);
        assert!(summary.metric_means.is_empty());
        assert!(summary.quarterly.is_empty());
    }

    #[test]
    fn averages_metrics_per_demographic_group() {
        let scores = vec![
            GroupScore::new("2023 Q1", "Age_Group", "16-24", LIFE, Some(7.0)),
            GroupScore::new("2023 Q2", "Age_Group", "16-24", LIFE, Some(7.4)),
            GroupScore::new("2023 Q1", "Age_Group", "16-24", ANXIETY, Some(3.5)),
            GroupScore::new("2023 Q1", "Age_Group", "65+", LIFE, Some(7.9)),
            GroupScore::new("2023 Q2", "Age_Group", "65+", ANXIETY, None),
            GroupScore::new("2023 Q1", "Age_Group", "  ", LIFE, Some(5.0)),
        ];

        let groups = demographic_means(&scores);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].dimension, "Age_Group");
        assert_eq!(groups[0].group, "16-24");
        assert_eq!(groups[0].observations, 3);
        assert!((groups[0].metric_means[LIFE] - 7.2).abs() < 1e-9);
        assert!((groups[0].metric_means[ANXIETY] - 3.5).abs() < 1e-9);
        assert_eq!(groups[1].group, "65+");
        assert_eq!(groups[1].observations, 1);
        assert!(!groups[1].metric_means.contains_key(ANXIETY));
    }

    #[test]
    fn keeps_dimensions_apart() {
        let scores = vec![
            GroupScore::new("2023 Q1", "Gender", "Female", LIFE, Some(7.5)),
            GroupScore::new("2023 Q1", "Age_Group", "Female", LIFE, Some(6.0)),
        ];

        let groups = demographic_means(&scores);

        let keys: Vec<(&str, &str)> = groups
            .iter()
            .map(|g| (g.dimension.as_str(), g.group.as_str()))
            .collect();
        assert_eq!(keys, vec![("Age_Group", "Female"), ("Gender", "Female")]);
    }

    #[test]
    fn deep_dive_fills_missing_quarters_with_zero() {
        let rows = vec![
            joined("2022Q4", 10, 7.6),
            joined("2023Q1", 2, 7.4),
            joined("2023Q2", 4, 7.1),
        ];

        let dive = category_deep_dive(&records(), "Theft from the person", &rows);

        let counts: Vec<u64> = dive.rows.iter().map(|r| r.incident_count).collect();
        assert_eq!(counts, vec![0, 1, 2]);
        assert_eq!(dive.rows.len(), rows.len());
        assert_eq!(dive.correlations.len(), 1);
        assert_eq!(dive.correlations[0].metric, LIFE);
        assert!(dive.correlations[0].correlation.coefficient < 0.0);
    }
}
