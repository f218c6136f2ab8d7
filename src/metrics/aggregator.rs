use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::config::SignalThresholds;
use crate::metrics::classifier::classify;
use crate::types::{DailyMetric, ScoredArticle, ScoredRecord};

/// Why a scored record was left out of aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordRejection {
    MissingScore,
    /// NaN or infinite score.
    NonFiniteScore,
    /// Finite score outside the signed sentiment range [-1, 1].
    OutOfRangeScore,
    /// `published_at` does not start with a `YYYY-MM-DD` calendar date.
    UnparsableDate,
}

impl std::fmt::Display for RecordRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecordRejection::MissingScore => "missing_score",
            RecordRejection::NonFiniteScore => "non_finite_score",
            RecordRejection::OutOfRangeScore => "out_of_range_score",
            RecordRejection::UnparsableDate => "unparsable_date",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    /// One metric per (asset, day), sorted by asset then date.
    pub metrics: Vec<DailyMetric>,
    /// Index into the input slice and the reason each record was dropped.
    pub rejected: Vec<(usize, RecordRejection)>,
}

/// Check a raw record and key it by calendar day.
///
/// The day is the first ten characters of `published_at`; no timezone
/// conversion is applied.
pub fn validate(record: &ScoredRecord) -> Result<ScoredArticle, RecordRejection> {
    let score = record.sentiment_score.ok_or(RecordRejection::MissingScore)?;
    if !score.is_finite() {
        return Err(RecordRejection::NonFiniteScore);
    }
    if !(-1.0..=1.0).contains(&score) {
        return Err(RecordRejection::OutOfRangeScore);
    }
    let day = record
        .published_at
        .get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .ok_or(RecordRejection::UnparsableDate)?;

    Ok(ScoredArticle {
        asset_id: record.asset_id,
        day,
        score,
    })
}

/// Population mean and standard deviation of a group of validated scores.
/// None for an empty group.
///
/// Scores are summed in ascending order so the result does not depend on the
/// order the caller collected them in. The mean is clamped to the observed
/// range to absorb rounding; the deviation is exactly 0 for a single score.
pub(crate) fn summarize(scores: &[f64]) -> Option<(f64, f64)> {
    let mut sorted = scores.to_vec();
    sorted.sort_by(f64::total_cmp);

    let min = *sorted.first()?;
    let max = *sorted.last()?;
    let n = sorted.len() as f64;
    let avg = (sorted.iter().sum::<f64>() / n).clamp(min, max);

    if sorted.len() == 1 {
        return Some((avg, 0.0));
    }

    let variance = sorted.iter().map(|s| (s - avg).powi(2)).sum::<f64>() / n;
    Some((avg, variance.sqrt()))
}

/// Group scored records by (asset, day) and reduce each group to a classified
/// [`DailyMetric`]. Malformed records are reported, never fatal.
pub fn aggregate(records: &[ScoredRecord], thresholds: &SignalThresholds) -> Aggregation {
    let mut groups: BTreeMap<(i64, NaiveDate), Vec<f64>> = BTreeMap::new();
    let mut rejected = Vec::new();

    for (idx, record) in records.iter().enumerate() {
        match validate(record) {
            Ok(article) => groups
                .entry((article.asset_id, article.day))
                .or_default()
                .push(article.score),
            Err(reason) => rejected.push((idx, reason)),
        }
    }

    let metrics = groups
        .into_iter()
        .filter_map(|((asset_id, metric_date), scores)| {
            let (avg_sentiment, sentiment_std) = summarize(&scores)?;
            let news_volume = scores.len() as u32;
            Some(DailyMetric {
                asset_id,
                metric_date,
                avg_sentiment,
                news_volume,
                sentiment_std,
                signal: classify(avg_sentiment, sentiment_std, news_volume, thresholds),
            })
        })
        .collect();

    Aggregation { metrics, rejected }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Signal;

    fn rec(asset_id: i64, published_at: &str, score: f64) -> ScoredRecord {
        ScoredRecord {
            asset_id,
            published_at: published_at.to_string(),
            sentiment_score: Some(score),
        }
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn thresholds(min_volume: u32) -> SignalThresholds {
        SignalThresholds {
            min_volume,
            fold_low_coverage: false,
            volatility_ceiling: 0.5,
            positive_cutoff: 0.15,
            negative_cutoff: -0.15,
        }
    }

    /// Small deterministic generator so the property checks need no extra crate.
    struct Lcg(u64);

    impl Lcg {
        fn next_score(&mut self) -> f64 {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((self.0 >> 11) as f64 / (1u64 << 53) as f64) * 2.0 - 1.0
        }
    }

    #[test]
    fn positive_momentum_example() {
        let records = vec![
            rec(1, "2024-03-01T09:00:00", 0.8),
            rec(1, "2024-03-01T12:30:00", 0.6),
            rec(1, "2024-03-01T18:45:00", 0.7),
        ];
        let out = aggregate(&records, &thresholds(3));
        assert!(out.rejected.is_empty());
        assert_eq!(out.metrics.len(), 1);

        let m = &out.metrics[0];
        assert_eq!(m.asset_id, 1);
        assert_eq!(m.metric_date, day("2024-03-01"));
        assert_eq!(m.news_volume, 3);
        assert!((m.avg_sentiment - 0.7).abs() < 1e-12);
        assert!((m.sentiment_std - 0.081_649_658).abs() < 1e-6);
        assert_eq!(m.signal, Signal::PositiveMomentum);
    }

    #[test]
    fn split_opinion_example_is_high_uncertainty() {
        let records = vec![rec(7, "2024-03-02T08:00:00", 0.9), rec(7, "2024-03-02T09:00:00", -0.9)];
        let out = aggregate(&records, &thresholds(2));
        let m = &out.metrics[0];
        assert!(m.avg_sentiment.abs() < 1e-12);
        assert!((m.sentiment_std - 0.9).abs() < 1e-12);
        assert_eq!(m.news_volume, 2);
        assert_eq!(m.signal, Signal::HighUncertainty);
    }

    #[test]
    fn single_score_is_low_coverage_with_zero_std() {
        let out = aggregate(&[rec(3, "2024-03-03T10:00:00", 0.05)], &thresholds(3));
        let m = &out.metrics[0];
        assert_eq!(m.sentiment_std, 0.0);
        assert_eq!(m.avg_sentiment, 0.05);
        assert_eq!(m.news_volume, 1);
        assert_eq!(m.signal, Signal::LowCoverage);
    }

    #[test]
    fn groups_by_asset_and_day_in_sorted_order() {
        let records = vec![
            rec(2, "2024-03-02T23:59:59", 0.1),
            rec(1, "2024-03-02T00:00:01", 0.2),
            rec(1, "2024-03-01T10:00:00", -0.3),
            rec(2, "2024-03-02T01:00:00", 0.3),
        ];
        let out = aggregate(&records, &thresholds(1));
        let keys: Vec<(i64, NaiveDate, u32)> = out
            .metrics
            .iter()
            .map(|m| (m.asset_id, m.metric_date, m.news_volume))
            .collect();
        assert_eq!(
            keys,
            vec![
                (1, day("2024-03-01"), 1),
                (1, day("2024-03-02"), 1),
                (2, day("2024-03-02"), 2),
            ]
        );
    }

    #[test]
    fn date_is_truncated_not_converted() {
        // 23:30 at -05:00 is the next day in UTC; truncation keeps the stated day.
        let out = aggregate(&[rec(1, "2024-03-01T23:30:00-05:00", 0.2)], &thresholds(1));
        assert_eq!(out.metrics[0].metric_date, day("2024-03-01"));
    }

    #[test]
    fn malformed_records_are_excluded_and_reported() {
        let records = vec![
            rec(1, "2024-03-01T10:00:00", 0.4),
            ScoredRecord {
                asset_id: 1,
                published_at: "2024-03-01T11:00:00".to_string(),
                sentiment_score: None,
            },
            rec(1, "2024-03-01T12:00:00", f64::NAN),
            rec(1, "2024-03-01T12:00:00", f64::INFINITY),
            rec(1, "not a date", 0.5),
            rec(1, "2024-13-40T00:00:00", 0.5),
            rec(1, "2024-03", 0.5),
        ];
        let out = aggregate(&records, &thresholds(1));
        assert_eq!(out.metrics.len(), 1);
        assert_eq!(out.metrics[0].news_volume, 1);
        assert_eq!(out.metrics[0].avg_sentiment, 0.4);
        assert_eq!(
            out.rejected,
            vec![
                (1, RecordRejection::MissingScore),
                (2, RecordRejection::NonFiniteScore),
                (3, RecordRejection::NonFiniteScore),
                (4, RecordRejection::UnparsableDate),
                (5, RecordRejection::UnparsableDate),
                (6, RecordRejection::UnparsableDate),
            ]
        );
    }

    #[test]
    fn out_of_range_scores_are_rejected_before_summarizing() {
        let records = vec![
            rec(1, "2024-03-01T10:00:00", 1e200),
            rec(1, "2024-03-01T11:00:00", -1e200),
            rec(1, "2024-03-01T12:00:00", 0.0),
            rec(1, "2024-03-01T13:00:00", 1.0),
            rec(1, "2024-03-01T14:00:00", -1.0),
            rec(1, "2024-03-01T15:00:00", 1.000_001),
        ];
        let out = aggregate(&records, &thresholds(1));
        assert_eq!(
            out.rejected,
            vec![
                (0, RecordRejection::OutOfRangeScore),
                (1, RecordRejection::OutOfRangeScore),
                (5, RecordRejection::OutOfRangeScore),
            ]
        );
        let m = &out.metrics[0];
        assert_eq!(m.news_volume, 3);
        assert!(m.sentiment_std.is_finite());
        assert!((m.sentiment_std - (2.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert_eq!(m.signal, Signal::HighUncertainty);
    }

    #[test]
    fn summarize_handles_empty_and_single() {
        assert_eq!(summarize(&[]), None);
        assert_eq!(summarize(&[-0.4]), Some((-0.4, 0.0)));
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let out = aggregate(&[], &thresholds(3));
        assert!(out.metrics.is_empty());
        assert!(out.rejected.is_empty());
    }

    #[test]
    fn average_stays_within_observed_range() {
        let mut rng = Lcg(42);
        for n in 1..40 {
            let scores: Vec<f64> = (0..n).map(|_| rng.next_score()).collect();
            let (avg, std) = summarize(&scores).unwrap();
            let min = scores.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            assert!(avg >= min && avg <= max, "avg {avg} outside [{min}, {max}]");
            assert!(std >= 0.0);
        }
        // Repeated values whose naive mean rounds above the value itself.
        let (avg, _) = summarize(&[0.1, 0.1, 0.1]).unwrap();
        assert!(avg <= 0.1);
    }

    #[test]
    fn result_is_independent_of_input_order() {
        let mut rng = Lcg(7);
        let forward: Vec<ScoredRecord> = (0..25)
            .map(|i| rec(i % 3, &format!("2024-03-0{}T10:00:00", 1 + i % 2), rng.next_score()))
            .collect();
        let mut reversed = forward.clone();
        reversed.reverse();
        let mut rotated = forward.clone();
        rotated.rotate_left(11);

        let t = thresholds(3);
        let a = aggregate(&forward, &t);
        assert_eq!(a.metrics, aggregate(&reversed, &t).metrics);
        assert_eq!(a.metrics, aggregate(&rotated, &t).metrics);

        // Bitwise, not just approximately, equal.
        for (x, y) in a.metrics.iter().zip(aggregate(&reversed, &t).metrics.iter()) {
            assert_eq!(x.avg_sentiment.to_bits(), y.avg_sentiment.to_bits());
            assert_eq!(x.sentiment_std.to_bits(), y.sentiment_std.to_bits());
        }
    }

    #[test]
    fn rerun_is_identical() {
        let records = vec![
            rec(1, "2024-03-01T10:00:00", 0.31),
            rec(1, "2024-03-01T11:00:00", -0.12),
            rec(1, "2024-03-01T12:00:00", 0.77),
        ];
        let t = thresholds(3);
        let first = aggregate(&records, &t);
        let second = aggregate(&records, &t);
        assert_eq!(
            serde_json::to_string(&first.metrics).unwrap(),
            serde_json::to_string(&second.metrics).unwrap()
        );
    }

    #[test]
    fn volume_matches_accepted_record_count() {
        let mut rng = Lcg(99);
        let records: Vec<ScoredRecord> = (0..60)
            .map(|i| rec(1 + i % 4, "2024-04-10T08:00:00", rng.next_score()))
            .collect();
        let out = aggregate(&records, &thresholds(3));
        let total: u32 = out.metrics.iter().map(|m| m.news_volume).sum();
        assert_eq!(total, 60);
        assert_eq!(out.metrics.len(), 4);
    }
}
