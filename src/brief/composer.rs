use chrono::NaiveDate;

use crate::types::{Asset, DailyMetric, Signal};

/// Summary of one asset's daily metrics over the brief lookback window.
#[derive(Debug, Clone, PartialEq)]
pub struct BriefWindow {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    /// Mean of the daily averages (each day weighs the same).
    pub avg_sentiment: f64,
    pub total_volume: u64,
    /// Most frequent daily signal; ties go to the earliest day's signal.
    pub dominant_signal: Signal,
    pub days: usize,
}

impl BriefWindow {
    /// Returns None when there are no metrics to summarise.
    pub fn from_metrics(metrics: &[DailyMetric]) -> Option<Self> {
        let mut by_date: Vec<&DailyMetric> = metrics.iter().collect();
        by_date.sort_by_key(|m| m.metric_date);

        let first = by_date.first()?;
        let last = by_date.last()?;

        let avg_sentiment =
            by_date.iter().map(|m| m.avg_sentiment).sum::<f64>() / by_date.len() as f64;
        let total_volume = by_date.iter().map(|m| u64::from(m.news_volume)).sum();

        // (signal, count) in first-seen order; strict > keeps the earliest on ties.
        let mut counts: Vec<(Signal, usize)> = Vec::new();
        for m in &by_date {
            match counts.iter_mut().find(|(s, _)| *s == m.signal) {
                Some((_, c)) => *c += 1,
                None => counts.push((m.signal, 1)),
            }
        }
        let mut dominant = counts[0];
        for &entry in &counts[1..] {
            if entry.1 > dominant.1 {
                dominant = entry;
            }
        }

        Some(Self {
            period_start: first.metric_date,
            period_end: last.metric_date,
            avg_sentiment,
            total_volume,
            dominant_signal: dominant.0,
            days: by_date.len(),
        })
    }
}

/// Render the fixed-template brief. Same inputs always give the same text.
pub fn compose(asset: &Asset, window: &BriefWindow) -> String {
    let period = if window.period_start == window.period_end {
        format!("On {}", window.period_start)
    } else {
        format!("Between {} and {}", window.period_start, window.period_end)
    };

    format!(
        "{period}, {name} ({ticker}) received {volume} news mentions. \
         The average sentiment was {avg:.2}, indicating a {signal} environment. \
         Media coverage suggests sustained market attention.",
        name = asset.name,
        ticker = asset.ticker,
        volume = window.total_volume,
        avg = window.avg_sentiment,
        signal = window.dominant_signal.as_str().replace('_', " "),
    )
}
