use crate::config::SignalThresholds;
use crate::types::Signal;

/// Map one day's sentiment statistics to a single [`Signal`].
///
/// Rules are checked top to bottom and the first match wins; see
/// [`SignalThresholds`] for the ordering. All comparisons are strict, so a
/// value sitting exactly on a cutoff does not trigger that rule.
///
/// Inputs must be finite. Non-finite values are a caller bug and are only
/// checked in debug builds.
pub fn classify(
    avg_sentiment: f64,
    sentiment_std: f64,
    news_volume: u32,
    thresholds: &SignalThresholds,
) -> Signal {
    debug_assert!(avg_sentiment.is_finite(), "avg_sentiment must be finite");
    debug_assert!(sentiment_std.is_finite(), "sentiment_std must be finite");

    if news_volume < thresholds.min_volume {
        return if thresholds.fold_low_coverage {
            Signal::Neutral
        } else {
            Signal::LowCoverage
        };
    }

    if sentiment_std > thresholds.volatility_ceiling {
        Signal::HighUncertainty
    } else if avg_sentiment > thresholds.positive_cutoff {
        Signal::PositiveMomentum
    } else if avg_sentiment < thresholds.negative_cutoff {
        Signal::Caution
    } else {
        Signal::Neutral
    }
}
