use std::str::FromStr;

use crate::error::{AppError, Result};
use crate::types::BriefMode;

pub const GOOGLE_NEWS_URL: &str = "https://news.google.com";
pub const INFERENCE_URL: &str = "https://api-inference.huggingface.co";
pub const SENTIMENT_MODEL: &str = "ProsusAI/finbert";
pub const GENERATION_MODEL: &str = "mistralai/Mistral-7B-Instruct-v0.2";

/// Model name recorded for briefs written from the fixed template.
pub const TEMPLATE_MODEL_NAME: &str = "rule_based_v1";

/// Source label stored on every article pulled from the RSS search feed.
pub const NEWS_SOURCE_NAME: &str = "Google News";

/// FinBERT's input window; longer texts are cut before scoring.
pub const SENTIMENT_MAX_CHARS: usize = 512;

/// Length of the article summary kept alongside each NLP row.
pub const SUMMARY_MAX_CHARS: usize = 300;

/// Token budget for generated briefs.
pub const GENERATION_MAX_NEW_TOKENS: u32 = 200;

/// Default page sizes for the read-only API.
pub const DEFAULT_METRICS_LIMIT: i64 = 30;
pub const DEFAULT_NEWS_LIMIT: i64 = 10;

/// Default signal thresholds. Overridable through the SIGNAL_* variables.
pub mod signal_defaults {
    pub const MIN_VOLUME: u32 = 3;
    pub const VOLATILITY_CEILING: f64 = 0.5;
    pub const POSITIVE_CUTOFF: f64 = 0.15;
    pub const NEGATIVE_CUTOFF: f64 = -0.15;
}

/// Cutoffs used to map a day's sentiment statistics to a [`crate::types::Signal`].
///
/// Rules are evaluated in this order, first match wins:
///
/// 1. `news_volume < min_volume` → `low_coverage` (`neutral` if `fold_low_coverage`)
/// 2. `sentiment_std > volatility_ceiling` → `high_uncertainty`
/// 3. `avg_sentiment > positive_cutoff` → `positive_momentum`
/// 4. `avg_sentiment < negative_cutoff` → `caution`
/// 5. otherwise → `neutral`
///
/// Volatility outranks direction: a noisy day with a strongly positive mean is
/// reported as uncertain, not as momentum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalThresholds {
    /// Minimum articles per day before any sentiment rule applies (SIGNAL_MIN_VOLUME).
    pub min_volume: u32,
    /// Report thin days as `neutral` instead of `low_coverage` (SIGNAL_FOLD_LOW_COVERAGE).
    pub fold_low_coverage: bool,
    /// Population std above which a day is `high_uncertainty` (SIGNAL_VOLATILITY_CEILING).
    pub volatility_ceiling: f64,
    /// Mean above which a day is `positive_momentum` (SIGNAL_POSITIVE_CUTOFF).
    pub positive_cutoff: f64,
    /// Mean below which a day is `caution` (SIGNAL_NEGATIVE_CUTOFF).
    pub negative_cutoff: f64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            min_volume: signal_defaults::MIN_VOLUME,
            fold_low_coverage: false,
            volatility_ceiling: signal_defaults::VOLATILITY_CEILING,
            positive_cutoff: signal_defaults::POSITIVE_CUTOFF,
            negative_cutoff: signal_defaults::NEGATIVE_CUTOFF,
        }
    }
}

impl SignalThresholds {
    pub fn validate(&self) -> Result<()> {
        let values = [
            ("SIGNAL_VOLATILITY_CEILING", self.volatility_ceiling),
            ("SIGNAL_POSITIVE_CUTOFF", self.positive_cutoff),
            ("SIGNAL_NEGATIVE_CUTOFF", self.negative_cutoff),
        ];
        for (name, v) in values {
            if !v.is_finite() {
                return Err(AppError::Config(format!("{name} must be a finite number")));
            }
        }
        if self.volatility_ceiling < 0.0 {
            return Err(AppError::Config(
                "SIGNAL_VOLATILITY_CEILING must not be negative".to_string(),
            ));
        }
        if self.negative_cutoff > self.positive_cutoff {
            return Err(AppError::Config(format!(
                "SIGNAL_NEGATIVE_CUTOFF ({}) must not exceed SIGNAL_POSITIVE_CUTOFF ({})",
                self.negative_cutoff, self.positive_cutoff
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Base URL of the RSS search service (GOOGLE_NEWS_URL).
    pub news_feed_url: String,
    /// Base URL of the hosted inference API (INFERENCE_URL).
    pub inference_url: String,
    /// Bearer token for the inference API (HF_API_TOKEN). Optional.
    pub inference_token: Option<String>,
    pub sentiment_model: String,
    pub generation_model: String,
    pub brief_mode: BriefMode,
    /// Days of metrics summarised into each brief, ending today (BRIEF_LOOKBACK_DAYS).
    pub brief_lookback_days: u32,
    pub http_timeout_secs: u64,
    /// Retries after the first attempt for transient HTTP failures (HTTP_MAX_RETRIES).
    pub http_max_retries: u32,
    pub http_retry_delay_ms: u64,
    /// Re-run the batch every N seconds; 0 runs it once at startup (PIPELINE_INTERVAL_SECS).
    pub pipeline_interval_secs: u64,
    /// Exit after the first batch instead of serving the API (RUN_ONCE).
    pub run_once: bool,
    /// Assets inserted at startup if missing (ASSETS="AAPL:Apple Inc.,MSFT:Microsoft").
    pub seed_assets: Vec<(String, String)>,
    pub thresholds: SignalThresholds,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Absent keys take their
    /// documented default; present but malformed keys are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let thresholds = SignalThresholds {
            min_volume: parse_or(&lookup, "SIGNAL_MIN_VOLUME", signal_defaults::MIN_VOLUME)?,
            fold_low_coverage: parse_bool_or(&lookup, "SIGNAL_FOLD_LOW_COVERAGE", false)?,
            volatility_ceiling: parse_or(
                &lookup,
                "SIGNAL_VOLATILITY_CEILING",
                signal_defaults::VOLATILITY_CEILING,
            )?,
            positive_cutoff: parse_or(
                &lookup,
                "SIGNAL_POSITIVE_CUTOFF",
                signal_defaults::POSITIVE_CUTOFF,
            )?,
            negative_cutoff: parse_or(
                &lookup,
                "SIGNAL_NEGATIVE_CUTOFF",
                signal_defaults::NEGATIVE_CUTOFF,
            )?,
        };
        thresholds.validate()?;

        let brief_mode = match lookup("BRIEF_MODE").as_deref().map(str::trim) {
            None | Some("") | Some("template") => BriefMode::Template,
            Some("model") => BriefMode::Model,
            Some(other) => {
                return Err(AppError::Config(format!(
                    "BRIEF_MODE must be 'template' or 'model', got '{other}'"
                )))
            }
        };

        let brief_lookback_days: u32 = parse_or(&lookup, "BRIEF_LOOKBACK_DAYS", 7)?;
        if brief_lookback_days == 0 {
            return Err(AppError::Config("BRIEF_LOOKBACK_DAYS must be at least 1".to_string()));
        }

        Ok(Self {
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            db_path: lookup("DB_PATH").unwrap_or_else(|| "newsdesk.db".to_string()),
            api_port: lookup("API_PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            news_feed_url: lookup("GOOGLE_NEWS_URL").unwrap_or_else(|| GOOGLE_NEWS_URL.to_string()),
            inference_url: lookup("INFERENCE_URL").unwrap_or_else(|| INFERENCE_URL.to_string()),
            inference_token: lookup("HF_API_TOKEN").filter(|t| !t.trim().is_empty()),
            sentiment_model: lookup("SENTIMENT_MODEL")
                .unwrap_or_else(|| SENTIMENT_MODEL.to_string()),
            generation_model: lookup("GENERATION_MODEL")
                .unwrap_or_else(|| GENERATION_MODEL.to_string()),
            brief_mode,
            brief_lookback_days,
            http_timeout_secs: parse_or(&lookup, "HTTP_TIMEOUT_SECS", 30)?,
            http_max_retries: parse_or(&lookup, "HTTP_MAX_RETRIES", 1)?,
            http_retry_delay_ms: parse_or(&lookup, "HTTP_RETRY_DELAY_MS", 500)?,
            pipeline_interval_secs: parse_or(&lookup, "PIPELINE_INTERVAL_SECS", 0)?,
            run_once: parse_bool_or(&lookup, "RUN_ONCE", false)?,
            seed_assets: parse_assets(&lookup("ASSETS").unwrap_or_default())?,
            thresholds,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{key} has an invalid value: '{raw}'"))),
    }
}

fn parse_bool_or<F>(lookup: &F, key: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).as_deref().map(|s| s.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(AppError::Config(format!("{key} must be true or false, got '{v}'"))),
        },
    }
}

/// `TICKER:Name,TICKER:Name` → [(ticker, name)]. A bare ticker uses itself as name.
fn parse_assets(raw: &str) -> Result<Vec<(String, String)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let (ticker, name) = match entry.split_once(':') {
                Some((t, n)) => (t.trim(), n.trim()),
                None => (entry, entry),
            };
            if ticker.is_empty() {
                return Err(AppError::Config(format!("ASSETS entry '{entry}' has no ticker")));
            }
            let name = if name.is_empty() { ticker } else { name };
            Ok((ticker.to_uppercase(), name.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config_with(&[]).unwrap();
        assert_eq!(cfg.thresholds, SignalThresholds::default());
        assert_eq!(cfg.brief_mode, BriefMode::Template);
        assert_eq!(cfg.brief_lookback_days, 7);
        assert_eq!(cfg.http_max_retries, 1);
        assert_eq!(cfg.api_port, 3000);
        assert!(cfg.inference_token.is_none());
        assert!(cfg.seed_assets.is_empty());
    }

    #[test]
    fn non_numeric_threshold_is_fatal() {
        let err = config_with(&[("SIGNAL_POSITIVE_CUTOFF", "high")]).unwrap_err();
        assert!(matches!(err, AppError::Config(msg) if msg.contains("SIGNAL_POSITIVE_CUTOFF")));
    }

    #[test]
    fn non_finite_threshold_is_fatal() {
        assert!(config_with(&[("SIGNAL_VOLATILITY_CEILING", "NaN")]).is_err());
        assert!(config_with(&[("SIGNAL_POSITIVE_CUTOFF", "inf")]).is_err());
    }

    #[test]
    fn inverted_cutoffs_are_rejected() {
        let err = config_with(&[
            ("SIGNAL_POSITIVE_CUTOFF", "-0.2"),
            ("SIGNAL_NEGATIVE_CUTOFF", "0.2"),
        ])
        .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn thresholds_read_from_env() {
        let cfg = config_with(&[
            ("SIGNAL_MIN_VOLUME", "5"),
            ("SIGNAL_FOLD_LOW_COVERAGE", "true"),
            ("SIGNAL_VOLATILITY_CEILING", "0.4"),
            ("SIGNAL_POSITIVE_CUTOFF", "0.10"),
            ("SIGNAL_NEGATIVE_CUTOFF", "-0.10"),
        ])
        .unwrap();
        assert_eq!(cfg.thresholds.min_volume, 5);
        assert!(cfg.thresholds.fold_low_coverage);
        assert_eq!(cfg.thresholds.volatility_ceiling, 0.4);
        assert_eq!(cfg.thresholds.positive_cutoff, 0.10);
        assert_eq!(cfg.thresholds.negative_cutoff, -0.10);
    }

    #[test]
    fn brief_mode_and_lookback_are_validated() {
        assert_eq!(config_with(&[("BRIEF_MODE", "model")]).unwrap().brief_mode, BriefMode::Model);
        assert!(config_with(&[("BRIEF_MODE", "llm")]).is_err());
        assert!(config_with(&[("BRIEF_LOOKBACK_DAYS", "0")]).is_err());
        assert!(config_with(&[("RUN_ONCE", "maybe")]).is_err());
    }

    #[test]
    fn seed_assets_parse() {
        let cfg = config_with(&[("ASSETS", "aapl:Apple Inc., MSFT:Microsoft ,NVDA")]).unwrap();
        assert_eq!(
            cfg.seed_assets,
            vec![
                ("AAPL".to_string(), "Apple Inc.".to_string()),
                ("MSFT".to_string(), "Microsoft".to_string()),
                ("NVDA".to_string(), "NVDA".to_string()),
            ]
        );
        assert!(config_with(&[("ASSETS", ":Nameless")]).is_err());
    }
}
