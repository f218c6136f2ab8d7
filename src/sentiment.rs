//! Sentiment scoring behind a narrow trait so the pipeline never depends on a
//! particular model or host.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::{Config, SENTIMENT_MAX_CHARS};
use crate::error::{AppError, Result};
use crate::http::{build_client, send_with_retry, RetryPolicy};
use crate::types::{SentimentLabel, SentimentResult};

#[async_trait]
pub trait SentimentScorer: Send + Sync {
    async fn score(&self, text: &str) -> Result<SentimentResult>;

    /// Name stored alongside every score this scorer produces.
    fn model_name(&self) -> &str;
}

/// FinBERT (or any text-classification model) on a hosted inference API.
pub struct HostedSentimentScorer {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    token: Option<String>,
    retry: RetryPolicy,
}

impl HostedSentimentScorer {
    pub fn new(cfg: &Config) -> Result<Self> {
        Ok(Self {
            client: build_client(cfg.http_timeout_secs)?,
            endpoint: format!(
                "{}/models/{}",
                cfg.inference_url.trim_end_matches('/'),
                cfg.sentiment_model
            ),
            model: cfg.sentiment_model.clone(),
            token: cfg.inference_token.clone(),
            retry: RetryPolicy::from_config(cfg),
        })
    }
}

#[async_trait]
impl SentimentScorer for HostedSentimentScorer {
    async fn score(&self, text: &str) -> Result<SentimentResult> {
        let body = serde_json::json!({ "inputs": truncate_chars(text, SENTIMENT_MAX_CHARS) });

        let resp = send_with_retry(self.retry, "sentiment", || {
            let req = self.client.post(&self.endpoint).json(&body);
            match &self.token {
                Some(t) => req.bearer_auth(t),
                None => req,
            }
        })
        .await?;

        let value: serde_json::Value = resp.json().await?;
        parse_classification(&value)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

/// Accepts `[[{label, score}, …]]` (batched) or `[{label, score}, …]` and
/// returns the highest-confidence known label.
pub fn parse_classification(value: &serde_json::Value) -> Result<SentimentResult> {
    if let Some(err) = value.get("error").and_then(|e| e.as_str()) {
        return Err(AppError::Inference(err.to_string()));
    }

    let outer = value
        .as_array()
        .ok_or_else(|| AppError::Inference("classification response was not an array".to_string()))?;
    let candidates = match outer.first() {
        Some(serde_json::Value::Array(inner)) => inner.clone(),
        _ => outer.clone(),
    };

    let scores: Vec<LabelScore> = serde_json::from_value(serde_json::Value::Array(candidates))?;

    scores
        .into_iter()
        .filter(|ls| ls.score.is_finite())
        .filter_map(|ls| SentimentLabel::parse(&ls.label).map(|label| (label, ls.score)))
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(label, confidence)| SentimentResult {
            label,
            confidence: confidence.clamp(0.0, 1.0),
        })
        .ok_or_else(|| AppError::Inference("no recognised sentiment label in response".to_string()))
}

/// First `max` characters of `s`, never splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
