use async_trait::async_trait;

use crate::brief::composer::BriefWindow;
use crate::config::{Config, GENERATION_MAX_NEW_TOKENS};
use crate::error::{AppError, Result};
use crate::http::{build_client, send_with_retry, RetryPolicy};
use crate::types::Asset;

/// Free-text generation used for model-written briefs.
#[async_trait]
pub trait BriefGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;

    fn model_name(&self) -> &str;
}

/// Text-generation model on a hosted inference API.
pub struct HostedBriefGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    token: Option<String>,
    retry: RetryPolicy,
}

impl HostedBriefGenerator {
    pub fn new(cfg: &Config) -> Result<Self> {
        Ok(Self {
            client: build_client(cfg.http_timeout_secs)?,
            endpoint: format!(
                "{}/models/{}",
                cfg.inference_url.trim_end_matches('/'),
                cfg.generation_model
            ),
            model: cfg.generation_model.clone(),
            token: cfg.inference_token.clone(),
            retry: RetryPolicy::from_config(cfg),
        })
    }
}

#[async_trait]
impl BriefGenerator for HostedBriefGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "inputs": prompt,
            "parameters": {
                "max_new_tokens": GENERATION_MAX_NEW_TOKENS,
                "return_full_text": false,
            }
        });

        let resp = send_with_retry(self.retry, "brief generation", || {
            let req = self.client.post(&self.endpoint).json(&body);
            match &self.token {
                Some(t) => req.bearer_auth(t),
                None => req,
            }
        })
        .await?;

        let value: serde_json::Value = resp.json().await?;
        parse_generation(&value)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Read `[{"generated_text": …}]` (or a bare object). Blank text is an error
/// so the caller falls back to the template.
pub fn parse_generation(value: &serde_json::Value) -> Result<String> {
    if let Some(err) = value.get("error").and_then(|e| e.as_str()) {
        return Err(AppError::Inference(err.to_string()));
    }
    let entry = match value.as_array() {
        Some(a) => a.first(),
        None => Some(value),
    };
    let text = entry
        .and_then(|e| e.get("generated_text"))
        .and_then(|t| t.as_str())
        .map(str::trim)
        .unwrap_or("");
    if text.is_empty() {
        return Err(AppError::Inference("empty generation".to_string()));
    }
    Ok(text.to_string())
}

/// Prompt handed to the generator for one asset's window.
pub fn build_prompt(asset: &Asset, window: &BriefWindow) -> String {
    format!(
        "Write a concise, neutral market brief (3 sentences) about {name} ({ticker}) \
         for {start} to {end}. Facts: {volume} news articles; average news sentiment \
         {avg:.2} on a -1 to 1 scale; the most common daily signal was \"{signal}\". \
         Do not give investment advice.\n\nBrief:",
        name = asset.name,
        ticker = asset.ticker,
        start = window.period_start,
        end = window.period_end,
        volume = window.total_volume,
        avg = window.avg_sentiment,
        signal = window.dominant_signal.as_str().replace('_', " "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Signal;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn reads_generated_text() {
        let v = json!([{"generated_text": "  Apple drew steady coverage.  "}]);
        assert_eq!(parse_generation(&v).unwrap(), "Apple drew steady coverage.");
        let v = json!({"generated_text": "Single object."});
        assert_eq!(parse_generation(&v).unwrap(), "Single object.");
    }

    #[test]
    fn blank_or_error_is_rejected() {
        assert!(parse_generation(&json!([{"generated_text": "   "}])).is_err());
        assert!(parse_generation(&json!([])).is_err());
        assert!(matches!(
            parse_generation(&json!({"error": "rate limited"})),
            Err(AppError::Inference(msg)) if msg == "rate limited"
        ));
    }

    #[test]
    fn prompt_carries_window_facts() {
        let asset = Asset {
            asset_id: 1,
            ticker: "MSFT".to_string(),
            name: "Microsoft".to_string(),
        };
        let window = BriefWindow {
            period_start: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(),
            avg_sentiment: -0.234,
            total_volume: 41,
            dominant_signal: Signal::Caution,
            days: 7,
        };
        let prompt = build_prompt(&asset, &window);
        assert!(prompt.contains("Microsoft (MSFT)"));
        assert!(prompt.contains("2024-03-01 to 2024-03-07"));
        assert!(prompt.contains("41 news articles"));
        assert!(prompt.contains("-0.23"));
        assert!(prompt.contains("\"caution\""));
    }
}
