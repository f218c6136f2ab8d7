//! In-process stand-ins for the hosted services, used by pipeline tests.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::brief::BriefGenerator;
use crate::error::{AppError, Result};
use crate::news::NewsSource;
use crate::sentiment::SentimentScorer;
use crate::types::{Asset, NewArticle, SentimentLabel, SentimentResult};

/// Returns a fixed article list per ticker; listed tickers fail.
#[derive(Default)]
pub struct ScriptedSource {
    articles: HashMap<String, Vec<(String, String, String)>>,
    failing: HashSet<String>,
}

impl ScriptedSource {
    pub fn with(mut self, ticker: &str, url: &str, title: &str, published_at: &str) -> Self {
        self.articles
            .entry(ticker.to_string())
            .or_default()
            .push((url.to_string(), title.to_string(), published_at.to_string()));
        self
    }

    pub fn failing(mut self, ticker: &str) -> Self {
        self.failing.insert(ticker.to_string());
        self
    }
}

#[async_trait]
impl NewsSource for ScriptedSource {
    async fn fetch(&self, asset: &Asset) -> Result<Vec<NewArticle>> {
        if self.failing.contains(&asset.ticker) {
            return Err(AppError::Feed(format!("feed unavailable for {}", asset.ticker)));
        }
        let items = self.articles.get(&asset.ticker).cloned().unwrap_or_default();
        Ok(items
            .into_iter()
            .map(|(url, title, published_at)| NewArticle {
                asset_id: asset.asset_id,
                source: "test".to_string(),
                content: title.clone(),
                title,
                url,
                published_at,
            })
            .collect())
    }
}

/// "beats" → +0.9, "misses" → -0.8, "boom" → error, anything else neutral.
pub struct KeywordScorer;

#[async_trait]
impl SentimentScorer for KeywordScorer {
    async fn score(&self, text: &str) -> Result<SentimentResult> {
        if text.contains("boom") {
            return Err(AppError::Inference("HTTP 503".to_string()));
        }
        let (label, confidence) = if text.contains("beats") {
            (SentimentLabel::Positive, 0.9)
        } else if text.contains("misses") {
            (SentimentLabel::Negative, 0.8)
        } else {
            (SentimentLabel::Neutral, 0.7)
        };
        Ok(SentimentResult { label, confidence })
    }

    fn model_name(&self) -> &str {
        "keyword-test"
    }
}

pub struct StaticGenerator(pub String);

#[async_trait]
impl BriefGenerator for StaticGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Ok(self.0.clone())
    }

    fn model_name(&self) -> &str {
        "static-test"
    }
}

pub struct FailingGenerator;

#[async_trait]
impl BriefGenerator for FailingGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(AppError::Inference("model is loading".to_string()))
    }

    fn model_name(&self) -> &str {
        "failing-test"
    }
}
