//! Database row types matching `migrations/`. Used by sqlx for typed queries
//! and serialised as-is by the read-only API.

use chrono::NaiveDate;
use serde::Serialize;

use crate::types::{Asset, DailyMetric, Signal, StoredArticle};

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct AssetRow {
    pub asset_id: i64,
    pub ticker: String,
    pub name: String,
}

impl From<AssetRow> for Asset {
    fn from(r: AssetRow) -> Self {
        Asset {
            asset_id: r.asset_id,
            ticker: r.ticker,
            name: r.name,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct NewsRow {
    pub news_id: i64,
    pub asset_id: i64,
    pub source: String,
    pub title: String,
    pub content: String,
    pub url: String,
    pub published_at: String,
}

impl From<NewsRow> for StoredArticle {
    fn from(r: NewsRow) -> Self {
        StoredArticle {
            news_id: r.news_id,
            asset_id: r.asset_id,
            source: r.source,
            title: r.title,
            content: r.content,
            url: r.url,
            published_at: r.published_at,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScoredRow {
    pub asset_id: i64,
    pub published_at: String,
    pub sentiment_score: Option<f64>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct DailyMetricRow {
    pub asset_id: i64,
    pub metric_date: String,
    pub avg_sentiment: f64,
    pub news_volume: i64,
    pub sentiment_std: f64,
    pub signal: String,
}

impl TryFrom<DailyMetricRow> for DailyMetric {
    type Error = sqlx::Error;

    fn try_from(r: DailyMetricRow) -> Result<Self, Self::Error> {
        let metric_date = NaiveDate::parse_from_str(&r.metric_date, "%Y-%m-%d")
            .map_err(|e| sqlx::Error::Decode(format!("metric_date '{}': {e}", r.metric_date).into()))?;
        let signal = r
            .signal
            .parse::<Signal>()
            .map_err(|e| sqlx::Error::Decode(e.into()))?;
        let news_volume = u32::try_from(r.news_volume)
            .map_err(|_| sqlx::Error::Decode(format!("news_volume {}", r.news_volume).into()))?;
        Ok(DailyMetric {
            asset_id: r.asset_id,
            metric_date,
            avg_sentiment: r.avg_sentiment,
            news_volume,
            sentiment_std: r.sentiment_std,
            signal,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct BriefRow {
    pub brief_id: i64,
    pub scope: String,
    pub period_start: String,
    pub period_end: String,
    pub content: String,
    pub model_name: String,
    /// Nanosecond UTC epoch.
    pub generated_at: i64,
}
