//! Persistence. The pipeline and the API only talk to [`NewsStore`];
//! [`sqlite::SqliteStore`] is the production backend.

pub mod models;
pub mod sqlite;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::types::{
    Asset, DailyMetric, MarketBrief, NewArticle, NlpRecord, ScoredRecord, StoredArticle,
};

pub use models::BriefRow;
pub use sqlite::SqliteStore;

#[async_trait]
pub trait NewsStore: Send + Sync {
    /// Insert (ticker, name) pairs that are not already tracked. Returns rows added.
    async fn seed_assets(&self, assets: &[(String, String)]) -> Result<u64>;

    async fn list_assets(&self) -> Result<Vec<Asset>>;

    async fn get_asset(&self, asset_id: i64) -> Result<Option<Asset>>;

    /// Insert articles, ignoring ones already stored for the same (asset, url).
    /// Returns rows added.
    async fn insert_articles(&self, articles: &[NewArticle]) -> Result<u64>;

    /// Stored articles that have no NLP row yet, oldest first.
    async fn unscored_articles(&self) -> Result<Vec<StoredArticle>>;

    async fn insert_nlp(&self, record: &NlpRecord) -> Result<()>;

    /// Every scored article joined to its asset and publication time.
    async fn scored_records(&self) -> Result<Vec<ScoredRecord>>;

    /// Write metrics with replace semantics keyed by (asset_id, metric_date).
    async fn upsert_daily_metrics(&self, metrics: &[DailyMetric]) -> Result<()>;

    /// Metrics for one asset with `from <= metric_date <= to`, ascending by date.
    async fn metrics_between(
        &self,
        asset_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyMetric>>;

    /// Newest first.
    async fn recent_metrics(&self, asset_id: i64, limit: i64) -> Result<Vec<DailyMetric>>;

    async fn insert_brief(&self, brief: &MarketBrief) -> Result<()>;

    async fn latest_brief(&self, scope: &str) -> Result<Option<BriefRow>>;

    /// Newest first by publication time.
    async fn recent_news(&self, asset_id: i64, limit: i64) -> Result<Vec<StoredArticle>>;
}
