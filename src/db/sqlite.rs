use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::db::models::{AssetRow, BriefRow, DailyMetricRow, NewsRow, ScoredRow};
use crate::db::NewsStore;
use crate::error::Result;
use crate::types::{
    Asset, DailyMetric, MarketBrief, NewArticle, NlpRecord, ScoredRecord, StoredArticle,
};

const DATE_FMT: &str = "%Y-%m-%d";

/// SQLite-backed store. Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `db_path` and run migrations.
    /// `:memory:` gives a private in-memory database on a single connection.
    pub async fn open(db_path: &str) -> Result<Self> {
        let in_memory = db_path == ":memory:";
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))?
            .create_if_missing(true);

        let pool_opts = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(4)
        };
        let pool = pool_opts.connect_with(opts).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database ready at {db_path}");
        Ok(Self { pool })
    }
}

#[async_trait]
impl NewsStore for SqliteStore {
    async fn seed_assets(&self, assets: &[(String, String)]) -> Result<u64> {
        let mut added = 0;
        for (ticker, name) in assets {
            added += sqlx::query("INSERT OR IGNORE INTO assets (ticker, name) VALUES (?, ?)")
                .bind(ticker)
                .bind(name)
                .execute(&self.pool)
                .await?
                .rows_affected();
        }
        Ok(added)
    }

    async fn list_assets(&self) -> Result<Vec<Asset>> {
        let rows = sqlx::query_as::<_, AssetRow>(
            "SELECT asset_id, ticker, name FROM assets ORDER BY ticker",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Asset::from).collect())
    }

    async fn get_asset(&self, asset_id: i64) -> Result<Option<Asset>> {
        let row = sqlx::query_as::<_, AssetRow>(
            "SELECT asset_id, ticker, name FROM assets WHERE asset_id = ?",
        )
        .bind(asset_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Asset::from))
    }

    async fn insert_articles(&self, articles: &[NewArticle]) -> Result<u64> {
        let fetched_at = now_ns();
        let mut tx = self.pool.begin().await?;
        let mut added = 0;
        for a in articles {
            added += sqlx::query(
                r#"
                INSERT OR IGNORE INTO news (asset_id, source, title, content, url, published_at, fetched_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(a.asset_id)
            .bind(&a.source)
            .bind(&a.title)
            .bind(&a.content)
            .bind(&a.url)
            .bind(&a.published_at)
            .bind(fetched_at)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }
        tx.commit().await?;
        Ok(added)
    }

    async fn unscored_articles(&self) -> Result<Vec<StoredArticle>> {
        let rows = sqlx::query_as::<_, NewsRow>(
            r#"
            SELECT n.news_id, n.asset_id, n.source, n.title, n.content, n.url, n.published_at
            FROM news n
            LEFT JOIN news_nlp nl ON nl.news_id = n.news_id
            WHERE nl.news_id IS NULL
            ORDER BY n.news_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(StoredArticle::from).collect())
    }

    async fn insert_nlp(&self, record: &NlpRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO news_nlp (news_id, sentiment_score, sentiment_label, summary, model_name, scored_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.news_id)
        .bind(record.sentiment_score)
        .bind(record.sentiment_label.to_string())
        .bind(&record.summary)
        .bind(&record.model_name)
        .bind(now_ns())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn scored_records(&self) -> Result<Vec<ScoredRecord>> {
        let rows = sqlx::query_as::<_, ScoredRow>(
            r#"
            SELECT n.asset_id, n.published_at, nl.sentiment_score
            FROM news_nlp nl
            JOIN news n ON n.news_id = nl.news_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| ScoredRecord {
                asset_id: r.asset_id,
                published_at: r.published_at,
                sentiment_score: r.sentiment_score,
            })
            .collect())
    }

    async fn upsert_daily_metrics(&self, metrics: &[DailyMetric]) -> Result<()> {
        let updated_at = now_ns();
        let mut tx = self.pool.begin().await?;
        for m in metrics {
            sqlx::query(
                r#"
                INSERT INTO daily_metrics (
                    asset_id, metric_date, avg_sentiment, news_volume,
                    sentiment_std, signal, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(asset_id, metric_date) DO UPDATE SET
                    avg_sentiment = excluded.avg_sentiment,
                    news_volume = excluded.news_volume,
                    sentiment_std = excluded.sentiment_std,
                    signal = excluded.signal,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(m.asset_id)
            .bind(m.metric_date.format(DATE_FMT).to_string())
            .bind(m.avg_sentiment)
            .bind(i64::from(m.news_volume))
            .bind(m.sentiment_std)
            .bind(m.signal.as_str())
            .bind(updated_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn metrics_between(
        &self,
        asset_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyMetric>> {
        let rows = sqlx::query_as::<_, DailyMetricRow>(
            r#"
            SELECT asset_id, metric_date, avg_sentiment, news_volume, sentiment_std, signal
            FROM daily_metrics
            WHERE asset_id = ? AND metric_date >= ? AND metric_date <= ?
            ORDER BY metric_date ASC
            "#,
        )
        .bind(asset_id)
        .bind(from.format(DATE_FMT).to_string())
        .bind(to.format(DATE_FMT).to_string())
        .fetch_all(&self.pool)
        .await?;
        rows_to_metrics(rows)
    }

    async fn recent_metrics(&self, asset_id: i64, limit: i64) -> Result<Vec<DailyMetric>> {
        let rows = sqlx::query_as::<_, DailyMetricRow>(
            r#"
            SELECT asset_id, metric_date, avg_sentiment, news_volume, sentiment_std, signal
            FROM daily_metrics
            WHERE asset_id = ?
            ORDER BY metric_date DESC
            LIMIT ?
            "#,
        )
        .bind(asset_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows_to_metrics(rows)
    }

    async fn insert_brief(&self, brief: &MarketBrief) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO market_briefs (scope, period_start, period_end, content, model_name, generated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&brief.scope)
        .bind(brief.period_start.format(DATE_FMT).to_string())
        .bind(brief.period_end.format(DATE_FMT).to_string())
        .bind(&brief.content)
        .bind(&brief.model_name)
        .bind(now_ns())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn latest_brief(&self, scope: &str) -> Result<Option<BriefRow>> {
        let row = sqlx::query_as::<_, BriefRow>(
            r#"
            SELECT brief_id, scope, period_start, period_end, content, model_name, generated_at
            FROM market_briefs
            WHERE scope = ?
            ORDER BY generated_at DESC, brief_id DESC
            LIMIT 1
            "#,
        )
        .bind(scope)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn recent_news(&self, asset_id: i64, limit: i64) -> Result<Vec<StoredArticle>> {
        let rows = sqlx::query_as::<_, NewsRow>(
            r#"
            SELECT news_id, asset_id, source, title, content, url, published_at
            FROM news
            WHERE asset_id = ?
            ORDER BY published_at DESC, news_id DESC
            LIMIT ?
            "#,
        )
        .bind(asset_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(StoredArticle::from).collect())
    }
}

fn rows_to_metrics(rows: Vec<DailyMetricRow>) -> Result<Vec<DailyMetric>> {
    rows.into_iter()
        .map(|r| DailyMetric::try_from(r).map_err(Into::into))
        .collect()
}

fn now_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as i64
}
