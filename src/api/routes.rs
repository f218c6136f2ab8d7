use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::health::{HealthSnapshot, RunStatus};
use crate::api::latency::LatencyStats;
use crate::config::{DEFAULT_METRICS_LIMIT, DEFAULT_NEWS_LIMIT};
use crate::db::{BriefRow, NewsStore};
use crate::error::AppError;
use crate::types::{Asset, DailyMetric, StoredArticle};

/// Upper bound on `?limit=` for list endpoints.
const MAX_LIMIT: i64 = 500;

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn NewsStore>,
    pub status: Arc<RunStatus>,
    pub latency: Arc<LatencyStats>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/assets", get(get_assets))
        .route("/assets/:id/metrics", get(get_asset_metrics))
        .route("/assets/:id/metrics/latest", get(get_latest_metric))
        .route("/assets/:id/news", get(get_asset_news))
        .route("/briefs/:scope/latest", get(get_latest_brief))
        .route("/health", get(get_health))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

impl LimitQuery {
    fn or(&self, default: i64) -> i64 {
        self.limit.unwrap_or(default).clamp(1, MAX_LIMIT)
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct LatencyResponse {
    pub samples: u64,
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_assets(State(state): State<ApiState>) -> Result<Json<Vec<Asset>>, AppError> {
    Ok(Json(state.store.list_assets().await?))
}

async fn get_asset_metrics(
    State(state): State<ApiState>,
    Path(asset_id): Path<i64>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<Vec<DailyMetric>>, AppError> {
    require_asset(&state, asset_id).await?;
    let metrics = state
        .store
        .recent_metrics(asset_id, params.or(DEFAULT_METRICS_LIMIT))
        .await?;
    Ok(Json(metrics))
}

async fn get_latest_metric(
    State(state): State<ApiState>,
    Path(asset_id): Path<i64>,
) -> Result<Json<DailyMetric>, AppError> {
    require_asset(&state, asset_id).await?;
    state
        .store
        .recent_metrics(asset_id, 1)
        .await?
        .into_iter()
        .next()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no metrics for asset {asset_id}")))
}

async fn get_asset_news(
    State(state): State<ApiState>,
    Path(asset_id): Path<i64>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<Vec<StoredArticle>>, AppError> {
    require_asset(&state, asset_id).await?;
    let news = state
        .store
        .recent_news(asset_id, params.or(DEFAULT_NEWS_LIMIT))
        .await?;
    Ok(Json(news))
}

async fn get_latest_brief(
    State(state): State<ApiState>,
    Path(scope): Path<String>,
) -> Result<Json<BriefRow>, AppError> {
    state
        .store
        .latest_brief(&scope)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no brief for {scope}")))
}

async fn get_health(State(state): State<ApiState>) -> Json<HealthSnapshot> {
    Json(state.status.snapshot())
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencyResponse> {
    let (p50, p95, p99) = state.latency.percentiles();
    let ms = |us: Option<u64>| us.map(|v| v as f64 / 1_000.0);
    Json(LatencyResponse {
        samples: state.latency.len(),
        p50_ms: ms(p50),
        p95_ms: ms(p95),
        p99_ms: ms(p99),
    })
}

async fn require_asset(state: &ApiState, asset_id: i64) -> Result<Asset, AppError> {
    state
        .store
        .get_asset(asset_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("asset {asset_id}")))
}
