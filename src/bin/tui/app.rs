use serde::Deserialize;

use market_news::types::{Asset, DailyMetric, Signal, StoredArticle};

// ---------------------------------------------------------------------------
// API response types (mirror routes.rs shapes)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct BriefResponse {
    pub period_start: String,
    pub period_end: String,
    pub content: String,
    pub model_name: String,
    pub generated_at: i64,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[allow(dead_code)]
pub struct StageCountsResponse {
    pub ok: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[allow(dead_code)]
pub struct SummaryResponse {
    pub ingest: StageCountsResponse,
    pub score: StageCountsResponse,
    pub articles_added: u64,
    pub briefs_written: usize,
    pub template_fallbacks: usize,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[allow(dead_code)]
pub struct HealthResponse {
    pub running: bool,
    pub last_finished_at_ns: Option<u64>,
    pub failed_batches: u64,
    pub last_summary: Option<SummaryResponse>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[allow(dead_code)]
pub struct LatencyResponse {
    pub samples: u64,
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connected,
    Error(String),
    Connecting,
}

/// Everything shown for the highlighted asset.
#[derive(Debug, Clone, Default)]
#[allow(dead_code)]
pub struct AssetDetail {
    pub asset_id: Option<i64>,
    /// Newest first.
    pub metrics: Vec<DailyMetric>,
    pub news: Vec<StoredArticle>,
    pub brief: Option<BriefResponse>,
}

impl AssetDetail {
    pub fn latest(&self) -> Option<&DailyMetric> {
        self.metrics.first()
    }
}

#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct AppState {
    pub status: ConnectionStatus,
    pub assets: Vec<Asset>,
    pub detail: AssetDetail,
    pub health: HealthResponse,
    pub latency: LatencyResponse,
    pub last_refresh: std::time::Instant,
    pub base_url: String,
}

impl AppState {
    pub fn new(base_url: String) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            assets: Vec::new(),
            detail: AssetDetail::default(),
            health: HealthResponse::default(),
            latency: LatencyResponse::default(),
            last_refresh: std::time::Instant::now(),
            base_url,
        }
    }

    pub fn selected_asset(&self, index: Option<usize>) -> Option<&Asset> {
        index.and_then(|i| self.assets.get(i))
    }

    /// Refresh the asset list, run status and latency, then the detail of
    /// the asset at `selected` (the first asset when nothing is selected).
    pub async fn refresh(&mut self, client: &reqwest::Client, selected: Option<usize>) {
        let assets_url = format!("{}/assets", self.base_url);
        let health_url = format!("{}/health", self.base_url);
        let latency_url = format!("{}/stats/latency", self.base_url);

        let (assets_res, health_res, latency_res) = tokio::join!(
            client.get(&assets_url).send(),
            client.get(&health_url).send(),
            client.get(&latency_url).send(),
        );

        let assets = match assets_res {
            Ok(resp) => resp.json::<Vec<Asset>>().await,
            Err(e) => {
                self.status = ConnectionStatus::Error(format!("{e}"));
                return;
            }
        };
        match assets {
            Ok(a) => {
                self.assets = a;
                self.status = ConnectionStatus::Connected;
                self.last_refresh = std::time::Instant::now();
            }
            Err(e) => {
                self.status = ConnectionStatus::Error(format!("parse error: {e}"));
                return;
            }
        }

        if let Ok(h) = health_res {
            if let Ok(health) = h.json::<HealthResponse>().await {
                self.health = health;
            }
        }
        if let Ok(l) = latency_res {
            if let Ok(latency) = l.json::<LatencyResponse>().await {
                self.latency = latency;
            }
        }

        let target = self
            .selected_asset(selected.or(Some(0)))
            .cloned();
        match target {
            Some(asset) => self.fetch_detail(client, &asset).await,
            None => self.detail = AssetDetail::default(),
        }
    }

    /// Metrics, news and latest brief for one asset. Missing pieces (404s)
    /// are left empty.
    pub async fn fetch_detail(&mut self, client: &reqwest::Client, asset: &Asset) {
        let metrics_url = format!("{}/assets/{}/metrics?limit=7", self.base_url, asset.asset_id);
        let news_url = format!("{}/assets/{}/news?limit=10", self.base_url, asset.asset_id);
        let brief_url = format!("{}/briefs/{}/latest", self.base_url, asset.ticker);

        let (metrics_res, news_res, brief_res) = tokio::join!(
            client.get(&metrics_url).send(),
            client.get(&news_url).send(),
            client.get(&brief_url).send(),
        );

        let mut detail = AssetDetail {
            asset_id: Some(asset.asset_id),
            ..AssetDetail::default()
        };
        if let Ok(resp) = metrics_res {
            if resp.status().is_success() {
                detail.metrics = resp.json().await.unwrap_or_default();
            }
        }
        if let Ok(resp) = news_res {
            if resp.status().is_success() {
                detail.news = resp.json().await.unwrap_or_default();
            }
        }
        if let Ok(resp) = brief_res {
            if resp.status().is_success() {
                detail.brief = resp.json().await.ok();
            }
        }
        self.detail = detail;
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

pub fn format_sentiment(v: f64) -> String {
    format!("{:+.2}", v)
}

/// `positive_momentum` → `positive momentum`.
pub fn signal_label(signal: Signal) -> String {
    signal.as_str().replace('_', " ")
}

pub fn format_latency(ms: Option<f64>) -> String {
    match ms {
        Some(d) if d >= 1000.0 => format!("{:.1}s", d / 1000.0),
        Some(d) => format!("{:.0}ms", d),
        None => "—".to_string(),
    }
}

/// Convert nanosecond epoch timestamp to HH:MM:SS (UTC).
pub fn format_time_ns(ns: i64) -> String {
    let secs = (ns / 1_000_000_000).max(0) as u64;
    let h = (secs / 3600) % 24;
    let m = (secs / 60) % 60;
    let s = secs % 60;
    format!("{h:02}:{m:02}:{s:02}")
}

/// `2024-05-01T09:30:00` → `05-01 09:30`.
pub fn format_published(ts: &str) -> String {
    match (ts.get(5..10), ts.get(11..16)) {
        (Some(day), Some(time)) => format!("{day} {time}"),
        _ => ts.to_string(),
    }
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}
