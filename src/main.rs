use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use market_news::api::{router, ApiState, LatencyStats, RunStatus};
use market_news::brief::HostedBriefGenerator;
use market_news::config::Config;
use market_news::db::{NewsStore, SqliteStore};
use market_news::error::Result;
use market_news::news::GoogleNewsRss;
use market_news::pipeline::{BatchScheduler, Pipeline, PipelineSettings};
use market_news::sentiment::HostedSentimentScorer;
use market_news::types::BriefMode;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let store = Arc::new(SqliteStore::open(&cfg.db_path).await?);

    if cfg.seed_assets.is_empty() {
        warn!("ASSETS not set; only assets already in the database will be tracked. Example: ASSETS=AAPL:Apple Inc.,MSFT:Microsoft");
    } else {
        let added = store.seed_assets(&cfg.seed_assets).await?;
        info!(configured = cfg.seed_assets.len(), added, "Assets seeded");
    }

    // --- Pipeline wiring ---
    let latency = Arc::new(LatencyStats::new());
    let status = Arc::new(RunStatus::new());

    let mut pipeline = Pipeline::new(
        store.clone(),
        Arc::new(GoogleNewsRss::new(&cfg)?),
        Arc::new(HostedSentimentScorer::new(&cfg)?),
        PipelineSettings::from_config(&cfg),
    )
    .with_latency(latency.clone());

    if cfg.brief_mode == BriefMode::Model {
        pipeline = pipeline.with_generator(Arc::new(HostedBriefGenerator::new(&cfg)?));
        info!(model = %cfg.generation_model, "Briefs use hosted generation with template fallback");
    }
    if cfg.inference_token.is_none() {
        warn!("HF_API_TOKEN not set; hosted inference calls are unauthenticated and may be rate limited");
    }

    let scheduler = BatchScheduler::new(
        Arc::new(pipeline),
        status.clone(),
        cfg.pipeline_interval_secs,
    );

    // --- Startup batch ---
    let first = scheduler.run_once().await;

    if cfg.run_once {
        let report = first?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if cfg.pipeline_interval_secs > 0 {
        info!("Batch scheduled every {}s", cfg.pipeline_interval_secs);
    }
    tokio::spawn(async move { scheduler.run().await });

    // --- HTTP API server ---
    let api_state = ApiState {
        store,
        status,
        latency,
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
