use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration, NaiveDate};
use tracing::{debug, info, warn};

use crate::api::latency::LatencyStats;
use crate::brief::generator::build_prompt;
use crate::brief::{compose, BriefGenerator, BriefWindow};
use crate::config::{Config, SignalThresholds, SUMMARY_MAX_CHARS, TEMPLATE_MODEL_NAME};
use crate::db::NewsStore;
use crate::error::Result;
use crate::metrics::aggregate;
use crate::news::NewsSource;
use crate::pipeline::report::{BatchReport, Stage};
use crate::sentiment::{truncate_chars, SentimentScorer};
use crate::types::{Asset, BriefMode, MarketBrief, NlpRecord};

/// The parts of [`Config`] the batch needs.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub thresholds: SignalThresholds,
    pub brief_mode: BriefMode,
    pub brief_lookback_days: u32,
}

impl PipelineSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            thresholds: cfg.thresholds,
            brief_mode: cfg.brief_mode,
            brief_lookback_days: cfg.brief_lookback_days,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            thresholds: SignalThresholds::default(),
            brief_mode: BriefMode::Template,
            brief_lookback_days: 7,
        }
    }
}

/// One ingest → score → aggregate → brief pass over every tracked asset.
pub struct Pipeline {
    store: Arc<dyn NewsStore>,
    source: Arc<dyn NewsSource>,
    scorer: Arc<dyn SentimentScorer>,
    generator: Option<Arc<dyn BriefGenerator>>,
    settings: PipelineSettings,
    latency: Arc<LatencyStats>,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn NewsStore>,
        source: Arc<dyn NewsSource>,
        scorer: Arc<dyn SentimentScorer>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            source,
            scorer,
            generator: None,
            settings,
            latency: Arc::new(LatencyStats::new()),
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn BriefGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Share sentiment-call latency with the API.
    pub fn with_latency(mut self, latency: Arc<LatencyStats>) -> Self {
        self.latency = latency;
        self
    }

    pub fn latency(&self) -> &Arc<LatencyStats> {
        &self.latency
    }

    /// Run every stage once. `today` closes the brief window.
    ///
    /// Item-level failures land in the report; only a store read that a stage
    /// cannot start without is returned as an error.
    pub async fn run_batch(&self, today: NaiveDate) -> Result<BatchReport> {
        let mut report = BatchReport::default();

        let assets = self.store.list_assets().await?;
        info!(assets = assets.len(), %today, "batch started");

        self.ingest(&assets, &mut report).await;
        self.score(&mut report).await?;
        self.aggregate(&mut report).await?;
        self.brief(&assets, today, &mut report).await;

        Ok(report)
    }

    async fn ingest(&self, assets: &[Asset], report: &mut BatchReport) {
        for asset in assets {
            let articles = match self.source.fetch(asset).await {
                Ok(a) => a,
                Err(e) => {
                    warn!(ticker = %asset.ticker, "news fetch failed: {e}");
                    report.fail(Stage::Ingest, &asset.ticker, e.to_string());
                    continue;
                }
            };
            match self.store.insert_articles(&articles).await {
                Ok(added) => {
                    debug!(ticker = %asset.ticker, fetched = articles.len(), added, "articles stored");
                    report.articles_added += added;
                    report.ok(Stage::Ingest, &asset.ticker);
                }
                Err(e) => {
                    warn!(ticker = %asset.ticker, "article insert failed: {e}");
                    report.fail(Stage::Ingest, &asset.ticker, e.to_string());
                }
            }
        }
    }

    async fn score(&self, report: &mut BatchReport) -> Result<()> {
        let pending = self.store.unscored_articles().await?;
        debug!(pending = pending.len(), "scoring articles");

        for article in pending {
            let key = format!("news:{}", article.news_id);
            let text = if article.content.trim().is_empty() {
                &article.title
            } else {
                &article.content
            };

            let started = Instant::now();
            let scored = self.scorer.score(text).await;
            self.latency.record(started.elapsed());

            let result = match scored {
                Ok(r) => r,
                Err(e) => {
                    warn!(news_id = article.news_id, "sentiment scoring failed: {e}");
                    report.fail(Stage::Score, key, e.to_string());
                    continue;
                }
            };

            let record = NlpRecord {
                news_id: article.news_id,
                sentiment_score: result.signed_score(),
                sentiment_label: result.label,
                summary: truncate_chars(&article.content, SUMMARY_MAX_CHARS).to_string(),
                model_name: self.scorer.model_name().to_string(),
            };
            match self.store.insert_nlp(&record).await {
                Ok(()) => report.ok(Stage::Score, key),
                Err(e) => {
                    warn!(news_id = article.news_id, "nlp insert failed: {e}");
                    report.fail(Stage::Score, key, e.to_string());
                }
            }
        }
        Ok(())
    }

    async fn aggregate(&self, report: &mut BatchReport) -> Result<()> {
        let records = self.store.scored_records().await?;
        let aggregation = aggregate(&records, &self.settings.thresholds);

        for (index, reason) in &aggregation.rejected {
            debug!(index, %reason, "scored record rejected");
            report.skip(Stage::Aggregate, format!("record:{index}"), reason.to_string());
        }

        if aggregation.metrics.is_empty() {
            return Ok(());
        }

        match self.store.upsert_daily_metrics(&aggregation.metrics).await {
            Ok(()) => {
                for m in &aggregation.metrics {
                    report.ok(Stage::Aggregate, format!("metric:{}:{}", m.asset_id, m.metric_date));
                }
                report.metrics_written = aggregation.metrics.len();
            }
            Err(e) => {
                warn!(metrics = aggregation.metrics.len(), "metric upsert failed: {e}");
                report.fail(Stage::Aggregate, "daily_metrics", e.to_string());
            }
        }
        Ok(())
    }

    async fn brief(&self, assets: &[Asset], today: NaiveDate, report: &mut BatchReport) {
        let lookback = i64::from(self.settings.brief_lookback_days.max(1));
        let from = today - Duration::days(lookback - 1);

        for asset in assets {
            let metrics = match self.store.metrics_between(asset.asset_id, from, today).await {
                Ok(m) => m,
                Err(e) => {
                    warn!(ticker = %asset.ticker, "metric window read failed: {e}");
                    report.fail(Stage::Brief, &asset.ticker, e.to_string());
                    continue;
                }
            };
            let Some(window) = BriefWindow::from_metrics(&metrics) else {
                report.skip(Stage::Brief, &asset.ticker, "no metrics in window");
                continue;
            };

            let (content, model_name) = self.render(asset, &window, report).await;
            let brief = MarketBrief {
                scope: asset.ticker.clone(),
                period_start: window.period_start,
                period_end: window.period_end,
                content,
                model_name,
            };
            match self.store.insert_brief(&brief).await {
                Ok(()) => {
                    report.briefs_written += 1;
                    report.ok(Stage::Brief, &asset.ticker);
                }
                Err(e) => {
                    warn!(ticker = %asset.ticker, "brief insert failed: {e}");
                    report.fail(Stage::Brief, &asset.ticker, e.to_string());
                }
            }
        }
    }

    /// Brief text and the name of whatever produced it.
    async fn render(
        &self,
        asset: &Asset,
        window: &BriefWindow,
        report: &mut BatchReport,
    ) -> (String, String) {
        let template = || (compose(asset, window), TEMPLATE_MODEL_NAME.to_string());

        if self.settings.brief_mode == BriefMode::Template {
            return template();
        }
        let Some(generator) = &self.generator else {
            report.template_fallbacks += 1;
            return template();
        };

        match generator.generate(&build_prompt(asset, window)).await {
            Ok(text) if !text.trim().is_empty() => (text, generator.model_name().to_string()),
            Ok(_) => {
                warn!(ticker = %asset.ticker, "brief generation returned no text, using template");
                report.template_fallbacks += 1;
                template()
            }
            Err(e) => {
                warn!(ticker = %asset.ticker, "brief generation failed, using template: {e}");
                report.template_fallbacks += 1;
                template()
            }
        }
    }
}
