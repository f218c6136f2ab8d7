use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::Utc;
use tracing::{error, info, warn};

use crate::api::health::RunStatus;
use crate::error::Result;
use crate::pipeline::batch::Pipeline;
use crate::pipeline::report::BatchReport;

/// Runs the batch and keeps [`RunStatus`] current. With a non-zero interval,
/// [`BatchScheduler::run`] repeats it in the background.
pub struct BatchScheduler {
    pipeline: Arc<Pipeline>,
    status: Arc<RunStatus>,
    interval_secs: u64,
}

impl BatchScheduler {
    pub fn new(pipeline: Arc<Pipeline>, status: Arc<RunStatus>, interval_secs: u64) -> Self {
        Self {
            pipeline,
            status,
            interval_secs,
        }
    }

    /// One batch for the current UTC day.
    pub async fn run_once(&self) -> Result<BatchReport> {
        self.status.mark_started();
        let today = Utc::now().date_naive();

        match self.pipeline.run_batch(today).await {
            Ok(report) => {
                log_report(&report);
                self.status.mark_finished(now_ns(), report.summary());
                Ok(report)
            }
            Err(e) => {
                error!("Batch aborted: {e}");
                self.status.mark_failed(now_ns(), e.to_string());
                Err(e)
            }
        }
    }

    /// Repeat the batch every `interval_secs`. Returns immediately when the
    /// interval is 0. The startup batch is expected to have run already.
    pub async fn run(self) {
        if self.interval_secs == 0 {
            return;
        }
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        interval.tick().await; // consume immediate first tick

        loop {
            interval.tick().await;
            // Failures are logged and recorded in the run status.
            let _ = self.run_once().await;
        }
    }
}

fn log_report(report: &BatchReport) {
    let s = report.summary();
    info!(
        event = "BATCH_DONE",
        articles_added = s.articles_added,
        metrics_written = s.metrics_written,
        briefs_written = s.briefs_written,
        template_fallbacks = s.template_fallbacks,
        "BATCH DONE | ingest ok/failed: {}/{} | score ok/failed: {}/{} | rejected records: {} | briefs ok/skipped/failed: {}/{}/{}",
        s.ingest.ok, s.ingest.failed,
        s.score.ok, s.score.failed,
        s.aggregate.skipped,
        s.brief.ok, s.brief.skipped, s.brief.failed,
    );
    let failures = report.failures().count();
    if failures > 0 {
        warn!(failures, "batch finished with item failures");
    }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewsStore, SqliteStore};
    use crate::pipeline::batch::PipelineSettings;
    use crate::pipeline::stubs::{KeywordScorer, ScriptedSource};

    async fn scheduler(interval_secs: u64) -> (BatchScheduler, Arc<RunStatus>) {
        let store = SqliteStore::open(":memory:").await.unwrap();
        store
            .seed_assets(&[("AAPL".to_string(), "Apple Inc.".to_string())])
            .await
            .unwrap();
        let today = Utc::now().date_naive().format("%Y-%m-%dT08:00:00").to_string();
        let source = ScriptedSource::default().with("AAPL", "https://n/1", "Apple beats", &today);
        let pipeline = Pipeline::new(
            Arc::new(store),
            Arc::new(source),
            Arc::new(KeywordScorer),
            PipelineSettings::default(),
        );
        let status = Arc::new(RunStatus::new());
        (
            BatchScheduler::new(Arc::new(pipeline), status.clone(), interval_secs),
            status,
        )
    }

    #[tokio::test]
    async fn run_once_updates_status() {
        let (sched, status) = scheduler(0).await;
        let report = sched.run_once().await.unwrap();
        assert_eq!(report.briefs_written, 1);

        let snap = status.snapshot();
        assert!(!snap.running);
        assert!(snap.last_finished_at_ns.is_some());
        assert_eq!(snap.last_summary.unwrap().articles_added, 1);
        assert_eq!(snap.failed_batches, 0);
    }

    #[tokio::test]
    async fn interval_reruns_batch_and_updates_status() {
        let (sched, status) = scheduler(1).await;
        sched.run_once().await.unwrap();
        let first = status.snapshot().last_finished_at_ns.unwrap();

        let handle = tokio::spawn(sched.run());
        let mut second = None;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let snap = status.snapshot();
            if !snap.running && snap.last_finished_at_ns.is_some_and(|ns| ns > first) {
                second = Some(snap);
                break;
            }
        }
        handle.abort();

        let snap = second.expect("no second batch within 5s");
        assert_eq!(snap.failed_batches, 0);
        // Second pass finds nothing new to ingest or score.
        let summary = snap.last_summary.unwrap();
        assert_eq!(summary.articles_added, 0);
        assert_eq!(summary.score.ok, 0);
        assert_eq!(summary.briefs_written, 1);
    }

    #[tokio::test]
    async fn zero_interval_returns_immediately() {
        let (sched, status) = scheduler(0).await;
        sched.run().await;
        assert!(status.snapshot().last_finished_at_ns.is_none());
    }
}
