//! Shared run status for the /health endpoint.
//! Updated by the batch runner, read by the API.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use serde::Serialize;

use crate::pipeline::BatchSummary;

/// Batch runner status. Updated once per batch, read by the API.
#[derive(Default)]
pub struct RunStatus {
    /// True while a batch is executing.
    running: AtomicBool,
    /// Nanosecond timestamp of the last finished batch (0 = none yet).
    last_finished_at_ns: AtomicU64,
    /// Batches that aborted with an error.
    failed_batches: AtomicU64,
    last_summary: Mutex<Option<BatchSummary>>,
    last_error: Mutex<Option<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub running: bool,
    pub last_finished_at_ns: Option<u64>,
    pub failed_batches: u64,
    pub last_summary: Option<BatchSummary>,
    pub last_error: Option<String>,
}

impl RunStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_started(&self) {
        self.running.store(true, Ordering::Relaxed);
    }

    pub fn mark_finished(&self, at_ns: u64, summary: BatchSummary) {
        self.running.store(false, Ordering::Relaxed);
        self.last_finished_at_ns.store(at_ns, Ordering::Relaxed);
        if let Ok(mut s) = self.last_summary.lock() {
            *s = Some(summary);
        }
        if let Ok(mut e) = self.last_error.lock() {
            *e = None;
        }
    }

    pub fn mark_failed(&self, at_ns: u64, error: String) {
        self.running.store(false, Ordering::Relaxed);
        self.last_finished_at_ns.store(at_ns, Ordering::Relaxed);
        self.failed_batches.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut e) = self.last_error.lock() {
            *e = Some(error);
        }
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let last = self.last_finished_at_ns.load(Ordering::Relaxed);
        HealthSnapshot {
            running: self.running.load(Ordering::Relaxed),
            last_finished_at_ns: (last != 0).then_some(last),
            failed_batches: self.failed_batches.load(Ordering::Relaxed),
            last_summary: self.last_summary.lock().ok().and_then(|s| s.clone()),
            last_error: self.last_error.lock().ok().and_then(|e| e.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_keeps_previous_summary() {
        let status = RunStatus::new();
        assert!(status.snapshot().last_finished_at_ns.is_none());

        status.mark_started();
        assert!(status.snapshot().running);
        status.mark_finished(10, BatchSummary::default());

        status.mark_started();
        status.mark_failed(20, "store unavailable".to_string());

        let snap = status.snapshot();
        assert!(!snap.running);
        assert_eq!(snap.last_finished_at_ns, Some(20));
        assert_eq!(snap.failed_batches, 1);
        assert!(snap.last_summary.is_some());
        assert_eq!(snap.last_error.as_deref(), Some("store unavailable"));
    }
}
