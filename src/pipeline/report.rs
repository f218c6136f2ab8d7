use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ingest,
    Score,
    Aggregate,
    Brief,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Ingest => "ingest",
            Stage::Score => "score",
            Stage::Aggregate => "aggregate",
            Stage::Brief => "brief",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ItemStatus {
    Ok,
    Failed(String),
    Skipped(String),
}

/// Result of one unit of work inside a batch (one asset fetched, one article
/// scored, one record aggregated, one brief written).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemOutcome {
    pub stage: Stage,
    /// Ticker, `news:<id>`, `record:<index>` and so on.
    pub key: String,
    #[serde(flatten)]
    pub status: ItemStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageCounts {
    pub ok: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Counts-only view of a [`BatchReport`], kept by the run status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub ingest: StageCounts,
    pub score: StageCounts,
    pub aggregate: StageCounts,
    pub brief: StageCounts,
    pub articles_added: u64,
    pub metrics_written: usize,
    pub briefs_written: usize,
    pub template_fallbacks: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<ItemOutcome>,
    pub articles_added: u64,
    pub metrics_written: usize,
    pub briefs_written: usize,
    /// Model briefs that fell back to the template.
    pub template_fallbacks: usize,
}

impl BatchReport {
    pub fn ok(&mut self, stage: Stage, key: impl Into<String>) {
        self.push(stage, key, ItemStatus::Ok);
    }

    pub fn fail(&mut self, stage: Stage, key: impl Into<String>, reason: impl Into<String>) {
        self.push(stage, key, ItemStatus::Failed(reason.into()));
    }

    pub fn skip(&mut self, stage: Stage, key: impl Into<String>, reason: impl Into<String>) {
        self.push(stage, key, ItemStatus::Skipped(reason.into()));
    }

    fn push(&mut self, stage: Stage, key: impl Into<String>, status: ItemStatus) {
        self.outcomes.push(ItemOutcome {
            stage,
            key: key.into(),
            status,
        });
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, ItemStatus::Failed(_)))
    }

    pub fn counts(&self, stage: Stage) -> StageCounts {
        self.outcomes
            .iter()
            .filter(|o| o.stage == stage)
            .fold(StageCounts::default(), |mut c, o| {
                match o.status {
                    ItemStatus::Ok => c.ok += 1,
                    ItemStatus::Failed(_) => c.failed += 1,
                    ItemStatus::Skipped(_) => c.skipped += 1,
                }
                c
            })
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            ingest: self.counts(Stage::Ingest),
            score: self.counts(Stage::Score),
            aggregate: self.counts(Stage::Aggregate),
            brief: self.counts(Stage::Brief),
            articles_added: self.articles_added,
            metrics_written: self.metrics_written,
            briefs_written: self.briefs_written,
            template_fallbacks: self.template_fallbacks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_are_per_stage() {
        let mut r = BatchReport::default();
        r.ok(Stage::Ingest, "AAPL");
        r.fail(Stage::Ingest, "MSFT", "timeout");
        r.ok(Stage::Score, "news:1");
        r.skip(Stage::Aggregate, "record:3", "missing_score");

        assert_eq!(r.counts(Stage::Ingest), StageCounts { ok: 1, failed: 1, skipped: 0 });
        assert_eq!(r.counts(Stage::Aggregate).skipped, 1);
        assert_eq!(r.counts(Stage::Brief), StageCounts::default());

        let failures: Vec<&str> = r.failures().map(|o| o.key.as_str()).collect();
        assert_eq!(failures, vec!["MSFT"]);
    }

    #[test]
    fn outcome_serialises_flat() {
        let mut r = BatchReport::default();
        r.fail(Stage::Score, "news:9", "HTTP 503");
        let v = serde_json::to_value(&r.outcomes[0]).unwrap();
        assert_eq!(
            v,
            serde_json::json!({"stage": "score", "key": "news:9", "status": "failed", "reason": "HTTP 503"})
        );
    }
}
