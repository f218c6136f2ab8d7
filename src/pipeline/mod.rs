//! Batch orchestration: ingest → score → aggregate → brief.

pub mod batch;
pub mod report;
pub mod scheduler;
#[cfg(test)]
pub(crate) mod stubs;

pub use batch::{Pipeline, PipelineSettings};
pub use report::{BatchReport, BatchSummary, ItemOutcome, ItemStatus, Stage, StageCounts};
pub use scheduler::BatchScheduler;
