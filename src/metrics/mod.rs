//! Per-(asset, day) sentiment aggregation and signal classification.

pub mod aggregator;
pub mod classifier;

pub use aggregator::{aggregate, Aggregation, RecordRejection};
pub use classifier::classify;
