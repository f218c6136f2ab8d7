//! Read-only JSON API over the store, plus run status and latency stats.

pub mod health;
pub mod latency;
pub mod routes;

pub use health::RunStatus;
pub use latency::LatencyStats;
pub use routes::{router, ApiState};
