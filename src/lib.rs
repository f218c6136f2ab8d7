pub mod api;
pub mod brief;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod metrics;
pub mod news;
pub mod pipeline;
pub mod sentiment;
pub mod types;
