//! Outbound HTTP plumbing shared by the news feed and inference clients.
//! Every request gets the configured timeout and a bounded number of retries
//! with a fixed delay for transient failures.

use std::time::Duration;

use tracing::warn;

use crate::config::Config;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one. Total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            max_retries: cfg.http_max_retries,
            delay: Duration::from_millis(cfg.http_retry_delay_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            delay: Duration::from_millis(500),
        }
    }
}

pub fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("market-news/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Statuses worth a second attempt: request timeout, rate limit, server errors.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500..=599)
}

/// Send the request built by `make`, retrying transient failures.
///
/// `make` is called once per attempt because a `RequestBuilder` is consumed
/// by `send`. Non-success responses that are not retryable, or that are still
/// failing after the last attempt, are returned as errors.
pub async fn send_with_retry<F>(policy: RetryPolicy, what: &str, make: F) -> Result<reqwest::Response>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 0u32;
    loop {
        let can_retry = attempt < policy.max_retries;
        match make().send().await {
            Ok(resp) if can_retry && is_retryable_status(resp.status().as_u16()) => {
                warn!(
                    op = what,
                    status = resp.status().as_u16(),
                    attempt,
                    "{what}: HTTP {}, retrying in {}ms",
                    resp.status(),
                    policy.delay.as_millis(),
                );
            }
            Ok(resp) => return Ok(resp.error_for_status()?),
            Err(e) if can_retry && (e.is_timeout() || e.is_connect()) => {
                warn!(op = what, attempt, "{what}: {e}, retrying in {}ms", policy.delay.as_millis());
            }
            Err(e) => return Err(e.into()),
        }
        attempt += 1;
        tokio::time::sleep(policy.delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use axum::{extract::State, http::StatusCode, routing::get, Router};

    /// Serve `/` returning 503 for the first `failures` hits, then 200.
    async fn flaky_server(failures: u32) -> (String, Arc<AtomicU32>) {
        let hits = Arc::new(AtomicU32::new(0));
        let app = Router::new()
            .route(
                "/",
                get(move |State(hits): State<Arc<AtomicU32>>| async move {
                    let n = hits.fetch_add(1, Ordering::SeqCst);
                    if n < failures {
                        (StatusCode::SERVICE_UNAVAILABLE, "busy")
                    } else {
                        (StatusCode::OK, "ok")
                    }
                }),
            )
            .with_state(Arc::clone(&hits));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/"), hits)
    }

    fn quick(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            delay: Duration::from_millis(5),
        }
    }

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(is_retryable_status(408));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(200));
    }

    #[tokio::test]
    async fn single_retry_recovers_from_one_failure() {
        let (url, hits) = flaky_server(1).await;
        let client = build_client(5).unwrap();
        let resp = send_with_retry(quick(1), "test", || client.get(&url)).await.unwrap();
        assert_eq!(resp.text().await.unwrap(), "ok");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_last_attempt() {
        let (url, hits) = flaky_server(5).await;
        let client = build_client(5).unwrap();
        let res = send_with_retry(quick(1), "test", || client.get(&url)).await;
        assert!(res.is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
