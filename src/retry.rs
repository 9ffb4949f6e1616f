//! Linear-backoff retry for listing-page fetches.
//!
//! Listing failures are almost always rate limiting, so the delay escalates
//! linearly (`interval × attempt_number`) rather than exponentially, and the
//! attempt count stays small.

use std::future::Future;
use std::time::Duration;

/// Retry configuration for one class of operation.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Base delay; attempt `n` (1-indexed) sleeps `interval × n` after failing.
    pub interval: Duration,
}

/// Retry an async operation with linearly escalating delays.
///
/// Returns the first `Ok`, or the last error once attempts are exhausted.
pub async fn retry_with_linear_backoff<F, Fut, T, E>(
    config: RetryConfig,
    operation: F,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let attempts = config.attempts.max(1);
    let mut last_err: Option<E> = None;

    for attempt in 1..=attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt < attempts {
                    let delay = config.interval * attempt;
                    tracing::warn!(
                        "attempt {}/{} failed, retrying in {:.1}s: {}",
                        attempt,
                        attempts,
                        delay.as_secs_f64(),
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                last_err = Some(e);
            }
        }
    }

    Err(last_err.expect("loop runs at least once"))
}
