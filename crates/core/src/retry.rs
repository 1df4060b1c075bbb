//! Fixed-delay retry harness for the pipeline's external calls.
//!
//! Stages stay plain async functions; the call site wraps them with
//! [`run_with_policy`] and a [`RetryPolicy`]. Whether a failure is
//! worth retrying is decided mechanically from the error itself via
//! [`Retryable`]: transient I/O is retried, terminal business outcomes
//! never are.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Classifies an error as transient (retry may help) or terminal.
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

/// Tunable parameters for the fixed-delay retry strategy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempt budget, including the first try.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(10),
        }
    }
}

/// Run `op`, retrying transient failures under `policy`.
///
/// Returns the first success, or the last error once the error is
/// terminal, the attempt budget is exhausted, or `cancel` is triggered
/// while waiting to retry.
pub async fn run_with_policy<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                tracing::warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = policy.delay.as_millis() as u64,
                    error = %e,
                    "Transient failure, will retry",
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(e),
                    _ = tokio::time::sleep(policy.delay) => {}
                }
            }
            Err(e) => return Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
