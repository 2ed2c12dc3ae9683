//! Bounded retry with a fixed delay.

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{ConstantBuilder, Retryable};
use rk_config::ProcedureConfig;

/// How often and how far apart an operation is attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    /// Pause between two attempts
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(15))
    }
}

impl From<&ProcedureConfig> for RetryPolicy {
    fn from(config: &ProcedureConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_millis(config.retry_delay_ms))
    }
}

/// The final failure after every attempt failed
#[derive(Debug, Clone, PartialEq)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Run `operation` until it succeeds or `policy.max_attempts` attempts have
/// failed, sleeping `policy.delay` between attempts.
///
/// The operation receives the 1-based attempt number. A policy with zero
/// attempts still runs the operation once.
pub async fn retry_fixed<F, Fut, T, E>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, RetryExhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    // backon counts retries, not attempts
    let max_attempts = policy.max_attempts.max(1);
    let backoff = ConstantBuilder::default()
        .with_delay(policy.delay)
        .with_max_times(max_attempts.saturating_sub(1) as usize);

    let attempt_count = AtomicU32::new(0);

    let run_attempt = || {
        let attempt = attempt_count.fetch_add(1, Ordering::SeqCst) + 1;
        operation(attempt)
    };

    run_attempt
        .retry(backoff)
        .sleep(tokio::time::sleep)
        .notify(|err: &E, delay: Duration| {
            tracing::warn!(
                attempt = attempt_count.load(Ordering::SeqCst),
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Attempt failed, retrying"
            );
        })
        .await
        .map_err(|last_error| RetryExhausted {
            attempts: attempt_count.load(Ordering::SeqCst),
            last_error,
        })
}
