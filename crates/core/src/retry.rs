//! Retry helper — exponential backoff with full jitter.
//!
//! Only transient failure classes (timeouts, rate limits, 5xx, network)
//! are retried; everything else propagates immediately. Delay doubles per
//! attempt, capped, and the actual sleep is drawn uniformly from
//! `[0, delay]` so concurrent retries decorrelate.

use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::LlmError;

/// Classifies an error as retryable or terminal.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for LlmError {
    fn is_transient(&self) -> bool {
        match self {
            LlmError::RateLimited { .. } | LlmError::Timeout(_) | LlmError::Network(_) => true,
            LlmError::ApiError { status_code, .. } => {
                *status_code == 429 || (500..600).contains(status_code)
            }
            _ => false,
        }
    }
}

/// Backoff parameters. Defaults: 5 attempts, 500ms base, 8s cap.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

/// Run `op` with the given policy, retrying transient failures.
///
/// `operation` names the call site for log fields.
pub async fn retry_with<F, Fut, T, E>(
    policy: RetryPolicy,
    operation: &str,
    mut op: F,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Transient + std::fmt::Display,
{
    debug_assert!(policy.max_attempts >= 1);
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if attempt >= policy.max_attempts || !err.is_transient() {
                    return Err(err);
                }
                let ceiling = policy
                    .base_delay
                    .saturating_mul(2u32.saturating_pow(attempt - 1))
                    .min(policy.max_delay);
                let sleep_for = {
                    let mut rng = rand::rng();
                    ceiling.mul_f64(rng.random_range(0.0..=1.0))
                };
                warn!(
                    operation,
                    attempt,
                    delay_ms = sleep_for.as_millis() as u64,
                    error = %err,
                    "Retrying transient failure"
                );
                tokio::time::sleep(sleep_for).await;
            }
        }
    }
}

/// [`retry_with`] under the default policy.
pub async fn retry<F, Fut, T, E>(operation: &str, op: F) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Transient + std::fmt::Display,
{
    retry_with(RetryPolicy::default(), operation, op).await
}
