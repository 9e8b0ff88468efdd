//! Retry engine: exponential backoff with jitter and pluggable predicates
//!
//! Re-executes an async operation until success or exhaustion. The k-th
//! retry waits `min(base_delay * backoff_factor^(k-1), max_delay)`, scaled
//! by a random jitter factor in `[0.5, 1.0]` to avoid synchronized retry
//! storms across clients. The suspension is cooperative (`tokio::time::
//! sleep`) and never blocks other in-flight operations.
//!
//! # Example
//!
//! ```no_run
//! use relay_core_resilience::retry::{retry, RetryPolicy};
//! use relay_core_resilience::ResilienceError;
//!
//! # async fn example() {
//! let policy = RetryPolicy::default();
//! let result = retry(&policy, || async {
//!     // Your potentially failing operation
//!     Ok::<_, ResilienceError>(42)
//! })
//! .await;
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::debug;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of invocations, including the first attempt
    pub max_attempts: u32,

    /// Delay before the first retry
    pub base_delay: Duration,

    /// Maximum delay (caps exponential backoff)
    pub max_delay: Duration,

    /// Multiplier applied to the delay on each successive retry
    pub backoff_factor: f64,

    /// Apply random jitter in [0.5, 1.0] to each delay
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            backoff_factor: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Unjittered delay before the retry following attempt `attempt` (1-based):
    /// `min(base_delay * backoff_factor^(attempt-1), max_delay)`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.powi(attempt.saturating_sub(1) as i32);
        let delay_ms = (self.base_delay.as_millis() as f64 * factor) as u64;
        Duration::from_millis(delay_ms).min(self.max_delay)
    }

    /// Delay with jitter applied (if enabled)
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let delay = self.delay_for_attempt(attempt);
        if !self.jitter {
            return delay;
        }
        let scale: f64 = rand::rng().random_range(0.5..=1.0);
        Duration::from_secs_f64(delay.as_secs_f64() * scale)
    }
}

/// Failure outcome of a retried operation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RetryFailure<E> {
    /// Every attempt failed; carries the last underlying error and the
    /// total number of invocations
    #[error("retry budget exhausted after {attempts} attempts: {source}")]
    Exhausted { attempts: u32, source: E },

    /// The retry predicate declined to retry; the underlying error is
    /// propagated unwrapped
    #[error(transparent)]
    Rejected(E),
}

impl<E> RetryFailure<E> {
    /// The underlying error, regardless of how retrying ended
    pub fn into_inner(self) -> E {
        match self {
            Self::Exhausted { source, .. } | Self::Rejected(source) => source,
        }
    }
}

/// Retry an operation with the given policy, always retrying on failure.
pub async fn retry<F, Fut, T, E>(policy: &RetryPolicy, op: F) -> Result<T, RetryFailure<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error,
{
    retry_with(policy, op, |_, _| true, |_, _| {}).await
}

/// Retry an operation with a retry predicate and a per-retry hook.
///
/// `should_retry(error, attempt)` is consulted after each failed attempt
/// that has budget remaining; returning `false` propagates the error
/// immediately without wrapping. `on_retry(error, attempt)` runs before
/// each backoff suspension.
pub async fn retry_with<F, Fut, T, E, P, H>(
    policy: &RetryPolicy,
    mut op: F,
    mut should_retry: P,
    mut on_retry: H,
) -> Result<T, RetryFailure<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error,
    P: FnMut(&E, u32) -> bool,
    H: FnMut(&E, u32),
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= policy.max_attempts => {
                debug!(attempts = attempt, error = %e, "retry budget exhausted");
                return Err(RetryFailure::Exhausted {
                    attempts: attempt,
                    source: e,
                });
            }
            Err(e) => {
                if !should_retry(&e, attempt) {
                    debug!(attempt, error = %e, "retry predicate rejected, propagating");
                    return Err(RetryFailure::Rejected(e));
                }

                on_retry(&e, attempt);

                let delay = policy.jittered_delay(attempt);
                debug!(attempt, ?delay, error = %e, "retrying after backoff");
                tokio::time::sleep(delay).await;
            }
        }
    }
}
