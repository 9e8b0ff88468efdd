//! Circuit Breaker implementation for fault tolerance
//!
//! The circuit breaker prevents cascading failures by failing fast when a
//! service is experiencing issues. It has three states:
//! - Closed: Normal operation, requests pass through
//! - Open: Service is unhealthy, requests fail immediately
//! - HalfOpen: Testing if service has recovered
//!
//! Recovery is probe-based: once `recovery_timeout` has elapsed since the
//! last recorded failure, the next call runs as a single half-open trial.
//! One trial success closes the circuit and zeroes the failure count; one
//! trial failure reopens it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// State of the circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, requests pass through normally
    Closed,
    /// Circuit is open, requests fail immediately
    Open,
    /// Circuit is half-open, testing service recovery with one trial call
    HalfOpen,
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: usize,
    /// Duration since the last failure before a half-open probe is allowed
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_millis(60_000),
        }
    }
}

/// Error returned by [`CircuitBreaker::execute`]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BreakerError<E> {
    /// The circuit is open; the operation was not invoked
    #[error("circuit breaker is open")]
    Open,

    /// The operation ran and failed
    #[error(transparent)]
    Inner(E),
}

impl<E> BreakerError<E> {
    /// The operation's own error, if it ran
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Open => None,
            Self::Inner(e) => Some(e),
        }
    }
}

/// Internal state of the circuit breaker
#[derive(Debug)]
struct CircuitBreakerState {
    state: CircuitState,
    consecutive_failures: usize,
    last_failure_at: Option<Instant>,
}

impl CircuitBreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
        }
    }
}

/// Circuit breaker for protecting against cascading failures
///
/// # Example
/// ```no_run
/// use relay_core_resilience::{CircuitBreaker, CircuitBreakerConfig};
///
/// # async fn example() {
/// let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
///
/// let result = breaker
///     .execute(|| async { Ok::<_, String>(42) })
///     .await;
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: Arc<CircuitBreakerConfig>,
    state: Arc<Mutex<CircuitBreakerState>>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given configuration
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config: Arc::new(config),
            state: Arc::new(Mutex::new(CircuitBreakerState::new())),
        }
    }

    /// Create a new circuit breaker with default configuration
    pub fn new_default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }

    /// Get the current state of the circuit breaker
    pub async fn state(&self) -> CircuitState {
        self.state.lock().await.state
    }

    /// Get the current consecutive failure count
    pub async fn failure_count(&self) -> usize {
        self.state.lock().await.consecutive_failures
    }

    /// Force the breaker back to closed with zero failures (administrative)
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.state = CircuitState::Closed;
        state.consecutive_failures = 0;
        state.last_failure_at = None;
    }

    /// Execute an operation with circuit breaker protection.
    ///
    /// In `Closed` or `HalfOpen` the operation is invoked; in `Open` the
    /// call fails immediately with [`BreakerError::Open`] unless the
    /// recovery timeout has elapsed, which admits exactly one trial.
    pub async fn execute<F, Fut, T, E>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        self.check_and_update_state().await?;

        match op().await {
            Ok(result) => {
                self.on_success().await;
                Ok(result)
            }
            Err(e) => {
                self.on_failure().await;
                Err(BreakerError::Inner(e))
            }
        }
    }

    /// Check circuit state, transitioning open -> half-open when the
    /// recovery timeout has elapsed since the last failure
    async fn check_and_update_state<E>(&self) -> Result<(), BreakerError<E>> {
        let mut state = self.state.lock().await;

        match state.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                let elapsed = state
                    .last_failure_at
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::MAX);

                if elapsed > self.config.recovery_timeout {
                    debug!("recovery timeout elapsed, admitting half-open trial");
                    state.state = CircuitState::HalfOpen;
                    Ok(())
                } else {
                    Err(BreakerError::Open)
                }
            }
        }
    }

    async fn on_success(&self) {
        let mut state = self.state.lock().await;

        match state.state {
            CircuitState::Closed => {
                state.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                debug!("half-open trial succeeded, closing circuit");
                state.state = CircuitState::Closed;
                state.consecutive_failures = 0;
                state.last_failure_at = None;
            }
            CircuitState::Open => {
                // Should not happen, but reset to closed if it does
                state.state = CircuitState::Closed;
                state.consecutive_failures = 0;
            }
        }
    }

    async fn on_failure(&self) {
        let mut state = self.state.lock().await;
        state.last_failure_at = Some(Instant::now());

        match state.state {
            CircuitState::Closed => {
                state.consecutive_failures += 1;

                if state.consecutive_failures >= self.config.failure_threshold {
                    warn!(
                        failures = state.consecutive_failures,
                        "failure threshold reached, opening circuit"
                    );
                    state.state = CircuitState::Open;
                }
            }
            CircuitState::HalfOpen => {
                warn!("half-open trial failed, reopening circuit");
                state.state = CircuitState::Open;
            }
            CircuitState::Open => {
                // Already open, nothing to do
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_closed_to_open_at_threshold() {
        let config = CircuitBreakerConfig {
            failure_threshold: 3,
            recovery_timeout: Duration::from_millis(100),
        };
        let breaker = CircuitBreaker::new(config);

        for _ in 0..3 {
            let result: Result<(), _> = breaker.execute(|| async { Err("boom") }).await;
            assert!(result.is_err());
        }

        assert_eq!(breaker.state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn test_open_rejects_without_invoking() {
        let config = CircuitBreakerConfig {
            failure_threshold: 2,
            recovery_timeout: Duration::from_secs(60),
        };
        let breaker = CircuitBreaker::new(config);

        for _ in 0..2 {
            let _: Result<(), _> = breaker.execute(|| async { Err("boom") }).await;
        }

        let mut invoked = false;
        let result: Result<(), BreakerError<&str>> = breaker
            .execute(|| {
                invoked = true;
                async { Ok(()) }
            })
            .await;

        assert!(!invoked);
        assert_eq!(result, Err(BreakerError::Open));
    }

    #[tokio::test]
    async fn test_half_open_success_closes_and_zeroes_failures() {
        let config = CircuitBreakerConfig {
            failure_threshold: 2,
            recovery_timeout: Duration::from_millis(20),
        };
        let breaker = CircuitBreaker::new(config);

        for _ in 0..2 {
            let _: Result<(), _> = breaker.execute(|| async { Err("boom") }).await;
        }
        assert_eq!(breaker.state().await, CircuitState::Open);

        // Wait out the recovery timeout, then one trial success closes
        tokio::time::sleep(Duration::from_millis(30)).await;
        let result = breaker.execute(|| async { Ok::<_, &str>(()) }).await;

        assert!(result.is_ok());
        assert_eq!(breaker.state().await, CircuitState::Closed);
        assert_eq!(breaker.failure_count().await, 0);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let config = CircuitBreakerConfig {
            failure_threshold: 1,
            recovery_timeout: Duration::from_millis(20),
        };
        let breaker = CircuitBreaker::new(config);

        let _: Result<(), _> = breaker.execute(|| async { Err("boom") }).await;
        assert_eq!(breaker.state().await, CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(30)).await;
        let _: Result<(), _> = breaker.execute(|| async { Err("still down") }).await;

        assert_eq!(breaker.state().await, CircuitState::Open);

        // And the fresh failure restarts the recovery window
        let result: Result<(), BreakerError<&str>> =
            breaker.execute(|| async { Ok(()) }).await;
        assert_eq!(result, Err(BreakerError::Open));
    }

    #[tokio::test]
    async fn test_success_resets_failure_streak() {
        let config = CircuitBreakerConfig {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(60),
        };
        let breaker = CircuitBreaker::new(config);

        let _: Result<(), _> = breaker.execute(|| async { Err("boom") }).await;
        let _: Result<(), _> = breaker.execute(|| async { Err("boom") }).await;
        let _ = breaker.execute(|| async { Ok::<_, &str>(()) }).await;
        let _: Result<(), _> = breaker.execute(|| async { Err("boom") }).await;

        // Streak was broken, so two more failures are needed to open
        assert_eq!(breaker.state().await, CircuitState::Closed);
        assert_eq!(breaker.failure_count().await, 1);
    }

    #[tokio::test]
    async fn test_reset() {
        let config = CircuitBreakerConfig {
            failure_threshold: 1,
            ..Default::default()
        };
        let breaker = CircuitBreaker::new(config);

        let _: Result<(), _> = breaker.execute(|| async { Err("boom") }).await;
        assert_eq!(breaker.state().await, CircuitState::Open);

        breaker.reset().await;

        assert_eq!(breaker.state().await, CircuitState::Closed);
        assert_eq!(breaker.failure_count().await, 0);
    }
}
