//! Error taxonomy shared by the resilience primitives
//!
//! Failures are classified along the axes the retry engine and circuit
//! breaker care about: transient failures (network, timeout) may be retried,
//! permanent failures (protocol, application) must surface immediately.

use std::time::Duration;
use thiserror::Error;

/// Classified failure produced or consumed by the resilience primitives
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResilienceError {
    /// Transport could not complete (connection refused, DNS failure, reset)
    #[error("network error: {0}")]
    Network(String),

    /// The operation exceeded its deadline and was cancelled
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// A frame or response body could not be parsed or failed shape checks
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A well-formed response indicating a logical failure
    #[error("application error {code}: {message}")]
    Application { code: String, message: String },

    /// Retry or reconnection budget exhausted
    #[error("exhausted after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },

    /// The circuit breaker is currently rejecting calls
    #[error("circuit breaker is open")]
    CircuitOpen,
}

impl ResilienceError {
    /// Transient failures are worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }

    /// Permanent failures must surface immediately, never retried
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Protocol(_) | Self::Application { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ResilienceError::Network("refused".to_string()).is_transient());
        assert!(ResilienceError::Timeout(Duration::from_secs(30)).is_transient());
        assert!(!ResilienceError::Protocol("bad frame".to_string()).is_transient());
    }

    #[test]
    fn test_permanent_classification() {
        assert!(ResilienceError::Protocol("bad frame".to_string()).is_permanent());
        assert!(ResilienceError::Application {
            code: "HTTP_404".to_string(),
            message: "Not Found".to_string(),
        }
        .is_permanent());
        assert!(!ResilienceError::Network("refused".to_string()).is_permanent());
    }
}
