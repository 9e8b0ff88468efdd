//! Relay Core Resilience: Pure-logic fault tolerance primitives
//!
//! # Overview
//!
//! This crate provides the building blocks the Relay networking crates use
//! to survive transient failures in the backend:
//!
//! - **Retry Engine**: Re-executes an operation with exponential backoff,
//!   jitter, and pluggable retry predicates
//! - **Circuit Breaker**: Prevents cascading failures by failing fast when a
//!   service is unhealthy
//! - **Response Cache**: Time-bounded key/value store used to short-circuit
//!   duplicate read requests
//!
//! # Key Principles
//!
//! This crate is **pure logic** with zero knowledge of:
//! - Network protocols (HTTP, WebSocket)
//! - Wire formats or envelope shapes
//! - Application-specific concerns
//!
//! It provides generic, composable fault-tolerance patterns that the request
//! pipeline and the stream manager assemble into their own policies.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Request Pipeline / UI           │
//! └─────────────┬───────────────────────────┘
//!               │
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Response Cache                    │  ← Short-circuit reads
//! │  (TTL entries, lazy eviction)           │
//! └─────────────┬───────────────────────────┘
//!               │ miss
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Circuit Breaker                   │  ← Fail-fast protection
//! │  (Tracks failures, opens on threshold)  │
//! └─────────────┬───────────────────────────┘
//!               │
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Retry Engine                      │  ← Transient failure recovery
//! │  (Exponential backoff with jitter)      │
//! └─────────────┬───────────────────────────┘
//!               │
//!               ▼
//!          Backend Service
//! ```
//!
//! # Usage Example
//!
//! ```no_run
//! use relay_core_resilience::retry::{retry_with, RetryPolicy};
//! use relay_core_resilience::ResilienceError;
//!
//! # async fn example() {
//! let policy = RetryPolicy::default();
//!
//! let result = retry_with(
//!     &policy,
//!     || async {
//!         // Your potentially failing operation
//!         Ok::<_, ResilienceError>(42)
//!     },
//!     |err, _attempt| err.is_transient(),
//!     |err, attempt| tracing::warn!(attempt, %err, "retrying"),
//! )
//! .await;
//! # }
//! ```

pub mod cache;
pub mod circuit_breaker;
pub mod error;
pub mod retry;

// Re-export main types for convenience
pub use cache::ResponseCache;
pub use circuit_breaker::{BreakerError, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use error::ResilienceError;
pub use retry::{retry, retry_with, RetryFailure, RetryPolicy};

/// Prelude module for convenient imports
///
/// # Example
/// ```
/// use relay_core_resilience::prelude::*;
/// ```
pub mod prelude {
    pub use super::cache::ResponseCache;
    pub use super::circuit_breaker::{
        BreakerError, CircuitBreaker, CircuitBreakerConfig, CircuitState,
    };
    pub use super::error::ResilienceError;
    pub use super::retry::{retry, retry_with, RetryFailure, RetryPolicy};
}
