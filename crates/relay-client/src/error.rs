//! Internal transport error classification
//!
//! `ClientError` is the pipeline's working error: it exists between the
//! transport call and the envelope boundary, where every failure is folded
//! into a typed [`ApiError`](crate::types::ApiError). Callers of
//! [`ApiClient::request`](crate::ApiClient::request) never see it.

use std::time::Duration;

use relay_core_resilience::ResilienceError;
use thiserror::Error;

/// Transport-stage failure, before envelope classification
#[derive(Error, Debug)]
pub enum ClientError {
    /// The transport could not complete the exchange
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The request exceeded its deadline and was cancelled
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The request could not be constructed (bad URL, unserializable body)
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// Transport-class failures are retried; anything else surfaces
    /// immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            // A builder error is a malformed request, not a flaky network
            Self::Network(e) => !e.is_builder(),
            Self::Timeout(_) => true,
            Self::InvalidRequest(_) => false,
        }
    }

    /// Envelope error code for this failure class
    pub fn code(&self) -> &'static str {
        match self {
            Self::Network(_) | Self::Timeout(_) => "NETWORK_ERROR",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
        }
    }
}

/// Fold into the shared resilience taxonomy, for callers that aggregate
/// failures across the HTTP and stream stacks.
impl From<ClientError> for ResilienceError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Network(e) => ResilienceError::Network(e.to_string()),
            ClientError::Timeout(deadline) => ResilienceError::Timeout(deadline),
            ClientError::InvalidRequest(message) => ResilienceError::Protocol(message),
        }
    }
}
