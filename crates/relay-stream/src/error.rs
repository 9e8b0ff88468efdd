//! Error types for the stream manager

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the stream manager and its transports.
#[derive(Error, Debug)]
pub enum StreamError {
    /// The transport handshake failed outright.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The transport handshake did not complete within the budget.
    #[error("connection attempt timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// The established connection reported an I/O error.
    #[error("transport error: {0}")]
    Transport(String),

    /// An inbound frame could not be decoded into a known message.
    #[error("malformed frame: {0}")]
    Parse(String),

    /// `send` was called while the stream was not in the connected state.
    #[error("stream is not connected")]
    NotConnected,

    /// Automatic reconnection gave up after exhausting its attempt budget.
    #[error("reconnection abandoned after {attempts} failed attempts")]
    ReconnectExhausted { attempts: u32 },

    /// An outbound payload could not be serialized.
    #[error("failed to serialize outbound message: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StreamError {
    /// True for failures that the reconnection scheduler may recover from.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StreamError::Connect(_) | StreamError::ConnectTimeout(_) | StreamError::Transport(_)
        )
    }
}
