//! Relay Stream: the live event channel to the research backend
//!
//! # Overview
//!
//! While `relay-client` covers request/response traffic, `relay-stream` owns
//! the long-lived WebSocket the backend pushes progress over: plan and report
//! events, section completions, status notes, and prompts that need a human
//! answer.
//!
//! The centerpiece is [`StreamManager`], a supervised connection state
//! machine:
//!
//! - one connection at a time, with a handshake timeout
//! - automatic reconnection with capped exponential backoff and jitter,
//!   abandoning after a configurable attempt budget
//! - frame validation that drops and reports malformed frames without
//!   tearing the connection down
//! - generation-tagged background tasks, so `disconnect()` leaves no zombie
//!   timer or reader behind
//!
//! # Usage Example
//!
//! ```no_run
//! use relay_stream::{StreamCallbacks, StreamConfig, StreamManager};
//!
//! # async fn example() {
//! let callbacks = StreamCallbacks::new()
//!     .on_message(|message| println!("{}", message.kind()))
//!     .on_status_change(|status| println!("stream is {status}"));
//!
//! let manager = StreamManager::new(
//!     StreamConfig::new("ws://localhost:8000/ws/research/s-1"),
//!     callbacks,
//! );
//! manager.connect().await;
//! # }
//! ```

pub mod config;
pub mod error;
pub mod manager;
pub mod message;
pub mod transport;

// Re-export main types for convenience
pub use config::StreamConfig;
pub use error::StreamError;
pub use manager::{ConnectionStatus, StreamCallbacks, StreamManager};
pub use message::{
    parse_frame, ConnectionData, ErrorData, PlanData, PlanSectionData, PromptData, ReportData,
    SectionData, StatusData, StreamMessage,
};
pub use transport::{FrameSink, FrameSource, StreamTransport, WebSocketTransport};
