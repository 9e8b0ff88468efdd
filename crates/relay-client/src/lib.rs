//! Relay Client: typed HTTP access to the research backend
//!
//! # Overview
//!
//! `relay-client` is the request side of the Relay networking core. It wraps
//! one `reqwest` client in a pipeline that composes:
//!
//! - a **response cache** consulted for idempotent reads before any
//!   transport activity
//! - **request/response interceptor chains** applied in registration order
//! - a **timeout-bounded transport call** (the in-flight call is cancelled
//!   on expiry)
//! - the **retry engine** for network- and timeout-class failures only
//! - a **circuit breaker** that fails fast once the backend looks unhealthy
//!
//! Every call returns the [`ApiResponse`](types::ApiResponse) envelope;
//! failures are classified into typed [`ApiError`](types::ApiError) codes
//! (`NETWORK_ERROR`, `HTTP_<status>`, `DECODE_ERROR`, `CIRCUIT_OPEN`, or the
//! server's own code) rather than surfaced as panics or opaque errors.
//!
//! # Usage Example
//!
//! ```no_run
//! use relay_client::{ApiClient, ClientConfig, NewSession};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ApiClient::new(ClientConfig::new("http://localhost:8000"))?;
//!
//! let created = client
//!     .create_session(&NewSession {
//!         query: "history of error correcting codes".to_string(),
//!         project_id: None,
//!     })
//!     .await;
//!
//! if let Some(session) = created.data {
//!     println!("session {} is {:?}", session.id, session.status);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod types;

// Re-export main types for convenience
pub use client::{ApiClient, RequestInterceptor, RequestOptions, ResponseInterceptor};
pub use config::ClientConfig;
pub use error::ClientError;
pub use types::{
    ApiError, ApiResponse, ExportFormat, ExportedReport, HealthStatus, MetricsSnapshot,
    NewProject, NewSession, Pagination, PlanApproval, PlanFeedback, PlanSection, Project,
    ProjectPatch, Report, ResearchPlan, Session, SessionStatus,
};
