//! Inbound frame model and validation
//!
//! Every frame on the wire is a JSON envelope:
//!
//! ```text
//! { "type": "...", "timestamp": "...", "session_id": "...", "data": { ... } }
//! ```
//!
//! Decoding is two-stage: [`parse_frame`] first checks the envelope shape
//! (valid JSON object, string `type`, `timestamp` present) so that shape
//! errors and unknown discriminants produce distinct, useful diagnostics,
//! then dispatches into the typed [`StreamMessage`] payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StreamError;

/// A decoded server-to-client frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    /// First frame after a successful handshake.
    ConnectionEstablished {
        timestamp: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        #[serde(default)]
        data: ConnectionData,
    },
    /// The backend produced a research plan for review.
    PlanGenerated {
        timestamp: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        data: PlanData,
    },
    /// One plan section finished researching.
    SectionCompleted {
        timestamp: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        data: SectionData,
    },
    /// The final report is ready.
    ReportGenerated {
        timestamp: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        data: ReportData,
    },
    /// Progress note while the backend works.
    StatusUpdate {
        timestamp: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        data: StatusData,
    },
    /// The backend is blocked on a human decision.
    UserInputRequired {
        timestamp: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        data: PromptData,
    },
    /// The backend reported a failure for this session.
    Error {
        timestamp: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        data: ErrorData,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanData {
    #[serde(default)]
    pub sections: Vec<PlanSectionData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanSectionData {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionData {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportData {
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusData {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptData {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorData {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

impl StreamMessage {
    /// Wire discriminant of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            StreamMessage::ConnectionEstablished { .. } => "connection_established",
            StreamMessage::PlanGenerated { .. } => "plan_generated",
            StreamMessage::SectionCompleted { .. } => "section_completed",
            StreamMessage::ReportGenerated { .. } => "report_generated",
            StreamMessage::StatusUpdate { .. } => "status_update",
            StreamMessage::UserInputRequired { .. } => "user_input_required",
            StreamMessage::Error { .. } => "error",
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            StreamMessage::ConnectionEstablished { timestamp, .. }
            | StreamMessage::PlanGenerated { timestamp, .. }
            | StreamMessage::SectionCompleted { timestamp, .. }
            | StreamMessage::ReportGenerated { timestamp, .. }
            | StreamMessage::StatusUpdate { timestamp, .. }
            | StreamMessage::UserInputRequired { timestamp, .. }
            | StreamMessage::Error { timestamp, .. } => *timestamp,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            StreamMessage::ConnectionEstablished { session_id, .. }
            | StreamMessage::PlanGenerated { session_id, .. }
            | StreamMessage::SectionCompleted { session_id, .. }
            | StreamMessage::ReportGenerated { session_id, .. }
            | StreamMessage::StatusUpdate { session_id, .. }
            | StreamMessage::UserInputRequired { session_id, .. }
            | StreamMessage::Error { session_id, .. } => session_id.as_deref(),
        }
    }
}

/// Decode one text frame into a [`StreamMessage`].
///
/// Envelope-shape problems (not JSON, not an object, missing or non-string
/// `type`, missing `timestamp`) and payload problems (unknown discriminant,
/// field type mismatch) all map to [`StreamError::Parse`], worded so logs
/// point at the actual defect.
pub fn parse_frame(text: &str) -> Result<StreamMessage, StreamError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|err| StreamError::Parse(format!("frame is not valid JSON: {err}")))?;

    let object = value
        .as_object()
        .ok_or_else(|| StreamError::Parse("frame is not a JSON object".to_string()))?;

    match object.get("type") {
        Some(Value::String(_)) => {}
        Some(_) => {
            return Err(StreamError::Parse(
                "frame `type` is not a string".to_string(),
            ))
        }
        None => return Err(StreamError::Parse("frame is missing `type`".to_string())),
    }
    if !object.contains_key("timestamp") {
        return Err(StreamError::Parse(
            "frame is missing `timestamp`".to_string(),
        ));
    }

    serde_json::from_value(value)
        .map_err(|err| StreamError::Parse(format!("unrecognized frame: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_connection_established() {
        let frame = json!({
            "type": "connection_established",
            "timestamp": "2025-01-15T12:00:00Z",
            "session_id": "s-1",
            "data": { "server_version": "1.4.2" }
        });
        let message = parse_frame(&frame.to_string()).expect("decodes");
        assert_eq!(message.kind(), "connection_established");
        assert_eq!(message.session_id(), Some("s-1"));
    }

    #[test]
    fn decodes_plan_generated_with_sections() {
        let frame = json!({
            "type": "plan_generated",
            "timestamp": "2025-01-15T12:00:00Z",
            "session_id": "s-1",
            "data": {
                "sections": [
                    { "title": "Background", "description": "context" },
                    { "title": "Findings" }
                ]
            }
        });
        match parse_frame(&frame.to_string()).expect("decodes") {
            StreamMessage::PlanGenerated { data, .. } => {
                assert_eq!(data.sections.len(), 2);
                assert_eq!(data.sections[1].title, "Findings");
                assert!(data.sections[1].description.is_empty());
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn decodes_error_frame() {
        let frame = json!({
            "type": "error",
            "timestamp": "2025-01-15T12:00:00Z",
            "data": { "code": "RESEARCH_FAILED", "message": "model backend unavailable" }
        });
        match parse_frame(&frame.to_string()).expect("decodes") {
            StreamMessage::Error { data, session_id, .. } => {
                assert_eq!(data.code.as_deref(), Some("RESEARCH_FAILED"));
                assert_eq!(data.message, "model backend unavailable");
                assert!(session_id.is_none());
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn rejects_non_json_frames() {
        let err = parse_frame("not json at all").unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[test]
    fn rejects_non_object_frames() {
        let err = parse_frame("[1, 2, 3]").unwrap_err();
        assert!(err.to_string().contains("not a JSON object"));
    }

    #[test]
    fn rejects_missing_type() {
        let frame = json!({ "timestamp": "2025-01-15T12:00:00Z", "data": {} });
        let err = parse_frame(&frame.to_string()).unwrap_err();
        assert!(err.to_string().contains("missing `type`"));
    }

    #[test]
    fn rejects_non_string_type() {
        let frame = json!({ "type": 7, "timestamp": "2025-01-15T12:00:00Z" });
        let err = parse_frame(&frame.to_string()).unwrap_err();
        assert!(err.to_string().contains("`type` is not a string"));
    }

    #[test]
    fn rejects_missing_timestamp() {
        let frame = json!({ "type": "status_update", "data": { "status": "working" } });
        let err = parse_frame(&frame.to_string()).unwrap_err();
        assert!(err.to_string().contains("missing `timestamp`"));
    }

    #[test]
    fn rejects_unknown_discriminant() {
        let frame = json!({
            "type": "telemetry_blip",
            "timestamp": "2025-01-15T12:00:00Z",
            "data": {}
        });
        let err = parse_frame(&frame.to_string()).unwrap_err();
        assert!(matches!(err, StreamError::Parse(_)));
        assert!(err.to_string().contains("unrecognized frame"));
    }

    #[test]
    fn serializes_with_snake_case_discriminant() {
        let message = StreamMessage::StatusUpdate {
            timestamp: "2025-01-15T12:00:00Z".parse().expect("timestamp"),
            session_id: Some("s-1".to_string()),
            data: StatusData {
                status: "researching".to_string(),
                message: None,
            },
        };
        let value = serde_json::to_value(&message).expect("serializes");
        assert_eq!(value["type"], "status_update");
        assert_eq!(value["data"]["status"], "researching");
    }
}
