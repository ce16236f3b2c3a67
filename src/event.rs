//! Event and wire types exchanged with the research server.
//!
//! Progress information arrives as [`ResearchEvent`]s, either pushed live
//! (wrapped in a [`PushEvent`]) or fetched as a backlog on reload. Kinds are
//! server-defined and open-ended; unknown kinds are kept verbatim in
//! [`EventKind::Other`].
//!
//! # Example
//!
//! ```rust
//! use research_console::event::{EventKind, PushEvent};
//!
//! let event = PushEvent::from_frame("progress_update", r#"{"message":"done","type":"success"}"#)
//!     .unwrap()
//!     .unwrap();
//! assert!(event.is_terminal());
//! assert_eq!(event.event().kind, EventKind::Success);
//! ```

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Kind of a progress event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    /// Plain progress information.
    #[default]
    Info,
    /// Raw output captured from an agent tool, possibly JSON.
    ToolOutput,
    /// The final answer, carrying lightweight inline markup.
    Answer,
    /// The job finished successfully.
    Success,
    /// The job or a request failed.
    Error,
    /// Any kind this client does not know about.
    Other(String),
}

impl EventKind {
    /// Wire name of this kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Info => "info",
            Self::ToolOutput => "tool_output",
            Self::Answer => "answer",
            Self::Success => "success",
            Self::Error => "error",
            Self::Other(name) => name,
        }
    }

    /// Whether this kind ends a job when delivered as a progress update.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

impl From<String> for EventKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "info" => Self::Info,
            "tool_output" => Self::ToolOutput,
            "answer" => Self::Answer,
            "success" => Self::Success,
            "error" => Self::Error,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for EventKind {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single unit of progress information. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchEvent {
    /// Event text. Structured payloads are carried as their JSON text.
    #[serde(deserialize_with = "message_text")]
    pub message: String,
    /// Server-defined kind.
    #[serde(rename = "type", default)]
    pub kind: EventKind,
}

impl ResearchEvent {
    pub fn new(message: impl Into<String>, kind: impl Into<EventKind>) -> Self {
        Self {
            message: message.into(),
            kind: kind.into(),
        }
    }

    /// Shorthand for a client-side `error` event.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message, EventKind::Error)
    }
}

/// Accept any JSON value as a message; non-strings keep their JSON text.
fn message_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Named event delivered over the push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    /// `progress_update`: lifecycle progress, may be terminal.
    Progress(ResearchEvent),
    /// `research_update`: captured agent output.
    Research(ResearchEvent),
}

impl PushEvent {
    pub const PROGRESS: &'static str = "progress_update";
    pub const RESEARCH: &'static str = "research_update";

    /// Decode a named push frame.
    ///
    /// Returns `None` for event names this client does not subscribe to.
    pub fn from_frame(name: &str, data: &str) -> Option<Result<Self, serde_json::Error>> {
        let wrap: fn(ResearchEvent) -> Self = match name {
            Self::PROGRESS => Self::Progress,
            Self::RESEARCH => Self::Research,
            _ => return None,
        };
        Some(serde_json::from_str::<ResearchEvent>(data).map(wrap))
    }

    /// Push event name on the wire.
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Progress(_) => Self::PROGRESS,
            Self::Research(_) => Self::RESEARCH,
        }
    }

    #[must_use]
    pub fn event(&self) -> &ResearchEvent {
        match self {
            Self::Progress(event) | Self::Research(event) => event,
        }
    }

    /// Only progress updates of kind `success` or `error` end a job.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Progress(event) if event.kind.is_terminal())
    }
}

/// Message delivered by a push channel subscription, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushMessage {
    Connected,
    Disconnected,
    Event(PushEvent),
}

/// Model offered by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Request body for `POST /api/research`.
#[derive(Debug, Clone, Serialize)]
pub struct ResearchRequest {
    pub question: String,
    pub model_id: String,
}

/// Success body of `POST /api/research`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitAck {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub question: Option<String>,
}

/// Error body returned by the server on a rejected request.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub error: Option<String>,
}

/// Response of `GET /api/status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JobStatus {
    pub is_processing: bool,
    #[serde(default)]
    pub current_question: Option<String>,
    #[serde(default)]
    pub output_length: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_kind_is_preserved() {
        let event: ResearchEvent =
            serde_json::from_str(r#"{"message":"x","type":"planning"}"#).unwrap();
        assert_eq!(event.kind, EventKind::Other("planning".to_string()));
        assert_eq!(event.kind.as_str(), "planning");
        assert!(!event.kind.is_terminal());
    }

    #[test]
    fn test_missing_kind_defaults_to_info() {
        let event: ResearchEvent = serde_json::from_str(r#"{"message":"hello"}"#).unwrap();
        assert_eq!(event.kind, EventKind::Info);
    }

    #[test]
    fn test_structured_message_kept_as_text() {
        let event: ResearchEvent =
            serde_json::from_str(r#"{"message":{"a":1},"type":"tool_output"}"#).unwrap();
        assert_eq!(event.message, r#"{"a":1}"#);
        assert_eq!(event.kind, EventKind::ToolOutput);
    }

    #[test]
    fn test_only_progress_updates_are_terminal() {
        let success = ResearchEvent::new("done", EventKind::Success);
        assert!(PushEvent::Progress(success.clone()).is_terminal());
        assert!(!PushEvent::Research(success).is_terminal());
        assert!(!PushEvent::Progress(ResearchEvent::new("step", "info")).is_terminal());
    }

    #[test]
    fn test_unsubscribed_frame_is_ignored() {
        assert!(PushEvent::from_frame("message", "{}").is_none());
        assert!(PushEvent::from_frame(PushEvent::RESEARCH, "not json")
            .unwrap()
            .is_err());
    }

    #[test]
    fn test_kind_serializes_as_wire_name() {
        let json = serde_json::to_string(&ResearchEvent::new("x", EventKind::ToolOutput)).unwrap();
        assert_eq!(json, r#"{"message":"x","type":"tool_output"}"#);
    }
}
