//! Error types for the research console.
//!
//! Submission-path errors ([`SessionError`]) are always surfaced to the user
//! as an `error` event by the controller. Storage and payload decoding
//! problems are recovered locally and only logged.

use thiserror::Error;

/// Failure of a request/response or push-channel call.
#[derive(Error, Debug)]
pub enum TransportError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the server, or a generic fallback.
        message: String,
    },

    /// Push stream ended unexpectedly.
    #[error("Push stream ended unexpectedly")]
    StreamEnded,
}

impl TransportError {
    /// Message suitable for the output log.
    ///
    /// API errors show the server's own message verbatim.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Rejection or failure of a session operation.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Input rejected before any network call.
    #[error("{0}")]
    Validation(String),

    /// A job is already active in this session.
    #[error("Research is already in progress. Please wait for it to complete.")]
    Conflict,

    /// Transport failure while talking to the server.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The session runtime is no longer running.
    #[error("session runtime has stopped")]
    Closed,
}

impl SessionError {
    /// Message rendered into the output log for this error.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(err) => err.user_message(),
            other => other.to_string(),
        }
    }

    /// Whether the server was contacted and the call failed.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Key-value storage failure.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = TransportError> = std::result::Result<T, E>;
