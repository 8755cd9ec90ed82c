//! Error types for talking to Consul.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for Consul calls.
pub type ConsulResult<T> = Result<T, ConsulError>;

/// Transport-level failures talking to Consul.
///
/// `Clone` so scripted transports can replay the same failure.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConsulError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("consul returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid json: {0}")]
    Json(String),

    #[error("unexpected response: {0}")]
    Unexpected(String),
}

impl ConsulError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConsulError::Status { status: 404, .. })
    }

    /// Consul refused a request because the session no longer exists.
    pub fn is_invalid_session(&self) -> bool {
        match self {
            ConsulError::Status { body, .. } => {
                let body = body.to_ascii_lowercase();
                body.contains("invalid session") || body.contains("session not found")
            }
            _ => false,
        }
    }
}


impl From<serde_json::Error> for ConsulError {
    fn from(e: serde_json::Error) -> Self {
        ConsulError::Json(e.to_string())
    }
}
