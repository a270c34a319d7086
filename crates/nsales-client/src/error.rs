//! Error types for nsales-client

use thiserror::Error;

/// Result type alias using nsales-client Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the chat backend
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Backend answered with a non-success status
    #[error("API error: {message} (status: {status})")]
    Api { status: u16, message: String },

    /// Stream was aborted by the caller
    #[error("Request aborted")]
    Aborted,

    /// Server-sent events error
    #[error("SSE error: {0}")]
    Sse(String),

    /// Unexpected response format
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create an API error from a status code and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Whether this error only records that the caller cancelled the request.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Error::Aborted)
    }

    /// Check if this error is worth retrying. The client never retries on its
    /// own; this is for callers that want to.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            Error::Sse(_) => true,
            Error::Api { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_server_errors() {
        assert!(Error::api(503, "unavailable").is_retryable());
        assert!(Error::api(500, "boom").is_retryable());
        assert!(Error::api(429, "slow down").is_retryable());
    }

    #[test]
    fn test_not_retryable_client_errors() {
        assert!(!Error::api(404, "Session not found").is_retryable());
        assert!(!Error::api(422, "validation").is_retryable());
    }

    #[test]
    fn test_retryable_sse() {
        assert!(Error::Sse("connection reset".into()).is_retryable());
    }

    #[test]
    fn test_not_retryable_local() {
        assert!(!Error::Aborted.is_retryable());
        assert!(!Error::InvalidConfig("bad url".into()).is_retryable());
        assert!(!Error::UnexpectedResponse("eof".into()).is_retryable());
    }

    #[test]
    fn test_is_aborted() {
        assert!(Error::Aborted.is_aborted());
        assert!(!Error::Sse("x".into()).is_aborted());
    }

    #[test]
    fn test_api_display() {
        let e = Error::api(404, "Session not found");
        assert_eq!(e.to_string(), "API error: Session not found (status: 404)");
    }
}
