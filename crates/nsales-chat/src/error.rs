//! Error types for nsales-chat

use thiserror::Error;

/// Result type alias using nsales-chat Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving a chat session
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the transport layer
    #[error(transparent)]
    Client(#[from] nsales_client::Error),

    /// The same submission is already in flight
    #[error("Duplicate request: {0}")]
    DuplicateRequest(String),

    /// A generic session error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the stream ended because it was aborted or superseded
    pub fn is_aborted(&self) -> bool {
        match self {
            Error::Client(e) => e.is_aborted(),
            _ => false,
        }
    }
}
