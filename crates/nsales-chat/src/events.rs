//! Stream controller event types

use nsales_client::{ChatMessage, ChatStreamChunk, ToolStatus};
use serde::{Deserialize, Serialize};

/// Events emitted while a streamed request runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A request was handed to the transport
    Started {
        request_id: String,
        session_id: String,
    },

    /// A chunk was decoded and folded into the turn
    Chunk {
        request_id: String,
        chunk: ChatStreamChunk,
    },

    /// The tool side channel changed status
    ToolStatus {
        request_id: String,
        tool_name: String,
        from: Option<ToolStatus>,
        to: ToolStatus,
    },

    /// The terminal chunk arrived
    Completed {
        request_id: String,
        message: ChatMessage,
    },

    /// A newer request replaced this one
    Superseded {
        request_id: String,
        by: String,
    },

    /// The request was aborted by the caller
    Aborted { request_id: String },

    /// The request failed
    Error { request_id: String, message: String },
}

impl StreamEvent {
    /// Request this event belongs to
    pub fn request_id(&self) -> &str {
        match self {
            StreamEvent::Started { request_id, .. }
            | StreamEvent::Chunk { request_id, .. }
            | StreamEvent::ToolStatus { request_id, .. }
            | StreamEvent::Completed { request_id, .. }
            | StreamEvent::Superseded { request_id, .. }
            | StreamEvent::Aborted { request_id }
            | StreamEvent::Error { request_id, .. } => request_id,
        }
    }

    /// Check if this is a terminal event
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamEvent::Completed { .. }
                | StreamEvent::Superseded { .. }
                | StreamEvent::Aborted { .. }
                | StreamEvent::Error { .. }
        )
    }
}
