//! nsales-chat: chat session runtime for the NSales assistant
//!
//! This crate drives streamed replies for a session (one active stream at a
//! time, duplicate suppression, abort), normalizes the Google tool results
//! carried on assistant messages, and cleans stored transcripts for display.

pub mod controller;
pub mod conversation;
pub mod error;
pub mod events;
pub mod extract;
pub mod handle;
pub mod history;
pub mod tool_result;
pub mod transport;

pub use controller::{
    ChunkCallback, ErrorCallback, RequestOptions, StreamController, StreamOutcome, StreamTicket,
};
pub use conversation::Conversation;
pub use error::{Error, Result};
pub use events::StreamEvent;
pub use handle::StreamHandle;
pub use history::{cleanse, cleanse_content};
pub use tool_result::{
    CalendarEvent, EmailMessage, Normalizer, ParsedToolResult, ToolInvocation, has_tool_result,
    normalize, tool_result_for,
};
pub use transport::{ChatTransport, HttpTransport};
