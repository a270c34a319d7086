//! nsales-client: wire layer for the NSales chat backend
//!
//! This crate provides the wire types exchanged with the chat service, a REST
//! client for sessions and messages, the server-sent-event transport used for
//! streamed replies, and the accumulator that folds stream chunks into an
//! assistant message.

pub mod client;
pub mod error;
pub mod stream;
pub mod transport;
pub mod types;

pub use client::{ChatClient, ClientConfig};
pub use error::{Error, Result};
pub use stream::{ChunkFold, ToolTransition, Transition, TurnAccumulator, TurnState};
pub use transport::ChunkStream;
pub use types::*;
