//! Folding stream chunks into an assistant message

use crate::types::{ChatMessage, ChatStreamChunk, ToolStatus};

/// Lifecycle of one assistant turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// No chunk seen yet
    Empty,
    /// At least one chunk folded, terminal chunk not yet seen
    Streaming,
    /// Terminal chunk folded; the message is frozen
    Complete,
}

/// What a folded chunk did to the turn
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// First chunk of a turn
    Started,
    /// Fragment appended to an in-progress turn
    Appended,
    /// Terminal chunk; carries the finished message
    Completed(ChatMessage),
    /// A chunk for a different id arrived mid-turn. The partial message of the
    /// previous id is handed back and the new id is now streaming.
    Restarted { abandoned: ChatMessage },
    /// Chunk dropped (late chunk for an already completed turn)
    Ignored,
}

/// A tool status change observed while folding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolTransition {
    pub tool_name: String,
    pub from: Option<ToolStatus>,
    pub to: ToolStatus,
}

/// Result of folding one chunk
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkFold {
    pub transition: Transition,
    pub tool: Option<ToolTransition>,
}

/// Builds an assistant message from ordered stream chunks.
///
/// Fragments are concatenated strictly in the order they are pushed; there is
/// no reordering or buffering. Only a chunk with `is_complete` finishes the
/// turn, tool status updates never do.
#[derive(Debug)]
pub struct TurnAccumulator {
    state: TurnState,
    message: Option<ChatMessage>,
}

impl Default for TurnAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnAccumulator {
    pub fn new() -> Self {
        Self {
            state: TurnState::Empty,
            message: None,
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// The in-progress (or finished) message, if any chunk was folded
    pub fn current(&self) -> Option<&ChatMessage> {
        self.message.as_ref()
    }

    /// Accumulated text so far
    pub fn content(&self) -> &str {
        self.message.as_ref().map(|m| m.content.as_str()).unwrap_or("")
    }

    /// Take the partial message out, resetting to `Empty`
    pub fn take_partial(&mut self) -> Option<ChatMessage> {
        self.state = TurnState::Empty;
        self.message.take()
    }

    /// Fold one chunk into the turn
    pub fn push(&mut self, chunk: ChatStreamChunk) -> ChunkFold {
        let same_id = self.message.as_ref().is_some_and(|m| m.id == chunk.id);

        match self.state {
            TurnState::Complete if same_id => {
                tracing::debug!(message_id = %chunk.id, "Ignoring chunk for completed turn");
                return ChunkFold {
                    transition: Transition::Ignored,
                    tool: None,
                };
            }
            TurnState::Streaming if same_id => {
                let tool = self.apply_tool(&chunk);
                if let Some(message) = self.message.as_mut() {
                    message.content.push_str(&chunk.content);
                }
                return self.finish_fold(chunk.is_complete, Transition::Appended, tool);
            }
            _ => {}
        }

        // Empty, or a new id: implicit Empty -> Streaming for this chunk's id
        let abandoned = match self.state {
            TurnState::Streaming => self.message.take(),
            _ => None,
        };
        if let Some(ref partial) = abandoned {
            tracing::warn!(
                previous_id = %partial.id,
                message_id = %chunk.id,
                "Chunk for a new message id arrived mid-turn"
            );
        }

        let mut message = ChatMessage::from_chunk(&chunk);
        // Tool fields are applied through the transition tracker below
        message.tool_call = None;
        message.tool_status = None;
        message.tool_result = None;
        self.message = Some(message);
        self.state = TurnState::Streaming;

        let tool = self.apply_tool(&chunk);
        let transition = match abandoned {
            Some(abandoned) => Transition::Restarted { abandoned },
            None => Transition::Started,
        };
        self.finish_fold(chunk.is_complete, transition, tool)
    }

    fn finish_fold(
        &mut self,
        is_complete: bool,
        transition: Transition,
        tool: Option<ToolTransition>,
    ) -> ChunkFold {
        if !is_complete {
            return ChunkFold { transition, tool };
        }

        let Some(finished) = self.message.clone() else {
            return ChunkFold { transition, tool };
        };
        self.state = TurnState::Complete;
        // A single-chunk turn after an abandoned one: completion wins
        if let Transition::Restarted { abandoned } = &transition {
            tracing::debug!(abandoned_id = %abandoned.id, "Dropping abandoned partial turn");
        }
        ChunkFold {
            transition: Transition::Completed(finished),
            tool,
        }
    }

    /// Track `running -> {completed | error}` on the current message
    fn apply_tool(&mut self, chunk: &ChatStreamChunk) -> Option<ToolTransition> {
        let name = chunk.tool_call.as_ref()?;
        let message = self.message.as_mut()?;

        if chunk.tool_result.is_some() {
            message.tool_result = chunk.tool_result.clone();
        }

        let previous = message.tool_status;
        let same_tool = message.tool_call.as_deref() == Some(name.as_str());
        message.tool_call = Some(name.clone());

        let next = chunk.tool_status?;
        if same_tool && previous == Some(next) {
            return None;
        }
        if same_tool && previous.is_some_and(|p| p.is_terminal()) {
            tracing::warn!(
                tool = %name,
                from = ?previous,
                to = ?next,
                "Ignoring tool status change after terminal status"
            );
            return None;
        }

        message.tool_status = Some(next);
        Some(ToolTransition {
            tool_name: name.clone(),
            from: if same_tool { previous } else { None },
            to: next,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chunk(id: &str, content: &str, done: bool) -> ChatStreamChunk {
        ChatStreamChunk::text(id, "s1", content, done)
    }

    #[test]
    fn test_hello_world_two_chunks() {
        let mut acc = TurnAccumulator::new();
        assert_eq!(acc.state(), TurnState::Empty);

        let first = acc.push(chunk("m1", "Hello", false));
        assert_eq!(first.transition, Transition::Started);
        assert_eq!(acc.state(), TurnState::Streaming);

        let last = acc.push(chunk("m1", " world", true));
        match last.transition {
            Transition::Completed(msg) => {
                assert_eq!(msg.content, "Hello world");
                assert_eq!(msg.id, "m1");
            }
            other => panic!("expected completion, got {:?}", other),
        }
        assert_eq!(acc.state(), TurnState::Complete);
    }

    #[test]
    fn test_content_is_ordered_concatenation() {
        let fragments = ["죄송합니다. ", "현재 ", "", "AI ", "서비스에", " 문제가"];
        let mut acc = TurnAccumulator::new();
        for (i, f) in fragments.iter().enumerate() {
            acc.push(chunk("m1", f, i == fragments.len() - 1));
        }
        assert_eq!(acc.content(), fragments.concat());
        assert_eq!(acc.state(), TurnState::Complete);
    }

    #[test]
    fn test_empty_terminal_chunk() {
        let mut acc = TurnAccumulator::new();
        acc.push(chunk("m1", "Done", false));
        let fold = acc.push(chunk("m1", "", true));
        assert!(matches!(fold.transition, Transition::Completed(ref m) if m.content == "Done"));
    }

    #[test]
    fn test_single_chunk_turn() {
        let mut acc = TurnAccumulator::new();
        let fold = acc.push(chunk("m1", "ok", true));
        assert!(matches!(fold.transition, Transition::Completed(ref m) if m.content == "ok"));
    }

    #[test]
    fn test_late_chunk_after_complete_ignored() {
        let mut acc = TurnAccumulator::new();
        acc.push(chunk("m1", "a", true));
        let fold = acc.push(chunk("m1", "b", false));
        assert_eq!(fold.transition, Transition::Ignored);
        assert_eq!(acc.content(), "a");
    }

    #[test]
    fn test_new_id_mid_turn_restarts() {
        let mut acc = TurnAccumulator::new();
        acc.push(chunk("m1", "partial", false));
        let fold = acc.push(chunk("m2", "fresh", false));
        match fold.transition {
            Transition::Restarted { abandoned } => assert_eq!(abandoned.content, "partial"),
            other => panic!("expected restart, got {:?}", other),
        }
        assert_eq!(acc.current().unwrap().id, "m2");
        assert_eq!(acc.content(), "fresh");
    }

    #[test]
    fn test_tool_status_does_not_complete() {
        let mut acc = TurnAccumulator::new();
        acc.push(chunk("m1", "", false).with_tool("get_emails", ToolStatus::Running, None));
        let fold = acc.push(chunk("m1", "", false).with_tool(
            "get_emails",
            ToolStatus::Completed,
            Some(json!({"messages": []})),
        ));

        assert_eq!(fold.transition, Transition::Appended);
        assert_eq!(
            fold.tool,
            Some(ToolTransition {
                tool_name: "get_emails".into(),
                from: Some(ToolStatus::Running),
                to: ToolStatus::Completed,
            })
        );
        assert_eq!(acc.state(), TurnState::Streaming);
        let msg = acc.current().unwrap();
        assert_eq!(msg.tool_status, Some(ToolStatus::Completed));
        assert_eq!(msg.tool_result, Some(json!({"messages": []})));
    }

    #[test]
    fn test_first_chunk_reports_tool_start() {
        let mut acc = TurnAccumulator::new();
        let fold = acc.push(chunk("m1", "", false).with_tool(
            "get_calendar_events",
            ToolStatus::Running,
            None,
        ));
        assert_eq!(fold.transition, Transition::Started);
        let tool = fold.tool.unwrap();
        assert_eq!(tool.from, None);
        assert_eq!(tool.to, ToolStatus::Running);
    }

    #[test]
    fn test_terminal_tool_status_is_sticky() {
        let mut acc = TurnAccumulator::new();
        acc.push(chunk("m1", "", false).with_tool("get_emails", ToolStatus::Error, None));
        let fold = acc.push(chunk("m1", "x", false).with_tool("get_emails", ToolStatus::Running, None));
        assert!(fold.tool.is_none());
        assert_eq!(acc.current().unwrap().tool_status, Some(ToolStatus::Error));
    }

    #[test]
    fn test_repeated_status_not_reported() {
        let mut acc = TurnAccumulator::new();
        acc.push(chunk("m1", "", false).with_tool("get_emails", ToolStatus::Running, None));
        let fold = acc.push(chunk("m1", "a", false).with_tool("get_emails", ToolStatus::Running, None));
        assert!(fold.tool.is_none());
    }

    #[test]
    fn test_take_partial_resets() {
        let mut acc = TurnAccumulator::new();
        acc.push(chunk("m1", "half", false));
        let partial = acc.take_partial().unwrap();
        assert_eq!(partial.content, "half");
        assert_eq!(acc.state(), TurnState::Empty);
        assert_eq!(acc.content(), "");
    }
}
