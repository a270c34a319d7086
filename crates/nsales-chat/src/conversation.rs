//! Conversation transcript: finalized messages plus the in-flight partial.

use nsales_client::{ChatMessage, Role};

/// Append-only transcript for one session.
#[derive(Debug, Default, Clone)]
pub struct Conversation {
    /// Finalized messages in submission order
    pub messages: Vec<ChatMessage>,
    /// Current streaming message (partial)
    pub stream_message: Option<ChatMessage>,
    /// Last error of a failed stream
    pub error: Option<String>,
}

impl Conversation {
    /// Start from an already stored transcript
    pub fn from_messages(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Whether an assistant turn is currently being assembled
    pub fn is_streaming(&self) -> bool {
        self.stream_message.is_some()
    }

    /// Most recent finalized assistant message
    pub fn last_assistant(&self) -> Option<&ChatMessage> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_assistant() {
        let mut conv = Conversation::default();
        assert!(conv.last_assistant().is_none());

        conv.push(ChatMessage::user("안녕", "s1"));
        let mut reply = ChatMessage::new(Role::Assistant, "안녕하세요", Some("s1".into()));
        reply.id = "a1".into();
        conv.push(reply);
        conv.push(ChatMessage::user("고마워", "s1"));

        assert_eq!(conv.len(), 3);
        assert_eq!(conv.last_assistant().unwrap().id, "a1");
    }
}
