//! Wire types for the chat backend

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Execution status of a tool reported on the stream side channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Running,
    Completed,
    Error,
}

impl ToolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolStatus::Running => "running",
            ToolStatus::Completed => "completed",
            ToolStatus::Error => "error",
        }
    }

    /// `Completed` and `Error` end a tool execution; nothing follows them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ToolStatus::Completed | ToolStatus::Error)
    }
}

/// What kind of attachment the backend is currently analyzing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzingKind {
    Image,
    Document,
}

/// Descriptor of a file attached to a user message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedFile {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
}

/// A message in a conversation transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Name of the tool executed for this turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_status: Option<ToolStatus>,
    /// Raw tool payload, shape depends on the tool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attached_files: Vec<AttachedFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_analyzing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzing_type: Option<AnalyzingKind>,
}

impl ChatMessage {
    /// Create a message with a fresh id, stamped now
    pub fn new(role: Role, content: impl Into<String>, session_id: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            session_id,
            tool_call: None,
            tool_status: None,
            tool_result: None,
            attached_files: Vec::new(),
            is_analyzing: None,
            analyzing_type: None,
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self::new(Role::User, content, Some(session_id.into()))
    }

    /// Start an assistant message from the first chunk of a turn
    pub fn from_chunk(chunk: &ChatStreamChunk) -> Self {
        Self {
            id: chunk.id.clone(),
            role: chunk.role,
            content: chunk.content.clone(),
            timestamp: chunk.timestamp,
            session_id: Some(chunk.session_id.clone()).filter(|s| !s.is_empty()),
            tool_call: chunk.tool_call.clone(),
            tool_status: chunk.tool_status,
            tool_result: chunk.tool_result.clone(),
            attached_files: Vec::new(),
            is_analyzing: None,
            analyzing_type: None,
        }
    }

    /// Convert a non-streamed reply into a transcript message
    pub fn from_response(response: ChatResponse) -> Self {
        Self {
            id: response.id,
            role: response.role,
            content: response.content,
            timestamp: response.timestamp,
            session_id: Some(response.session_id),
            tool_call: None,
            tool_status: None,
            tool_result: None,
            attached_files: Vec::new(),
            is_analyzing: None,
            analyzing_type: None,
        }
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

/// One server-sent unit of a streamed assistant turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatStreamChunk {
    pub id: String,
    /// Text fragment to append; empty on pure status chunks
    #[serde(default)]
    pub content: String,
    pub role: Role,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_status: Option<ToolStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<serde_json::Value>,
}

impl ChatStreamChunk {
    /// Create a plain text chunk
    pub fn text(
        id: impl Into<String>,
        session_id: impl Into<String>,
        content: impl Into<String>,
        is_complete: bool,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            role: Role::Assistant,
            timestamp: Utc::now(),
            session_id: session_id.into(),
            is_complete,
            tool_call: None,
            tool_status: None,
            tool_result: None,
        }
    }

    /// Attach tool metadata to this chunk
    pub fn with_tool(
        mut self,
        name: impl Into<String>,
        status: ToolStatus,
        result: Option<serde_json::Value>,
    ) -> Self {
        self.tool_call = Some(name.into());
        self.tool_status = Some(status);
        self.tool_result = result;
        self
    }
}

/// A conversation record on the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub message_count: u32,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub title_generated: bool,
    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub title_generated_at: Option<DateTime<Utc>>,
}

/// Body of a chat submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub content: String,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_search: Option<bool>,
}

impl ChatRequest {
    pub fn new(session_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            session_id: session_id.into(),
            model: None,
            web_search: None,
        }
    }
}

/// A file uploaded together with a chat submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl Attachment {
    /// Descriptor recorded on the user message for this upload
    pub fn descriptor(&self) -> AttachedFile {
        AttachedFile {
            name: self.name.clone(),
            size: self.data.len() as u64,
            mime_type: self.mime_type.clone(),
        }
    }
}

/// A streamed chat submission, optionally carrying uploads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub chat: ChatRequest,
    pub files: Vec<Attachment>,
}

impl StreamRequest {
    pub fn new(chat: ChatRequest) -> Self {
        Self {
            chat,
            files: Vec::new(),
        }
    }

    pub fn with_files(mut self, files: Vec<Attachment>) -> Self {
        self.files = files;
        self
    }

    pub fn has_files(&self) -> bool {
        !self.files.is_empty()
    }
}

/// A non-streamed assistant reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub id: String,
    pub content: String,
    pub role: Role,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
}

/// Query parameters for listing sessions
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSearch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    pub page: u32,
    pub size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
}

impl Default for ChatSearch {
    fn default() -> Self {
        Self {
            query: None,
            session_id: None,
            start_date: None,
            end_date: None,
            page: 0,
            size: 50,
            sort: None,
        }
    }
}

/// One page of sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSessionList {
    pub sessions: Vec<ChatSession>,
    pub total_elements: u64,
    pub total_pages: u32,
    pub current_page: u32,
    pub size: u32,
}

/// Stored transcript of a session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistory {
    pub messages: Vec<ChatMessage>,
    pub session_id: String,
    pub total_count: u64,
}

/// A tool the assistant can call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

/// Registry summary inside [`ToolsStatus`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolRegistryStatus {
    pub total_tools: u32,
    pub categories: HashMap<String, u32>,
    pub tools: Vec<String>,
}

/// Tool availability reported by the backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsStatus {
    pub available: bool,
    pub status: ToolRegistryStatus,
    /// Tools grouped by category
    pub tools: HashMap<String, Vec<ToolInfo>>,
    pub google_auth_status: bool,
}

/// Serde helpers for backend timestamps.
///
/// The backend emits either RFC 3339 values or naive ISO-8601 datetimes
/// without an offset; naive values are read as UTC.
pub mod timestamp {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    /// Parse a backend timestamp
    pub fn parse(value: &str) -> Option<DateTime<Utc>> {
        let value = value.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(naive.and_utc());
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f") {
            return Some(naive.and_utc());
        }
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw}")))
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => super::serialize(v, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => super::parse(&raw)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw}"))),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_chunk_from_backend_json() {
        let raw = r#"{"id":"m1","content":"Hel","role":"assistant","timestamp":"2025-07-23T14:00:00.123456","sessionId":"s1","isComplete":false}"#;
        let chunk: ChatStreamChunk = serde_json::from_str(raw).unwrap();
        assert_eq!(chunk.id, "m1");
        assert_eq!(chunk.content, "Hel");
        assert_eq!(chunk.role, Role::Assistant);
        assert_eq!(chunk.session_id, "s1");
        assert!(!chunk.is_complete);
        assert!(chunk.tool_call.is_none());
        assert_eq!(
            chunk.timestamp.timestamp(),
            Utc.with_ymd_and_hms(2025, 7, 23, 14, 0, 0).unwrap().timestamp()
        );
    }

    #[test]
    fn test_chunk_defaults_is_complete() {
        let raw = r#"{"id":"m1","content":"x","role":"assistant","timestamp":"2025-07-23T14:00:00Z","sessionId":"s1"}"#;
        let chunk: ChatStreamChunk = serde_json::from_str(raw).unwrap();
        assert!(!chunk.is_complete);
    }

    #[test]
    fn test_chunk_with_tool_metadata() {
        let raw = r#"{"id":"m1","content":"","role":"assistant","timestamp":"2025-07-23T14:00:00+09:00","sessionId":"s1","isComplete":false,"toolCall":"get_emails","toolStatus":"running"}"#;
        let chunk: ChatStreamChunk = serde_json::from_str(raw).unwrap();
        assert_eq!(chunk.tool_call.as_deref(), Some("get_emails"));
        assert_eq!(chunk.tool_status, Some(ToolStatus::Running));
        assert_eq!(chunk.timestamp.hour(), 5);
    }

    #[test]
    fn test_message_serializes_camel_case() {
        let mut msg = ChatMessage::user("hi", "s1");
        msg.tool_call = Some("get_emails".into());
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "user");
        assert_eq!(value["sessionId"], "s1");
        assert_eq!(value["toolCall"], "get_emails");
        assert!(value.get("attachedFiles").is_none());
        assert!(value.get("toolStatus").is_none());
    }

    #[test]
    fn test_attached_file_uses_type_key() {
        let file = Attachment {
            name: "report.pdf".into(),
            mime_type: "application/pdf".into(),
            data: vec![0; 12],
        }
        .descriptor();
        let value = serde_json::to_value(&file).unwrap();
        assert_eq!(value["type"], "application/pdf");
        assert_eq!(value["size"], 12);
    }

    #[test]
    fn test_session_list_decodes() {
        let raw = r#"{
            "sessions": [{"id":"s1","title":"영업 데이터 분석","messageCount":4,
                          "createdAt":"2025-07-20T09:00:00","updatedAt":"2025-07-21T09:00:00"}],
            "totalElements": 1, "totalPages": 1, "currentPage": 0, "size": 50
        }"#;
        let list: ChatSessionList = serde_json::from_str(raw).unwrap();
        assert_eq!(list.sessions.len(), 1);
        assert_eq!(list.sessions[0].message_count, 4);
        assert!(!list.sessions[0].title_generated);
        assert!(list.sessions[0].title_generated_at.is_none());
    }

    #[test]
    fn test_search_query_skips_unset() {
        let value = serde_json::to_value(ChatSearch::default()).unwrap();
        assert_eq!(value, serde_json::json!({"page": 0, "size": 50}));
    }

    #[test]
    fn test_timestamp_parse_variants() {
        assert!(timestamp::parse("2025-01-01T09:00:00Z").is_some());
        assert!(timestamp::parse("2025-01-01T09:00:00").is_some());
        assert!(timestamp::parse("2025-01-01 09:00:00").is_some());
        assert!(timestamp::parse("2025-01-01").is_some());
        assert!(timestamp::parse("yesterday").is_none());
    }

    #[test]
    fn test_invalid_timestamp_rejected() {
        let raw = r#"{"id":"m1","content":"x","role":"assistant","timestamp":"soon","sessionId":"s1"}"#;
        assert!(serde_json::from_str::<ChatStreamChunk>(raw).is_err());
    }

    #[test]
    fn test_tool_status_terminal() {
        assert!(!ToolStatus::Running.is_terminal());
        assert!(ToolStatus::Completed.is_terminal());
        assert!(ToolStatus::Error.is_terminal());
    }
}
