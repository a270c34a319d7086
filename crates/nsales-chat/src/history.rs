//! Transcript cleanup for display.
//!
//! Assistant turns that ran a structured Google tool often echo the raw
//! payload as fenced JSON. The cards rendered from the tool result replace
//! that dump, so the blocks are stripped from the text.

use std::sync::LazyLock;

use nsales_client::{ChatMessage, Role, ToolStatus};
use regex::Regex;

use crate::tool_result::{GET_CALENDAR_EVENTS, GET_EMAILS};

/// Tools whose results are rendered as structured cards
const STRUCTURED_TOOLS: [&str; 2] = [GET_CALENDAR_EVENTS, GET_EMAILS];

/// A fenced block: info string up to the end of the line, then the body
static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```([^\n`]*)\n?(.*?)```").expect("Invalid fenced block regex")
});

static RECORD_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(?:id|title)"\s*:"#).expect("Invalid record key regex"));

/// Whether `message` is a completed structured-tool turn
pub fn should_cleanse(message: &ChatMessage) -> bool {
    message.role == Role::Assistant
        && message.tool_status == Some(ToolStatus::Completed)
        && message
            .tool_call
            .as_deref()
            .is_some_and(|tool| STRUCTURED_TOOLS.contains(&tool))
}

/// Strip JSON dumps from completed structured-tool turns. Other messages pass
/// through unchanged. Applying it twice gives the same transcript.
pub fn cleanse(messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    messages
        .into_iter()
        .map(|mut message| {
            if should_cleanse(&message) {
                message.content = cleanse_content(&message.content);
            }
            message
        })
        .collect()
}

/// Remove every fenced block tagged `json` or carrying `"id":` / `"title":`
/// keys, then trim.
pub fn cleanse_content(content: &str) -> String {
    let stripped = FENCED_BLOCK.replace_all(content, |caps: &regex::Captures| {
        let lang = caps
            .get(1)
            .and_then(|m| m.as_str().split_whitespace().next())
            .unwrap_or("");
        let body = caps.get(2).map_or("", |m| m.as_str());

        let is_dump = lang.eq_ignore_ascii_case("json")
            || RECORD_KEY.is_match(body);
        if is_dump {
            String::new()
        } else {
            caps[0].to_string()
        }
    });

    stripped.trim().to_string()
}
