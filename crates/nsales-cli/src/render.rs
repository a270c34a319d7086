//! Plain-text rendering for terminal output

use nsales_chat::tool_result::display_name;
use nsales_chat::{CalendarEvent, EmailMessage, ParsedToolResult, tool_result_for};
use nsales_client::{ChatMessage, ChatSession, Role, ToolsStatus, timestamp};

use crate::utils::{local_time, truncate_chars};

const SNIPPET_CHARS: usize = 80;

/// Render a normalized tool result as indented lines
pub fn tool_result(result: &ParsedToolResult) -> String {
    let mut out = format!("── {} ({})\n", result.title(), result.record_count());
    match result {
        ParsedToolResult::Calendar { events, .. } => {
            if events.is_empty() {
                out.push_str("  (일정 없음)\n");
            }
            for event in events {
                out.push_str(&calendar_line(event));
            }
        }
        ParsedToolResult::Gmail { emails, .. } => {
            if emails.is_empty() {
                out.push_str("  (메일 없음)\n");
            }
            for email in emails {
                out.push_str(&email_line(email));
            }
        }
        ParsedToolResult::Text { raw_content, .. } => {
            for line in raw_content.lines() {
                out.push_str("  ");
                out.push_str(line);
                out.push('\n');
            }
        }
    }
    out
}

fn calendar_line(event: &CalendarEvent) -> String {
    let when = match (event.start.as_deref(), event.end.as_deref()) {
        (Some(start), Some(end)) => format!("{} - {}", instant(start), instant(end)),
        (Some(start), None) => instant(start),
        _ => "시간 미정".to_string(),
    };
    let mut line = format!(
        "  • {}  {}\n",
        when,
        event.summary.as_deref().unwrap_or("(제목 없음)")
    );
    if let Some(location) = event.location.as_deref().filter(|l| !l.is_empty()) {
        line.push_str(&format!("    장소: {}\n", location));
    }
    if let Some(attendees) = event.attendees.as_ref().filter(|a| !a.is_empty()) {
        let names: Vec<&str> = attendees
            .iter()
            .map(|a| a.display_name.as_deref().unwrap_or(&a.email))
            .collect();
        line.push_str(&format!("    참석자: {}\n", names.join(", ")));
    }
    line
}

fn email_line(email: &EmailMessage) -> String {
    let marker = if email.is_read { ' ' } else { '*' };
    let mut line = format!(
        "  {}{} {}  {}\n",
        marker,
        if email.is_important { '!' } else { ' ' },
        email.date.as_deref().map(instant).unwrap_or_default(),
        email.subject.as_deref().unwrap_or("(제목 없음)")
    );
    if let Some(from) = email.from.as_deref() {
        line.push_str(&format!("    보낸 사람: {}\n", from));
    }
    if let Some(snippet) = email.snippet.as_deref().filter(|s| !s.is_empty()) {
        line.push_str(&format!("    {}\n", truncate_chars(snippet, SNIPPET_CHARS)));
    }
    line
}

/// Instants are shown in local time when they parse, verbatim otherwise
fn instant(value: &str) -> String {
    timestamp::parse(value)
        .map(|t| local_time(&t))
        .unwrap_or_else(|| value.to_string())
}

/// Render one transcript entry, with its tool result when it carries one
pub fn message(message: &ChatMessage) -> String {
    let speaker = match message.role {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    let mut out = format!("[{}] {}\n", local_time(&message.timestamp), speaker);
    for file in &message.attached_files {
        out.push_str(&format!("  + {} ({} bytes)\n", file.name, file.size));
    }
    if !message.content.is_empty() {
        out.push_str(&message.content);
        out.push('\n');
    }
    if let Some(result) = tool_result_for(message) {
        out.push_str(&tool_result(&result));
    }
    out
}

/// One line per session
pub fn session_line(session: &ChatSession) -> String {
    format!(
        "{}  {:>4}  {}  {}",
        session.id,
        session.message_count,
        local_time(&session.updated_at),
        truncate_chars(&session.title, 40)
    )
}

pub fn tools_status(status: &ToolsStatus) -> String {
    let mut out = format!(
        "tools: {} ({} registered), google auth: {}\n",
        if status.available { "available" } else { "unavailable" },
        status.status.total_tools,
        if status.google_auth_status { "ok" } else { "missing" }
    );

    let mut categories: Vec<_> = status.tools.iter().collect();
    categories.sort_by(|a, b| a.0.cmp(b.0));
    for (category, tools) in categories {
        out.push_str(&format!("{}:\n", category));
        for tool in tools {
            out.push_str(&format!(
                "  {} [{}] {}\n",
                tool.name,
                display_name(&tool.name),
                truncate_chars(&tool.description, SNIPPET_CHARS)
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_result_indented() {
        let result = ParsedToolResult::Text {
            title: "메일 전송".into(),
            raw_content: "전송 완료\n수신자 1명".into(),
        };
        assert_eq!(tool_result(&result), "── 메일 전송 (0)\n  전송 완료\n  수신자 1명\n");
    }

    #[test]
    fn test_empty_calendar() {
        let result = ParsedToolResult::Calendar {
            title: "캘린더 일정".into(),
            events: vec![],
        };
        assert!(tool_result(&result).contains("(일정 없음)"));
    }

    #[test]
    fn test_email_line_marks_unread() {
        let email = EmailMessage {
            id: "m1".into(),
            subject: Some("견적 요청".into()),
            from: Some("Kim <kim@example.com>".into()),
            to: None,
            date: Some("not a date".into()),
            snippet: Some("안녕하세요".into()),
            body: None,
            is_read: false,
            is_important: true,
            has_attachments: false,
            labels: None,
            web_link: None,
        };
        let line = email_line(&email);
        assert!(line.starts_with("  *! not a date  견적 요청\n"));
        assert!(line.contains("보낸 사람: Kim <kim@example.com>"));
    }

    #[test]
    fn test_user_message_has_no_tool_block() {
        let msg = ChatMessage::user("안녕", "s1");
        let out = message(&msg);
        assert!(out.contains("you\n안녕\n"));
        assert!(!out.contains("──"));
    }
}
