//! Normalization of tool payloads into typed, display-ready records.
//!
//! Tool results arrive in several shapes: a JSON array, an object wrapping a
//! list, a single record, a JSON string, or nothing at all with the data only
//! present in the assistant's prose. [`Normalizer`] turns all of them into a
//! [`ParsedToolResult`] and never fails; anything it cannot read degrades to
//! an empty list or plain text.

use std::cmp::Ordering;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, Offset, SecondsFormat, TimeZone, Utc};
use nsales_client::{ChatMessage, ToolStatus, timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::extract::{self, CALENDAR_STRATEGIES, EMAIL_STRATEGIES};

pub const GET_CALENDAR_EVENTS: &str = "get_calendar_events";
pub const CREATE_CALENDAR_EVENT: &str = "create_calendar_event";
pub const FIND_FREE_TIME: &str = "find_free_time";
pub const GET_EMAILS: &str = "get_emails";
pub const SEND_EMAIL: &str = "send_email";

/// Google workspace tools whose results are shown as cards
pub const GOOGLE_TOOLS: [&str; 5] = [
    GET_CALENDAR_EVENTS,
    GET_EMAILS,
    CREATE_CALENDAR_EVENT,
    SEND_EMAIL,
    FIND_FREE_TIME,
];

/// Human-readable tool name; unknown tools display as themselves
pub fn display_name(tool_name: &str) -> &str {
    match tool_name {
        GET_CALENDAR_EVENTS => "캘린더 일정",
        CREATE_CALENDAR_EVENT => "일정 생성",
        FIND_FREE_TIME => "빈 시간 찾기",
        GET_EMAILS => "Gmail 메일",
        SEND_EMAIL => "메일 발송",
        other => other,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// A calendar entry. `start` and `end` are ISO-8601 strings as received, or
/// produced by the normalizer for values it had to interpret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<Attendee>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailMessage {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub is_read: bool,
    pub is_important: bool,
    pub has_attachments: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_link: Option<String>,
}

/// Display-ready tool result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParsedToolResult {
    Calendar {
        title: String,
        #[serde(rename = "data")]
        events: Vec<CalendarEvent>,
    },
    Gmail {
        title: String,
        #[serde(rename = "data")]
        emails: Vec<EmailMessage>,
    },
    Text {
        title: String,
        #[serde(rename = "rawContent")]
        raw_content: String,
    },
}

impl ParsedToolResult {
    pub fn title(&self) -> &str {
        match self {
            ParsedToolResult::Calendar { title, .. }
            | ParsedToolResult::Gmail { title, .. }
            | ParsedToolResult::Text { title, .. } => title,
        }
    }

    /// Number of structured records (zero for text)
    pub fn record_count(&self) -> usize {
        match self {
            ParsedToolResult::Calendar { events, .. } => events.len(),
            ParsedToolResult::Gmail { emails, .. } => emails.len(),
            ParsedToolResult::Text { .. } => 0,
        }
    }
}

/// A tool call as recorded on an assistant message
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub name: String,
    pub status: Option<ToolStatus>,
    pub raw_result: Option<Value>,
    /// Assistant text surrounding the call
    pub content: String,
}

impl ToolInvocation {
    /// `None` when the message did not call a tool
    pub fn from_message(message: &ChatMessage) -> Option<Self> {
        let name = message.tool_call.clone()?;
        Some(Self {
            name,
            status: message.tool_status,
            raw_result: message.tool_result.clone(),
            content: message.content.clone(),
        })
    }
}

/// Maps raw tool output to [`ParsedToolResult`].
///
/// Values that depend on the current time (the current year for short dates,
/// "now" for undated text records) read the clock through [`Normalizer::now`];
/// tests pin it with [`Normalizer::with_now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    fixed_now: Option<DateTime<Utc>>,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a fixed clock
    pub fn with_now(now: DateTime<Utc>) -> Self {
        Self { fixed_now: Some(now) }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.fixed_now.unwrap_or_else(Utc::now)
    }

    /// Normalize one tool result
    pub fn normalize(&self, tool_name: &str, raw_result: Option<&Value>, content: &str) -> ParsedToolResult {
        // Some backends send the payload as a JSON-encoded string
        let decoded;
        let raw_result = match raw_result {
            Some(Value::String(s)) => {
                decoded = serde_json::from_str::<Value>(s).ok();
                decoded.as_ref()
            }
            other => other,
        };

        match tool_name {
            GET_CALENDAR_EVENTS => self.calendar(raw_result, content),
            GET_EMAILS => self.gmail(raw_result, content),
            other => ParsedToolResult::Text {
                title: display_name(other).to_string(),
                raw_content: content.to_string(),
            },
        }
    }

    pub fn normalize_invocation(&self, invocation: &ToolInvocation) -> ParsedToolResult {
        self.normalize(
            &invocation.name,
            invocation.raw_result.as_ref(),
            &invocation.content,
        )
    }

    fn calendar(&self, raw_result: Option<&Value>, content: &str) -> ParsedToolResult {
        let now = self.now();
        let mut events: Vec<CalendarEvent> = records(raw_result, "events")
            .into_iter()
            .map(|v| calendar_event_from_value(v, now))
            .collect();

        if events.is_empty() {
            events = extract::run(CALENDAR_STRATEGIES, content, now);
        }

        sort_stable_by(&mut events, |a, b| {
            compare_instants(a.start.as_deref(), b.start.as_deref())
        });

        ParsedToolResult::Calendar {
            title: display_name(GET_CALENDAR_EVENTS).to_string(),
            events,
        }
    }

    fn gmail(&self, raw_result: Option<&Value>, content: &str) -> ParsedToolResult {
        let now = self.now();
        let mut emails: Vec<EmailMessage> = records(raw_result, "messages")
            .into_iter()
            .map(email_from_value)
            .collect();

        if emails.is_empty() {
            emails = extract::run(EMAIL_STRATEGIES, content, now);
        }

        // Newest first
        sort_stable_by(&mut emails, |a, b| {
            compare_instants(b.date.as_deref(), a.date.as_deref())
        });

        ParsedToolResult::Gmail {
            title: display_name(GET_EMAILS).to_string(),
            emails,
        }
    }
}

/// Normalize with the system clock
pub fn normalize(tool_name: &str, raw_result: Option<&Value>, content: &str) -> ParsedToolResult {
    Normalizer::new().normalize(tool_name, raw_result, content)
}

/// Whether `message` finished a Google tool call whose result can be shown
pub fn has_tool_result(message: &ChatMessage) -> bool {
    let Some(ref name) = message.tool_call else {
        return false;
    };
    matches!(
        message.tool_status,
        Some(ToolStatus::Completed) | Some(ToolStatus::Error)
    ) && GOOGLE_TOOLS.contains(&name.as_str())
}

/// Normalized tool result of `message`, if it carries one
pub fn tool_result_for(message: &ChatMessage) -> Option<ParsedToolResult> {
    if !has_tool_result(message) {
        return None;
    }
    ToolInvocation::from_message(message).map(|inv| Normalizer::new().normalize_invocation(&inv))
}

/// Records from a raw payload: an array, `{list_key: [...]}`, or a single
/// object with an `id`.
fn records<'a>(raw_result: Option<&'a Value>, list_key: &str) -> Vec<&'a Value> {
    match raw_result {
        Some(Value::Array(items)) => items.iter().filter(|v| v.is_object()).collect(),
        Some(object @ Value::Object(map)) => match map.get(list_key) {
            Some(Value::Array(items)) => items.iter().filter(|v| v.is_object()).collect(),
            _ if string_field(object, "id").is_some() => vec![object],
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Map one raw calendar record
pub fn calendar_event_from_value(value: &Value, now: DateTime<Utc>) -> CalendarEvent {
    let (range_start, range_end) = value
        .get("time")
        .and_then(Value::as_str)
        .and_then(|time| parse_time_range(time, now))
        .map_or((None, None), |(start, end)| (Some(start), end));

    CalendarEvent {
        id: string_field(value, "id").unwrap_or_else(generate_id),
        summary: string_field(value, "summary").or_else(|| string_field(value, "title")),
        description: string_field(value, "description"),
        start: range_start.or_else(|| event_time(value.get("start"))),
        end: range_end.or_else(|| event_time(value.get("end"))),
        location: string_field(value, "location"),
        attendees: value
            .get("attendees")
            .and_then(|v| serde_json::from_value(v.clone()).ok()),
        html_link: string_field(value, "htmlLink"),
        status: string_field(value, "status"),
    }
}

/// Map one raw Gmail record
pub fn email_from_value(value: &Value) -> EmailMessage {
    let id = string_field(value, "id").unwrap_or_else(generate_id);
    let labels: Option<Vec<String>> = value.get("labelIds").and_then(Value::as_array).map(|ids| {
        ids.iter()
            .filter_map(|l| l.as_str().map(str::to_string))
            .collect()
    });
    let has_label = |name: &str| labels.as_ref().is_some_and(|l| l.iter().any(|x| x == name));

    let has_attachments = value
        .pointer("/payload/parts")
        .and_then(Value::as_array)
        .is_some_and(|parts| {
            parts.iter().any(|part| {
                part.get("filename")
                    .and_then(Value::as_str)
                    .is_some_and(|f| !f.is_empty())
            })
        });

    EmailMessage {
        subject: string_field(value, "subject"),
        from: string_field(value, "from"),
        to: string_field(value, "to"),
        date: string_field(value, "date").or_else(|| string_field(value, "internalDate")),
        snippet: string_field(value, "snippet"),
        body: string_field(value, "body"),
        is_read: labels.is_none() || !has_label("UNREAD"),
        is_important: has_label("IMPORTANT"),
        has_attachments,
        web_link: Some(
            string_field(value, "webLink")
                .unwrap_or_else(|| format!("https://mail.google.com/mail/u/0/#inbox/{}", id)),
        ),
        labels,
        id,
    }
}

/// `start`/`end` as `{dateTime}`, `{date}` or a plain string
fn event_time(value: Option<&Value>) -> Option<String> {
    let value = value?;
    string_field(value, "dateTime")
        .or_else(|| string_field(value, "date"))
        .or_else(|| scalar_string(value))
}

/// `"MM/DD HH:MM - HH:MM"` in the current year, Korean time
fn parse_time_range(time: &str, now: DateTime<Utc>) -> Option<(String, Option<String>)> {
    let (start_part, end_part) = time.split_once(" - ")?;
    if end_part.contains(" - ") {
        return None;
    }
    let (date_part, clock) = start_part.trim().split_once(' ')?;
    let (month, day) = date_part.split_once('/')?;
    let date = NaiveDate::from_ymd_opt(
        now.with_timezone(&kst()).year(),
        month.trim().parse().ok()?,
        day.trim().parse().ok()?,
    )?;

    let start = kst_instant(date, clock)?;
    let end = if end_part.contains(':') {
        kst_instant(date, end_part)
    } else {
        None
    };
    Some((iso(start), end.map(iso)))
}

fn kst_instant(date: NaiveDate, clock: &str) -> Option<DateTime<Utc>> {
    let time = NaiveTime::parse_from_str(clock.trim(), "%H:%M").ok()?;
    kst()
        .from_local_datetime(&date.and_time(time))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Korea Standard Time, UTC+9
pub(crate) fn kst() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).unwrap_or_else(|| Utc.fix())
}

/// ISO-8601 with milliseconds and a `Z` suffix
pub(crate) fn iso(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Nine random alphanumerics for records without an id
pub(crate) fn generate_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..9].to_string()
}

/// Read a date the way the sort keys need it: RFC 3339, naive ISO, RFC 2822
/// mail headers, or epoch milliseconds (Gmail `internalDate`).
pub(crate) fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Some(dt) = timestamp::parse(value) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        return value
            .parse::<i64>()
            .ok()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single());
    }
    None
}

/// Ascending by instant; a missing or unreadable side compares equal
fn compare_instants(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a.and_then(parse_instant), b.and_then(parse_instant)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => Ordering::Equal,
    }
}

/// Insertion sort. The comparators above are not total orders, which the
/// standard sorts may reject; this keeps equal elements in place.
fn sort_stable_by<T>(items: &mut [T], mut compare: impl FnMut(&T, &T) -> Ordering) {
    for i in 1..items.len() {
        let mut j = i;
        while j > 0 && compare(&items[j - 1], &items[j]) == Ordering::Greater {
            items.swap(j - 1, j);
            j -= 1;
        }
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(scalar_string)
}

/// Non-empty strings and numbers as text
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nsales_client::Role;
    use serde_json::json;

    fn fixed() -> Normalizer {
        Normalizer::with_now(Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap())
    }

    fn events(result: ParsedToolResult) -> Vec<CalendarEvent> {
        match result {
            ParsedToolResult::Calendar { events, .. } => events,
            other => panic!("expected calendar, got {:?}", other),
        }
    }

    fn emails(result: ParsedToolResult) -> Vec<EmailMessage> {
        match result {
            ParsedToolResult::Gmail { emails, .. } => emails,
            other => panic!("expected gmail, got {:?}", other),
        }
    }

    #[test]
    fn test_standup_event() {
        let raw = json!({"events": [{"id": "e1", "summary": "Standup", "start": {"dateTime": "2025-01-01T09:00:00Z"}}]});
        let result = fixed().normalize(GET_CALENDAR_EVENTS, Some(&raw), "");

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["type"], "calendar");
        assert_eq!(value["title"], "캘린더 일정");
        assert_eq!(
            value["data"],
            json!([{"id": "e1", "summary": "Standup", "start": "2025-01-01T09:00:00Z"}])
        );
    }

    #[test]
    fn test_calendar_array_and_single_object() {
        let array = json!([{"id": "a", "title": "점심", "start": {"date": "2025-02-01"}}]);
        let list = events(fixed().normalize(GET_CALENDAR_EVENTS, Some(&array), ""));
        assert_eq!(list[0].summary.as_deref(), Some("점심"));
        assert_eq!(list[0].start.as_deref(), Some("2025-02-01"));

        let single = json!({"id": "b", "summary": "고객 미팅", "start": "2025-02-03T10:00:00+09:00", "location": "본사"});
        let list = events(fixed().normalize(GET_CALENDAR_EVENTS, Some(&single), ""));
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].start.as_deref(), Some("2025-02-03T10:00:00+09:00"));
        assert_eq!(list[0].location.as_deref(), Some("본사"));
    }

    #[test]
    fn test_time_field_uses_current_year_in_kst() {
        let raw = json!([{"title": "팀 회식", "time": "07/24 18:00 - 20:00"}]);
        let list = events(fixed().normalize(GET_CALENDAR_EVENTS, Some(&raw), ""));
        assert_eq!(list[0].start.as_deref(), Some("2025-07-24T09:00:00.000Z"));
        assert_eq!(list[0].end.as_deref(), Some("2025-07-24T11:00:00.000Z"));
        assert_eq!(list[0].id.len(), 9);
    }

    #[test]
    fn test_time_field_overrides_start() {
        let raw = json!([{"id": "x", "time": "01/02 09:30 - 10:00", "start": {"dateTime": "2030-01-01T00:00:00Z"}}]);
        let list = events(fixed().normalize(GET_CALENDAR_EVENTS, Some(&raw), ""));
        assert_eq!(list[0].start.as_deref(), Some("2025-01-02T00:30:00.000Z"));
    }

    #[test]
    fn test_calendar_sorted_ascending() {
        let raw = json!([
            {"id": "late", "start": "2025-01-01T15:00:00Z"},
            {"id": "early", "start": "2025-01-01T08:00:00Z"},
        ]);
        let ids: Vec<String> = events(fixed().normalize(GET_CALENDAR_EVENTS, Some(&raw), ""))
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[test]
    fn test_missing_start_compares_equal() {
        let raw = json!([
            {"id": "undated"},
            {"id": "late", "start": "2025-01-01T15:00:00Z"},
            {"id": "early", "start": "2025-01-01T08:00:00Z"},
        ]);
        let ids: Vec<String> = events(fixed().normalize(GET_CALENDAR_EVENTS, Some(&raw), ""))
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["undated", "early", "late"]);
    }

    #[test]
    fn test_emails_sorted_newest_first() {
        let raw = json!({"messages": [
            {"id": "old", "date": "2025-01-01"},
            {"id": "new", "date": "2025-01-02"},
        ]});
        let list = emails(fixed().normalize(GET_EMAILS, Some(&raw), ""));
        let dates: Vec<&str> = list.iter().filter_map(|e| e.date.as_deref()).collect();
        assert_eq!(dates, vec!["2025-01-02", "2025-01-01"]);
    }

    #[test]
    fn test_email_labels_and_attachments() {
        let raw = json!([{
            "id": "m1",
            "subject": "견적서 송부",
            "from": "partner@example.com",
            "labelIds": ["INBOX", "UNREAD", "IMPORTANT"],
            "payload": {"parts": [{"filename": ""}, {"filename": "quote.pdf"}]},
            "internalDate": 1735689600000u64
        }]);
        let list = emails(fixed().normalize(GET_EMAILS, Some(&raw), ""));
        let mail = &list[0];
        assert!(!mail.is_read);
        assert!(mail.is_important);
        assert!(mail.has_attachments);
        assert_eq!(mail.date.as_deref(), Some("1735689600000"));
        assert_eq!(
            mail.web_link.as_deref(),
            Some("https://mail.google.com/mail/u/0/#inbox/m1")
        );
    }

    #[test]
    fn test_email_without_labels_is_read() {
        let raw = json!({"id": "m2", "subject": "hi", "webLink": "https://mail.example/m2"});
        let list = emails(fixed().normalize(GET_EMAILS, Some(&raw), ""));
        assert!(list[0].is_read);
        assert!(!list[0].is_important);
        assert!(!list[0].has_attachments);
        assert!(list[0].labels.is_none());
        assert_eq!(list[0].web_link.as_deref(), Some("https://mail.example/m2"));
    }

    #[test]
    fn test_internal_date_sorts_with_iso_dates() {
        let raw = json!([
            {"id": "a", "internalDate": "1735689600000"},
            {"id": "b", "date": "2025-06-01T00:00:00Z"},
        ]);
        let ids: Vec<String> = emails(fixed().normalize(GET_EMAILS, Some(&raw), ""))
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_structured_result_wins_over_text() {
        let raw = json!([{"id": "structured", "summary": "from tool"}]);
        let content = "```json\n[{\"id\": \"fenced\"}]\n```\n제목: 회의, 시간: 2025-07-23 14:00";
        let list = events(fixed().normalize(GET_CALENDAR_EVENTS, Some(&raw), content));
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, "structured");
    }

    #[test]
    fn test_empty_result_falls_back_to_text() {
        let content = "오늘 일정입니다.\n```json\n{\"id\": \"f1\", \"summary\": \"주간 회의\"}\n```";
        let list = events(fixed().normalize(GET_CALENDAR_EVENTS, Some(&json!({"events": []})), content));
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, "f1");
    }

    #[test]
    fn test_json_string_payload_is_decoded() {
        let raw = Value::String(r#"{"messages":[{"id":"s1","subject":"월간 보고"}]}"#.into());
        let list = emails(fixed().normalize(GET_EMAILS, Some(&raw), ""));
        assert_eq!(list[0].subject.as_deref(), Some("월간 보고"));
    }

    #[test]
    fn test_never_fails_on_garbage() {
        let n = fixed();
        for raw in [json!(42), json!("not json"), json!(null), json!({"events": "x"}), json!([1, "a", null])] {
            assert_eq!(n.normalize(GET_CALENDAR_EVENTS, Some(&raw), "").record_count(), 0);
            assert_eq!(n.normalize(GET_EMAILS, Some(&raw), "```json\n{oops\n```").record_count(), 0);
        }
        assert_eq!(n.normalize(GET_EMAILS, None, "").record_count(), 0);
    }

    #[test]
    fn test_unknown_tool_is_text() {
        let result = fixed().normalize("lookup_sales", Some(&json!({"id": 1})), "매출 합계는 3억입니다.");
        assert_eq!(
            result,
            ParsedToolResult::Text {
                title: "lookup_sales".into(),
                raw_content: "매출 합계는 3억입니다.".into(),
            }
        );
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["type"], "text");
        assert_eq!(value["rawContent"], "매출 합계는 3억입니다.");
    }

    #[test]
    fn test_other_google_tools_are_text_with_display_name() {
        let result = fixed().normalize(SEND_EMAIL, None, "메일을 보냈습니다.");
        assert_eq!(result.title(), "메일 발송");
        assert_eq!(result.record_count(), 0);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(display_name(GET_CALENDAR_EVENTS), "캘린더 일정");
        assert_eq!(display_name(CREATE_CALENDAR_EVENT), "일정 생성");
        assert_eq!(display_name(FIND_FREE_TIME), "빈 시간 찾기");
        assert_eq!(display_name(GET_EMAILS), "Gmail 메일");
        assert_eq!(display_name(SEND_EMAIL), "메일 발송");
        assert_eq!(display_name("web_search"), "web_search");
    }

    #[test]
    fn test_has_tool_result() {
        let mut msg = ChatMessage::new(Role::Assistant, "", Some("s1".into()));
        assert!(!has_tool_result(&msg));

        msg.tool_call = Some(GET_EMAILS.into());
        msg.tool_status = Some(ToolStatus::Running);
        assert!(!has_tool_result(&msg));

        msg.tool_status = Some(ToolStatus::Error);
        assert!(has_tool_result(&msg));

        msg.tool_call = Some("web_search".into());
        msg.tool_status = Some(ToolStatus::Completed);
        assert!(!has_tool_result(&msg));
        assert!(tool_result_for(&msg).is_none());
    }

    #[test]
    fn test_tool_result_for_message() {
        let mut msg = ChatMessage::new(Role::Assistant, "일정을 찾았습니다.", Some("s1".into()));
        msg.tool_call = Some(GET_CALENDAR_EVENTS.into());
        msg.tool_status = Some(ToolStatus::Completed);
        msg.tool_result = Some(json!([{"id": "e9", "summary": "분기 리뷰"}]));

        let result = tool_result_for(&msg).unwrap();
        assert_eq!(result.record_count(), 1);
        assert_eq!(result.title(), "캘린더 일정");
    }

    #[test]
    fn test_parse_instant_formats() {
        assert!(parse_instant("2025-01-01T00:00:00Z").is_some());
        assert!(parse_instant("Tue, 22 Jul 2025 10:00:00 +0900").is_some());
        assert_eq!(
            parse_instant("1735689600000"),
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single()
        );
        assert!(parse_instant("어제").is_none());
    }
}
