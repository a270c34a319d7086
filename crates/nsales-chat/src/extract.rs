//! Fallback extraction of tool records from assistant text.
//!
//! Strategies run in order and the first one that yields anything wins.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use regex::Regex;
use serde_json::Value;

use crate::tool_result::{
    CalendarEvent, EmailMessage, calendar_event_from_value, email_from_value, generate_id, iso,
    kst, parse_instant,
};

const EXTRACTED_EVENT: &str = "텍스트에서 추출된 일정";
const EXTRACTED_EMAIL: &str = "텍스트에서 추출된 메일";

/// One extraction strategy
pub struct Strategy<T: 'static> {
    pub name: &'static str,
    pub extract: fn(&str, DateTime<Utc>) -> Vec<T>,
}

pub const CALENDAR_STRATEGIES: &[Strategy<CalendarEvent>] = &[
    Strategy {
        name: "fenced_json",
        extract: calendar_from_fenced_json,
    },
    Strategy {
        name: "labeled_event",
        extract: calendar_from_labels,
    },
];

pub const EMAIL_STRATEGIES: &[Strategy<EmailMessage>] = &[
    Strategy {
        name: "fenced_json",
        extract: emails_from_fenced_json,
    },
    Strategy {
        name: "quoted_subject_sender_date",
        extract: emails_with_received_date,
    },
    Strategy {
        name: "quoted_subject_sender",
        extract: emails_with_quoted_subject,
    },
    Strategy {
        name: "sender_subject",
        extract: emails_sender_first,
    },
];

/// Run `strategies` in order, returning the first non-empty result
pub fn run<T>(strategies: &[Strategy<T>], content: &str, now: DateTime<Utc>) -> Vec<T> {
    for strategy in strategies {
        let found = (strategy.extract)(content, now);
        if !found.is_empty() {
            tracing::debug!(strategy = strategy.name, count = found.len(), "Extracted records from text");
            return found;
        }
    }
    Vec::new()
}

static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```json\s*(.*?)\s*```").expect("Invalid fenced json regex")
});

static EVENT_LABELS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"제목:\s*([^,\n]+)[,\s]*시간:\s*([^,\n]+)").expect("Invalid event label regex")
});

static EMAIL_WITH_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)제목:\s*"([^"]+)"\s*.*?보낸\s*사람:\s*([^\n,]+).*?받은\s*날짜:\s*([^\n]+)"#).expect("Invalid email with date regex")
});

static EMAIL_QUOTED_SUBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"제목:\s*"([^"]+)"[,\s]*.*?보낸\s*사람:\s*([^\n,]+)"#).expect("Invalid quoted subject regex")
});

static EMAIL_SENDER_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"보낸\s*사람:\s*([^,\n]+)[,\s]*제목:\s*([^,\n]+)").expect("Invalid sender first regex")
});

/// `Name address@host` or `Name <address@host>` at the end of a sender
static TRAILING_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*?)\s+<?([^\s<>]+@[^\s<>]+?)>?$").expect("Invalid trailing address regex")
});

static ISO_MINUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4}-\d{2}-\d{2})\s(\d{2}:\d{2})").expect("Invalid ISO minute regex")
});

static KOREAN_HOUR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)월\s*(\d+)일\s*(\d+)시").expect("Invalid Korean hour regex")
});

static KOREAN_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4})년\s*(\d+)월\s*(\d+)일").expect("Invalid Korean date regex")
});

/// Body of the first ```` ```json ```` block, parsed
fn fenced_json(content: &str) -> Option<Value> {
    let body = FENCED_JSON.captures(content)?.get(1)?.as_str().trim();
    match serde_json::from_str(body) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring unparseable JSON block");
            None
        }
    }
}

/// Objects of a fenced array, or the fenced object itself
fn fenced_records(content: &str) -> Vec<Value> {
    match fenced_json(content) {
        Some(Value::Array(items)) => items.into_iter().filter(Value::is_object).collect(),
        Some(object @ Value::Object(_)) => vec![object],
        _ => Vec::new(),
    }
}

fn calendar_from_fenced_json(content: &str, now: DateTime<Utc>) -> Vec<CalendarEvent> {
    fenced_records(content)
        .iter()
        .map(|v| calendar_event_from_value(v, now))
        .collect()
}

fn emails_from_fenced_json(content: &str, _now: DateTime<Utc>) -> Vec<EmailMessage> {
    fenced_records(content).iter().map(email_from_value).collect()
}

/// `제목: X, 시간: Y`
fn calendar_from_labels(content: &str, now: DateTime<Utc>) -> Vec<CalendarEvent> {
    EVENT_LABELS
        .captures_iter(content)
        .map(|caps| CalendarEvent {
            id: generate_id(),
            summary: Some(caps[1].trim().to_string()),
            description: Some(EXTRACTED_EVENT.to_string()),
            start: Some(parse_time_text(&caps[2], now)),
            end: None,
            location: None,
            attendees: None,
            html_link: None,
            status: None,
        })
        .collect()
}

/// `제목: "X", 보낸 사람: Y, 받은 날짜: Z`
fn emails_with_received_date(content: &str, now: DateTime<Utc>) -> Vec<EmailMessage> {
    EMAIL_WITH_DATE
        .captures_iter(content)
        .map(|caps| {
            let date = parse_date_text(&caps[3]).unwrap_or_else(|| iso(now));
            extracted_email(&caps[1], format_sender(&caps[2]), date)
        })
        .collect()
}

/// `제목: "X", 보낸 사람: Y`
fn emails_with_quoted_subject(content: &str, now: DateTime<Utc>) -> Vec<EmailMessage> {
    EMAIL_QUOTED_SUBJECT
        .captures_iter(content)
        .map(|caps| extracted_email(&caps[1], caps[2].trim().to_string(), iso(now)))
        .collect()
}

/// `보낸 사람: Y, 제목: X`
fn emails_sender_first(content: &str, now: DateTime<Utc>) -> Vec<EmailMessage> {
    EMAIL_SENDER_FIRST
        .captures_iter(content)
        .map(|caps| extracted_email(&caps[2], caps[1].trim().to_string(), iso(now)))
        .collect()
}

fn extracted_email(subject: &str, from: String, date: String) -> EmailMessage {
    EmailMessage {
        id: generate_id(),
        subject: Some(subject.trim().to_string()),
        from: Some(from),
        to: None,
        date: Some(date),
        snippet: Some(EXTRACTED_EMAIL.to_string()),
        body: None,
        is_read: true,
        is_important: false,
        has_attachments: false,
        labels: None,
        web_link: None,
    }
}

/// `Name addr@host` becomes `Name <addr@host>`
fn format_sender(raw: &str) -> String {
    let raw = raw.trim();
    TRAILING_ADDRESS
        .captures(raw)
        .map(|caps| format!("{} <{}>", caps[1].trim(), &caps[2]))
        .unwrap_or_else(|| raw.to_string())
}

/// Time of a labeled event: `YYYY-MM-DD HH:MM` or `M월 D일 H시`, read as
/// Korean time; anything else is "now".
fn parse_time_text(text: &str, now: DateTime<Utc>) -> String {
    let parsed = ISO_MINUTE
        .captures(text)
        .and_then(|caps| {
            let date = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").ok()?;
            let time = chrono::NaiveTime::parse_from_str(&caps[2], "%H:%M").ok()?;
            kst().from_local_datetime(&date.and_time(time)).single()
        })
        .or_else(|| {
            let caps = KOREAN_HOUR.captures(text)?;
            let date = NaiveDate::from_ymd_opt(
                now.with_timezone(&kst()).year(),
                caps[1].parse().ok()?,
                caps[2].parse().ok()?,
            )?;
            let local = date.and_hms_opt(caps[3].parse().ok()?, 0, 0)?;
            kst().from_local_datetime(&local).single()
        });

    iso(parsed.map_or(now, |dt| dt.with_timezone(&Utc)))
}

/// Received date: `YYYY년 M월 D일` (Korean midnight) or an ISO-like value
fn parse_date_text(text: &str) -> Option<String> {
    if let Some(caps) = KOREAN_DATE.captures(text) {
        let date = NaiveDate::from_ymd_opt(
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        )?;
        let midnight = kst().from_local_datetime(&date.and_hms_opt(0, 0, 0)?).single()?;
        return Some(iso(midnight.with_timezone(&Utc)));
    }

    let text = text.trim();
    if text.contains('T') || text.contains('-') {
        return parse_instant(text).map(iso);
    }
    None
}
