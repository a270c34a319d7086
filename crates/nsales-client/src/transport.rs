//! Server-sent event decoding for streamed chat replies

use std::pin::Pin;

use async_stream::stream;
use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;

use crate::{
    client::error_detail,
    error::{Error, Result},
    types::ChatStreamChunk,
};

/// A stream of decoded chunks for one streamed request.
///
/// Malformed events are skipped. A transport failure is yielded once as an
/// `Err` and ends the stream. Cancellation yields `Err(Error::Aborted)` and
/// ends the stream.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChatStreamChunk>> + Send>>;

/// Decode the `data` field of one event into a chunk
pub fn decode_chunk(data: &str) -> Option<ChatStreamChunk> {
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }

    match serde_json::from_str::<ChatStreamChunk>(data) {
        Ok(chunk) => Some(chunk),
        Err(e) => {
            tracing::warn!(error = %e, data = %truncate(data, 200), "Skipping malformed stream chunk");
            None
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    let mut chars = s.chars();
    let head: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

async fn map_event_source_error(error: reqwest_eventsource::Error) -> Error {
    match error {
        reqwest_eventsource::Error::InvalidStatusCode(status, response) => {
            let body = response.text().await.unwrap_or_default();
            Error::api(status.as_u16(), error_detail(&body))
        }
        reqwest_eventsource::Error::InvalidContentType(content_type, _) => Error::UnexpectedResponse(
            format!("expected text/event-stream, got {:?}", content_type),
        ),
        reqwest_eventsource::Error::Transport(e) => Error::Http(e),
        other => Error::Sse(other.to_string()),
    }
}

/// Drive a JSON-bodied event source until the terminal chunk, an error, or
/// cancellation.
pub(crate) fn event_source_stream(
    mut event_source: EventSource,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<ChatStreamChunk>> {
    stream! {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                event = event_source.next() => Some(event),
            };

            let Some(event) = next else {
                event_source.close();
                tracing::debug!("Event stream cancelled");
                yield Err(Error::Aborted);
                return;
            };

            match event {
                None => return,
                Some(Ok(Event::Open)) => {
                    tracing::debug!("Event stream opened");
                }
                Some(Ok(Event::Message(message))) => {
                    if let Some(chunk) = decode_chunk(&message.data) {
                        let done = chunk.is_complete;
                        yield Ok(chunk);
                        if done {
                            event_source.close();
                            return;
                        }
                    }
                }
                Some(Err(reqwest_eventsource::Error::StreamEnded)) => {
                    event_source.close();
                    return;
                }
                Some(Err(e)) => {
                    // Close before reporting so the source does not reconnect
                    event_source.close();
                    yield Err(map_event_source_error(e).await);
                    return;
                }
            }
        }
    }
}

/// Drive an already-opened response body (multipart uploads) as an event
/// stream.
pub(crate) fn response_stream(
    response: reqwest::Response,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<ChatStreamChunk>> {
    use eventsource_stream::Eventsource;

    stream! {
        let mut events = response.bytes_stream().eventsource();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                event = events.next() => Some(event),
            };

            let Some(event) = next else {
                tracing::debug!("Upload stream cancelled");
                yield Err(Error::Aborted);
                return;
            };

            match event {
                None => return,
                Some(Ok(event)) => {
                    if let Some(chunk) = decode_chunk(&event.data) {
                        let done = chunk.is_complete;
                        yield Ok(chunk);
                        if done {
                            return;
                        }
                    }
                }
                Some(Err(eventsource_stream::EventStreamError::Transport(e))) => {
                    yield Err(Error::Http(e));
                    return;
                }
                Some(Err(e)) => {
                    yield Err(Error::Sse(e.to_string()));
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_valid_chunk() {
        let data = r#"{"id":"m1","content":"hi","role":"assistant","timestamp":"2025-07-23T14:00:00","sessionId":"s1","isComplete":true}"#;
        let chunk = decode_chunk(data).unwrap();
        assert_eq!(chunk.content, "hi");
        assert!(chunk.is_complete);
    }

    #[test]
    fn test_decode_skips_malformed() {
        assert!(decode_chunk("{not json").is_none());
        assert!(decode_chunk(r#"{"id":"m1"}"#).is_none());
    }

    #[test]
    fn test_decode_skips_sentinels() {
        assert!(decode_chunk("").is_none());
        assert!(decode_chunk("  ").is_none());
        assert!(decode_chunk("[DONE]").is_none());
    }

    fn body_response(status: u16, body: &'static str) -> reqwest::Response {
        http::Response::builder()
            .status(status)
            .header("content-type", "text/event-stream")
            .body(body)
            .unwrap()
            .into()
    }

    #[tokio::test]
    async fn test_response_stream_skips_malformed_frame() {
        let body = concat!(
            "data: {\"id\":\"m1\",\"content\":\"Hel\",\"role\":\"assistant\",\"timestamp\":\"2025-07-23T14:00:00\",\"sessionId\":\"s1\",\"isComplete\":false}\n\n",
            "data: {broken\n\n",
            "data: {\"id\":\"m1\",\"content\":\"lo\",\"role\":\"assistant\",\"timestamp\":\"2025-07-23T14:00:01\",\"sessionId\":\"s1\",\"isComplete\":true}\n\n",
        );
        let stream = response_stream(body_response(200, body), CancellationToken::new());
        let items: Vec<_> = stream.collect().await;

        assert_eq!(items.len(), 2);
        let contents: Vec<String> = items
            .into_iter()
            .map(|item| item.unwrap().content)
            .collect();
        assert_eq!(contents, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn test_response_stream_stops_when_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let stream = response_stream(body_response(200, "data: [DONE]\n\n"), cancel);
        let items: Vec<_> = stream.collect().await;
        assert!(matches!(items.as_slice(), [Err(Error::Aborted)]));
    }

    #[tokio::test]
    async fn test_status_error_reads_fastapi_detail() {
        let response = body_response(404, r#"{"detail":"Session not found"}"#);
        let error = reqwest_eventsource::Error::InvalidStatusCode(response.status(), response);
        match map_event_source_error(error).await {
            Error::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Session not found");
            }
            other => panic!("expected api error, got {:?}", other),
        }
    }

    #[test]
    fn test_truncate_on_char_boundary() {
        assert_eq!(truncate("캘린더 일정", 3), "캘린더...");
        assert_eq!(truncate("abc", 5), "abc");
    }
}
