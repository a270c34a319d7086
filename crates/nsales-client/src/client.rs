//! REST and streaming client for the chat backend

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest_eventsource::EventSource;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{Error, Result},
    transport::{ChunkStream, event_source_stream, response_stream},
    types::{
        Attachment, ChatHistory, ChatRequest, ChatResponse, ChatSearch, ChatSession,
        ChatSessionList, StreamRequest, ToolsStatus,
    },
};

/// Default backend location
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1";

/// Connection settings for [`ChatClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL including the API prefix, e.g. `http://localhost:8000/api/v1`
    pub base_url: String,
    /// Timeout for plain REST calls. Streams are never timed out, only
    /// cancelled.
    pub request_timeout: Option<Duration>,
    /// Timeout for establishing a connection
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Some(Duration::from_secs(30)),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }
}

/// Client for the chat service
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    request_timeout: Option<Duration>,
}

impl ChatClient {
    /// Create a client from a config
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::InvalidConfig(format!(
                "base URL must start with http:// or https://, got '{}'",
                config.base_url
            )));
        }

        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url,
            request_timeout: config.request_timeout,
        })
    }

    /// Base URL requests are issued against
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn timed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.request_timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }

    /// Open a streamed reply for a submission.
    ///
    /// JSON submissions go through an event source; submissions with uploads
    /// are posted as multipart to the same endpoint and the response body is
    /// read as an event stream.
    pub async fn stream_message(
        &self,
        request: &StreamRequest,
        cancel: CancellationToken,
    ) -> Result<ChunkStream> {
        let url = self.url("/chat/stream");

        if !request.has_files() {
            let builder = self.http.post(&url).json(&request.chat);
            let event_source = EventSource::new(builder)
                .map_err(|e| Error::Sse(format!("Failed to create event source: {}", e)))?;
            tracing::debug!(session_id = %request.chat.session_id, "Opened chat stream");
            return Ok(Box::pin(event_source_stream(event_source, cancel)));
        }

        let form = multipart_form(&request.chat, &request.files)?;
        let send = self
            .http
            .post(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .multipart(form)
            .send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Aborted),
            response = send => response?,
        };
        let response = check_status(response).await?;
        tracing::debug!(
            session_id = %request.chat.session_id,
            files = request.files.len(),
            "Opened chat stream with uploads"
        );
        Ok(Box::pin(response_stream(response, cancel)))
    }

    /// Send a message and wait for the whole reply
    pub async fn send_message(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let response = self
            .timed(self.http.post(self.url("/chat/messages")).json(request))
            .send()
            .await?;
        decode(response).await
    }

    /// Send a message with uploads and wait for the whole reply
    pub async fn send_message_with_files(
        &self,
        content: &str,
        session_id: &str,
        files: &[Attachment],
    ) -> Result<ChatResponse> {
        let form = multipart_form(&ChatRequest::new(session_id, content), files)?;
        let response = self
            .timed(self.http.post(self.url("/chat/messages/with-files")).multipart(form))
            .send()
            .await?;
        decode(response).await
    }

    /// Create a session, optionally titled
    pub async fn create_session(&self, title: Option<&str>) -> Result<ChatSession> {
        let response = self
            .timed(
                self.http
                    .post(self.url("/chat/sessions"))
                    .json(&serde_json::json!({ "title": title })),
            )
            .send()
            .await?;
        decode(response).await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<ChatSession> {
        let response = self
            .timed(self.http.get(self.url(&format!("/chat/sessions/{}", session_id))))
            .send()
            .await?;
        decode(response).await
    }

    /// List sessions, one page at a time
    pub async fn list_sessions(&self, search: &ChatSearch) -> Result<ChatSessionList> {
        let response = self
            .timed(self.http.get(self.url("/chat/sessions")).query(search))
            .send()
            .await?;
        decode(response).await
    }

    /// Rename a session
    pub async fn update_session(&self, session_id: &str, title: &str) -> Result<()> {
        let response = self
            .timed(
                self.http
                    .patch(self.url(&format!("/chat/sessions/{}", session_id)))
                    .json(&serde_json::json!({ "title": title })),
            )
            .send()
            .await?;
        check_status(response).await.map(|_| ())
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        let response = self
            .timed(self.http.delete(self.url(&format!("/chat/sessions/{}", session_id))))
            .send()
            .await?;
        check_status(response).await.map(|_| ())
    }

    /// Fetch the stored transcript of a session
    pub async fn message_history(&self, session_id: &str) -> Result<ChatHistory> {
        let response = self
            .timed(
                self.http
                    .get(self.url(&format!("/chat/sessions/{}/messages", session_id))),
            )
            .send()
            .await?;
        decode(response).await
    }

    pub async fn delete_message(&self, message_id: &str) -> Result<()> {
        let response = self
            .timed(self.http.delete(self.url(&format!("/chat/messages/{}", message_id))))
            .send()
            .await?;
        check_status(response).await.map(|_| ())
    }

    /// Ask the backend to answer a message again
    pub async fn regenerate_message(&self, message_id: &str) -> Result<ChatResponse> {
        let response = self
            .timed(
                self.http
                    .post(self.url(&format!("/chat/messages/{}/regenerate", message_id))),
            )
            .send()
            .await?;
        decode(response).await
    }

    /// Tools the assistant can currently call
    pub async fn tools_status(&self) -> Result<ToolsStatus> {
        let response = self
            .timed(self.http.get(self.url("/chat/tools/status")))
            .send()
            .await?;
        decode(response).await
    }
}

fn multipart_form(chat: &ChatRequest, files: &[Attachment]) -> Result<Form> {
    let mut form = Form::new()
        .text("content", chat.content.clone())
        .text("sessionId", chat.session_id.clone());
    if let Some(ref model) = chat.model {
        form = form.text("model", model.clone());
    }
    if let Some(web_search) = chat.web_search {
        form = form.text("webSearch", web_search.to_string());
    }

    for file in files {
        let part = Part::bytes(file.data.clone())
            .file_name(file.name.clone())
            .mime_str(&file.mime_type)?;
        form = form.part("files", part);
    }
    Ok(form)
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::debug!(status = status.as_u16(), body = %body, "Backend returned an error");
    Err(Error::api(status.as_u16(), error_detail(&body)))
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let response = check_status(response).await?;
    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}

/// FastAPI wraps errors as `{"detail": ...}`; fall back to the raw body
pub(crate) fn error_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| match v.get("detail") {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
            None => None,
        })
        .unwrap_or_else(|| body.to_string())
}
