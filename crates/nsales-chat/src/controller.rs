//! Single-flight stream control for one chat session

use futures::StreamExt;
use nsales_client::{
    Attachment, ChatMessage, ChatRequest, ChatStreamChunk, StreamRequest, Transition,
    TurnAccumulator,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::{sync::broadcast, task::JoinHandle};

use crate::{
    conversation::Conversation,
    error::{Error, Result},
    events::StreamEvent,
    handle::{Attempt, AttemptGuard, Shared, StreamHandle},
    transport::ChatTransport,
};

/// Called for every decoded chunk of the live stream, in arrival order.
/// Runs while the transcript is locked: it must not read the transcript,
/// start a stream or abort.
pub type ChunkCallback = Arc<dyn Fn(&ChatStreamChunk) + Send + Sync>;

/// Called at most once per stream, when it fails. Same locking rule as
/// [`ChunkCallback`].
pub type ErrorCallback = Arc<dyn Fn(&nsales_client::Error) + Send + Sync>;

/// How a stream attempt ended
#[derive(Debug)]
pub enum StreamOutcome {
    /// The terminal chunk arrived; carries the finished assistant message
    Completed(ChatMessage),
    /// A newer request replaced this one
    Superseded,
    /// The caller aborted the stream
    Aborted,
    /// The transport failed
    Failed(Error),
}

impl StreamOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, StreamOutcome::Completed(_))
    }

    /// Finished message, or the reason there is none
    pub fn into_result(self) -> Result<ChatMessage> {
        match self {
            StreamOutcome::Completed(message) => Ok(message),
            StreamOutcome::Superseded | StreamOutcome::Aborted => {
                Err(Error::Client(nsales_client::Error::Aborted))
            }
            StreamOutcome::Failed(e) => Err(e),
        }
    }
}

/// A started stream
#[derive(Debug)]
pub struct StreamTicket {
    request_id: String,
    task: JoinHandle<StreamOutcome>,
}

impl StreamTicket {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Wait for the stream to end
    pub async fn outcome(self) -> StreamOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => StreamOutcome::Failed(Error::Other(format!("Stream task failed: {}", e))),
        }
    }
}

/// Per-submission options applied by [`StreamController::submit`]
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub model: Option<String>,
    pub web_search: Option<bool>,
}

#[derive(Clone, Default)]
struct Callbacks {
    on_chunk: Option<ChunkCallback>,
    on_error: Option<ErrorCallback>,
}

/// Drives streamed replies for one session.
///
/// At most one stream is active. Starting a new one cancels the previous
/// stream before the new request is issued; the superseded stream ends
/// without reporting anything.
pub struct StreamController {
    session_id: String,
    transport: Arc<dyn ChatTransport>,
    options: RequestOptions,
    conversation: Arc<Mutex<Conversation>>,
    callbacks: Callbacks,
    event_tx: broadcast::Sender<StreamEvent>,
    handle: StreamHandle,
}

impl StreamController {
    /// Create a controller for `session_id`
    pub fn new(session_id: impl Into<String>, transport: Arc<dyn ChatTransport>) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        let conversation = Arc::new(Mutex::new(Conversation::default()));
        Self {
            session_id: session_id.into(),
            transport,
            options: RequestOptions::default(),
            handle: StreamHandle::new(event_tx.clone(), Arc::clone(&conversation)),
            conversation,
            callbacks: Callbacks::default(),
            event_tx,
        }
    }

    /// Seed the transcript, e.g. with stored history
    pub fn with_conversation(self, conversation: Conversation) -> Self {
        *self.conversation.lock() = conversation;
        self
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the chunk callback
    pub fn set_on_chunk(&mut self, f: impl Fn(&ChatStreamChunk) + Send + Sync + 'static) {
        self.callbacks.on_chunk = Some(Arc::new(f));
    }

    /// Set the error callback
    pub fn set_on_error(&mut self, f: impl Fn(&nsales_client::Error) + Send + Sync + 'static) {
        self.callbacks.on_error = Some(Arc::new(f));
    }

    /// Subscribe to stream events
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.event_tx.subscribe()
    }

    /// Get a cloneable handle for aborting from outside
    pub fn handle(&self) -> StreamHandle {
        self.handle.clone()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Snapshot of the transcript
    pub fn conversation(&self) -> Conversation {
        self.conversation.lock().clone()
    }

    /// Finalized messages
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.conversation.lock().messages.clone()
    }

    pub fn is_streaming(&self) -> bool {
        self.handle.is_streaming()
    }

    /// Abort the active stream. Returns `false` if nothing was streaming.
    pub fn abort(&self) -> bool {
        self.handle.abort()
    }

    /// Submit `content` (and optional uploads) to this session
    pub fn submit(&self, content: impl Into<String>, files: Vec<Attachment>) -> Result<StreamTicket> {
        let mut chat = ChatRequest::new(self.session_id.clone(), content);
        chat.model = self.options.model.clone();
        chat.web_search = self.options.web_search;
        self.start_stream(StreamRequest::new(chat).with_files(files))
    }

    /// Start streaming a reply, superseding any active stream.
    ///
    /// Fails with [`Error::DuplicateRequest`] if the same session and content
    /// are already in flight. Everything else is reported through callbacks,
    /// events and the ticket's outcome.
    pub fn start_stream(&self, request: StreamRequest) -> Result<StreamTicket> {
        let key = logical_key(&request.chat);
        let Some(generation) = self.handle.shared.reserve(&key) else {
            tracing::warn!(session_id = %request.chat.session_id, "Rejected duplicate submission");
            return Err(Error::DuplicateRequest(key));
        };

        let request_id = new_request_id(&request.chat.session_id);
        let attempt = Arc::new(Attempt::new(request_id.clone(), generation, key));

        // The previous stream's token is cancelled here, before the new
        // request reaches the transport. Swapping under the transcript lock
        // keeps the old stream's callbacks from running after this point.
        let previous = {
            let mut conversation = self.conversation.lock();
            let previous = self.handle.shared.replace_active(Arc::clone(&attempt));
            conversation.stream_message = None;
            conversation.error = None;
            let mut user = ChatMessage::user(
                request.chat.content.clone(),
                request.chat.session_id.clone(),
            );
            user.attached_files = request.files.iter().map(Attachment::descriptor).collect();
            conversation.push(user);
            previous
        };

        if let Some(previous) = previous {
            tracing::debug!(
                request_id = %previous.request_id,
                by = %request_id,
                "Superseded stream"
            );
            let _ = self.event_tx.send(StreamEvent::Superseded {
                request_id: previous.request_id.clone(),
                by: request_id.clone(),
            });
        }

        tracing::debug!(
            request_id = %request_id,
            session_id = %request.chat.session_id,
            files = request.files.len(),
            "Starting stream"
        );
        let _ = self.event_tx.send(StreamEvent::Started {
            request_id: request_id.clone(),
            session_id: request.chat.session_id.clone(),
        });

        let run = StreamRun {
            transport: Arc::clone(&self.transport),
            shared: Arc::clone(&self.handle.shared),
            attempt,
            conversation: Arc::clone(&self.conversation),
            callbacks: self.callbacks.clone(),
            event_tx: self.event_tx.clone(),
        };
        let task = tokio::spawn(run.drive(request));

        Ok(StreamTicket { request_id, task })
    }

    /// Start a stream and wait for the finished assistant message
    pub async fn run_to_completion(&self, request: StreamRequest) -> Result<ChatMessage> {
        self.start_stream(request)?.outcome().await.into_result()
    }
}

/// Identity of a submission for duplicate detection
fn logical_key(chat: &ChatRequest) -> String {
    format!("{}:{}", chat.session_id, chat.content)
}

/// `{sessionId}-{unix millis}-{8 hex chars}`
fn new_request_id(session_id: &str) -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        session_id,
        chrono::Utc::now().timestamp_millis(),
        &random[..8]
    )
}

/// Everything the spawned stream task needs
struct StreamRun {
    transport: Arc<dyn ChatTransport>,
    shared: Arc<Shared>,
    attempt: Arc<Attempt>,
    conversation: Arc<Mutex<Conversation>>,
    callbacks: Callbacks,
    event_tx: broadcast::Sender<StreamEvent>,
}

impl StreamRun {
    async fn drive(self, request: StreamRequest) -> StreamOutcome {
        let _guard = AttemptGuard::new(Arc::clone(&self.shared), Arc::clone(&self.attempt));
        let cancel = self.attempt.cancel.clone();

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return self.cancelled(),
            opened = self.transport.open_stream(request, cancel.clone()) => opened,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => return self.fail(e),
        };

        let mut turn = TurnAccumulator::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                item = stream.next() => Some(item),
            };
            let Some(item) = next else {
                return self.cancelled();
            };

            let chunk = match item {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) if e.is_aborted() => return self.cancelled(),
                Some(Err(e)) => return self.fail(e),
                None => {
                    return self.fail(nsales_client::Error::UnexpectedResponse(
                        "stream ended before the final chunk".to_string(),
                    ));
                }
            };

            if let Some(outcome) = self.fold(&mut turn, chunk) {
                return outcome;
            }
        }
    }

    /// Fold one chunk; `Some` once the stream is over
    fn fold(&self, turn: &mut TurnAccumulator, chunk: ChatStreamChunk) -> Option<StreamOutcome> {
        let request_id = &self.attempt.request_id;
        let fold = {
            let mut conversation = self.conversation.lock();
            if !self.shared.is_live(&self.attempt) {
                drop(conversation);
                return Some(self.cancelled());
            }
            let fold = turn.push(chunk.clone());
            match &fold.transition {
                Transition::Ignored => return None,
                Transition::Completed(message) => {
                    conversation.stream_message = None;
                    conversation.push(message.clone());
                }
                Transition::Restarted { abandoned } => {
                    tracing::warn!(
                        request_id = %request_id,
                        abandoned_id = %abandoned.id,
                        "Discarding partial message"
                    );
                    conversation.stream_message = turn.current().cloned();
                }
                Transition::Started | Transition::Appended => {
                    conversation.stream_message = turn.current().cloned();
                }
            }
            if let Some(ref on_chunk) = self.callbacks.on_chunk {
                on_chunk(&chunk);
            }
            fold
        };

        let _ = self.event_tx.send(StreamEvent::Chunk {
            request_id: request_id.clone(),
            chunk,
        });

        if let Some(tool) = fold.tool {
            tracing::debug!(
                request_id = %request_id,
                tool = %tool.tool_name,
                status = ?tool.to,
                "Tool status changed"
            );
            let _ = self.event_tx.send(StreamEvent::ToolStatus {
                request_id: request_id.clone(),
                tool_name: tool.tool_name,
                from: tool.from,
                to: tool.to,
            });
        }

        match fold.transition {
            Transition::Completed(message) => {
                tracing::debug!(
                    request_id = %request_id,
                    message_id = %message.id,
                    len = message.content.len(),
                    "Stream completed"
                );
                let _ = self.event_tx.send(StreamEvent::Completed {
                    request_id: request_id.clone(),
                    message: message.clone(),
                });
                Some(StreamOutcome::Completed(message))
            }
            _ => None,
        }
    }

    fn cancelled(&self) -> StreamOutcome {
        if self.attempt.was_superseded() {
            tracing::debug!(request_id = %self.attempt.request_id, "Stream ended after supersede");
            StreamOutcome::Superseded
        } else {
            tracing::debug!(request_id = %self.attempt.request_id, "Stream ended after abort");
            StreamOutcome::Aborted
        }
    }

    fn fail(&self, error: nsales_client::Error) -> StreamOutcome {
        {
            let mut conversation = self.conversation.lock();
            if !self.shared.is_live(&self.attempt) {
                drop(conversation);
                return self.cancelled();
            }
            conversation.stream_message = None;
            conversation.error = Some(error.to_string());

            tracing::error!(request_id = %self.attempt.request_id, error = %error, "Stream failed");
            if let Some(ref on_error) = self.callbacks.on_error {
                on_error(&error);
            }
        }
        let _ = self.event_tx.send(StreamEvent::Error {
            request_id: self.attempt.request_id.clone(),
            message: error.to_string(),
        });
        StreamOutcome::Failed(Error::Client(error))
    }
}
