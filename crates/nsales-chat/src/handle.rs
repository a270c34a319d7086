//! A cloneable handle for aborting streams from external code.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::conversation::Conversation;
use crate::events::StreamEvent;

/// One stream attempt. Liveness is decided by its token and generation,
/// never by comparing transport handles.
#[derive(Debug)]
pub(crate) struct Attempt {
    pub(crate) request_id: String,
    pub(crate) generation: u64,
    /// Logical request key held in the pending set
    pub(crate) key: String,
    pub(crate) cancel: CancellationToken,
    superseded: AtomicBool,
}

impl Attempt {
    pub(crate) fn new(request_id: String, generation: u64, key: String) -> Self {
        Self {
            request_id,
            generation,
            key,
            cancel: CancellationToken::new(),
            superseded: AtomicBool::new(false),
        }
    }

    pub(crate) fn was_superseded(&self) -> bool {
        self.superseded.load(Ordering::Acquire)
    }
}

/// State shared between the controller, its handles and the stream task.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    active: Mutex<Option<Arc<Attempt>>>,
    /// Logical request key -> generation of the attempt holding it
    pending: Mutex<HashMap<String, u64>>,
    generation: AtomicU64,
}

impl Shared {
    /// Reserve `key` for a new attempt and return the attempt's generation.
    /// `None` if the same logical request is already in flight.
    pub(crate) fn reserve(&self, key: &str) -> Option<u64> {
        let mut pending = self.pending.lock();
        if pending.contains_key(key) {
            return None;
        }
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        pending.insert(key.to_string(), generation);
        Some(generation)
    }

    /// Install `next` as the active attempt. The previous one, if any, is
    /// marked superseded and cancelled before this returns.
    pub(crate) fn replace_active(&self, next: Arc<Attempt>) -> Option<Arc<Attempt>> {
        let previous = self.active.lock().replace(next);
        if let Some(ref prev) = previous {
            prev.superseded.store(true, Ordering::Release);
            prev.cancel.cancel();
            self.release_key(prev);
        }
        previous
    }

    /// Take and cancel the active attempt
    pub(crate) fn take_active(&self) -> Option<Arc<Attempt>> {
        let current = self.active.lock().take();
        if let Some(ref attempt) = current {
            attempt.cancel.cancel();
            self.release_key(attempt);
        }
        current
    }

    /// Whether `attempt` may still deliver callbacks
    pub(crate) fn is_live(&self, attempt: &Attempt) -> bool {
        !attempt.cancel.is_cancelled()
            && self
                .active
                .lock()
                .as_ref()
                .is_some_and(|a| a.generation == attempt.generation)
    }

    /// Drop every trace of `attempt`. Entries owned by a newer attempt are
    /// left alone.
    pub(crate) fn release(&self, attempt: &Attempt) {
        self.release_key(attempt);
        let mut active = self.active.lock();
        if active.as_ref().is_some_and(|a| a.generation == attempt.generation) {
            *active = None;
        }
    }

    fn release_key(&self, attempt: &Attempt) {
        let mut pending = self.pending.lock();
        if pending.get(&attempt.key) == Some(&attempt.generation) {
            pending.remove(&attempt.key);
        }
    }

    pub(crate) fn active_request_id(&self) -> Option<String> {
        self.active.lock().as_ref().map(|a| a.request_id.clone())
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }
}

/// Releases an attempt's pending entry and active slot when dropped, so every
/// exit path of the stream task cleans up.
pub(crate) struct AttemptGuard {
    shared: Arc<Shared>,
    attempt: Arc<Attempt>,
}

impl AttemptGuard {
    pub(crate) fn new(shared: Arc<Shared>, attempt: Arc<Attempt>) -> Self {
        Self { shared, attempt }
    }
}

impl Drop for AttemptGuard {
    fn drop(&mut self) {
        self.shared.release(&self.attempt);
    }
}

/// A cloneable handle for aborting the controller's stream from external
/// code, e.g. a Ctrl-C handler.
///
/// All fields are `Arc`-wrapped, so cloning is cheap.
#[derive(Clone)]
pub struct StreamHandle {
    pub(crate) shared: Arc<Shared>,
    pub(crate) conversation: Arc<Mutex<Conversation>>,
    pub(crate) event_tx: broadcast::Sender<StreamEvent>,
}

impl StreamHandle {
    pub(crate) fn new(
        event_tx: broadcast::Sender<StreamEvent>,
        conversation: Arc<Mutex<Conversation>>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            conversation,
            event_tx,
        }
    }

    /// Abort the active stream. Returns `false` if nothing was streaming.
    ///
    /// The stream ends silently: no error callback fires for it and its
    /// partial message is dropped. Must not be called from inside a chunk or
    /// error callback.
    pub fn abort(&self) -> bool {
        // Under the transcript lock: no callback of this stream runs after return
        let mut conversation = self.conversation.lock();
        match self.shared.take_active() {
            Some(attempt) => {
                conversation.stream_message = None;
                drop(conversation);
                tracing::debug!(request_id = %attempt.request_id, "Aborted stream");
                let _ = self.event_tx.send(StreamEvent::Aborted {
                    request_id: attempt.request_id.clone(),
                });
                true
            }
            None => false,
        }
    }

    /// Whether a stream is currently active
    pub fn is_streaming(&self) -> bool {
        self.shared.active_request_id().is_some()
    }

    /// Request id of the active stream
    pub fn active_request_id(&self) -> Option<String> {
        self.shared.active_request_id()
    }

    /// Number of logical requests currently in flight
    pub fn pending_requests(&self) -> usize {
        self.shared.pending_len()
    }
}
