use std::sync::Arc;

use crate::backend::ChatBackend;
use crate::config::ChatConfig;
use crate::error::ChatError;
use crate::message::{ChangeEvent, DeliveryStatus, Message};
use crate::updates::StreamUpdate;

/// Ordered, duplicate-free view of one conversation's messages, merging a
/// paged history fetch with live create/update/delete events.
///
/// The stream is bound to exactly one conversation for its lifetime and is
/// owned by a single logical thread: all operations take `&mut self` and
/// are not internally synchronized. The async operations suspend on
/// backend I/O without blocking the owner.
///
/// Message order is oldest-first. History pages prepend; live creates and
/// local sends append. A live `Create` for an id already present replaces
/// the existing entry in place, which is the sole mechanism reconciling
/// the race between page loads and the live subscription, and makes event
/// application idempotent.
pub struct ConversationStream {
    conversation_id: String,
    backend: Arc<dyn ChatBackend>,
    update_tx: flume::Sender<StreamUpdate>,
    messages: Vec<Message>,
    has_more_history: bool,
    is_fetching_history: bool,
    fetch_limit: usize,
    last_read_id: Option<String>,
}

impl ConversationStream {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        conversation_id: impl Into<String>,
        config: &ChatConfig,
        update_tx: flume::Sender<StreamUpdate>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            backend,
            update_tx,
            messages: Vec::new(),
            has_more_history: false,
            is_fetching_history: false,
            fetch_limit: config.fetch_limit,
            last_read_id: None,
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn has_more_history(&self) -> bool {
        self.has_more_history
    }

    pub fn is_fetching_history(&self) -> bool {
        self.is_fetching_history
    }

    pub fn last_read_id(&self) -> Option<&str> {
        self.last_read_id.as_deref()
    }

    /// Loads the most recent page. No-op when messages are already loaded
    /// or a fetch is in flight. On success the backend's newest-first page
    /// becomes the oldest-first stream, the page is marked read, and
    /// `has_more_history` assumes more might exist unless the page was
    /// empty. A failed load leaves the stream untouched.
    pub async fn load_initial_page(&mut self) -> Result<(), ChatError> {
        if !self.messages.is_empty() || self.is_fetching_history {
            return Ok(());
        }

        self.is_fetching_history = true;
        let fetched = self
            .backend
            .fetch_message_page(&self.conversation_id, self.fetch_limit, None)
            .await;
        self.is_fetching_history = false;

        let mut page = fetched?;
        self.has_more_history = !page.is_empty();
        page.reverse();
        self.messages = page;
        let count = self.messages.len();
        self.emit(StreamUpdate::InitialPageLoaded { count });

        if let Some(newest_id) = self.messages.last().map(|m| m.id.clone()) {
            let ids: Vec<String> = self.messages.iter().map(|m| m.id.clone()).collect();
            self.issue_read_receipts(ids, newest_id).await;
        }
        Ok(())
    }

    /// Fetches the page older than the current oldest message and prepends
    /// it. No-op while a fetch is in flight or when `has_more_history` is
    /// false (which includes the never-loaded state).
    pub async fn load_older_page(&mut self) -> Result<(), ChatError> {
        if self.is_fetching_history || !self.has_more_history {
            return Ok(());
        }
        let Some(oldest_ts) = self.messages.first().map(|m| m.created_at) else {
            return Ok(());
        };

        self.is_fetching_history = true;
        let fetched = self
            .backend
            .fetch_message_page(&self.conversation_id, self.fetch_limit, Some(oldest_ts))
            .await;
        self.is_fetching_history = false;

        let mut page = fetched?;
        self.has_more_history = !page.is_empty();
        page.reverse();
        // A live create may already have pulled one of these into the
        // stream; keep the id-uniqueness invariant.
        page.retain(|m| self.message(&m.id).is_none());
        let count = page.len();
        page.append(&mut self.messages);
        self.messages = page;
        self.emit(StreamUpdate::OlderPageLoaded { count });
        Ok(())
    }

    /// Applies one live event from the message subscription. Events for a
    /// different conversation are dropped (and logged); the stream is keyed
    /// to one conversation for its lifetime.
    pub async fn apply_remote_event(&mut self, event: ChangeEvent, message: Message) {
        if message.conversation_id != self.conversation_id {
            let err = ChatError::MalformedEvent {
                expected: self.conversation_id.clone(),
                actual: message.conversation_id,
            };
            tracing::warn!(error = %err, "dropping event for another conversation");
            return;
        }

        match event {
            ChangeEvent::Create => {
                let id = message.id.clone();
                if let Some(existing) = self.messages.iter_mut().find(|m| m.id == id) {
                    *existing = message.clone();
                } else {
                    self.messages.push(message.clone());
                }
                self.emit(StreamUpdate::MessageReceived { message });
                self.issue_read_receipts(vec![id.clone()], id).await;
            }
            ChangeEvent::Update => {
                // Absent means outside the loaded window; nothing to do.
                if let Some(existing) = self.messages.iter_mut().find(|m| m.id == message.id) {
                    *existing = message.clone();
                    self.emit(StreamUpdate::MessageUpdated { message });
                }
            }
            ChangeEvent::Delete => {
                let before = self.messages.len();
                self.messages.retain(|m| m.id != message.id);
                if self.messages.len() != before {
                    self.emit(StreamUpdate::MessageDeleted {
                        message_id: message.id,
                    });
                }
            }
        }
    }

    /// Optimistically appends a local send with status `Delivering`. The
    /// caller reconciles later through the echoed `Create` event (same id)
    /// or removes the entry on failure.
    pub fn append_local_message(&mut self, mut message: Message) {
        message.status = DeliveryStatus::Delivering;
        let id = message.id.clone();
        if let Some(existing) = self.messages.iter_mut().find(|m| m.id == message.id) {
            *existing = message;
        } else {
            self.messages.push(message);
        }
        self.emit(StreamUpdate::MessageAppended { message_id: id });
    }

    /// Optimistic append plus backend round-trip. On success the confirmed
    /// message replaces the optimistic entry via the `Create` rule; on
    /// failure the entry stays `Delivering` for the caller to retry or
    /// remove, and the error is returned.
    pub async fn send_message(&mut self, mut draft: Message) -> Result<Message, ChatError> {
        draft.conversation_id = self.conversation_id.clone();
        self.append_local_message(draft.clone());

        match self
            .backend
            .send_message(&self.conversation_id, draft.clone())
            .await
        {
            Ok(confirmed) => {
                self.apply_remote_event(ChangeEvent::Create, confirmed.clone())
                    .await;
                Ok(confirmed)
            }
            Err(e) => {
                self.emit(StreamUpdate::SendFailed {
                    message_id: draft.id,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Drops an optimistic entry whose send the caller abandoned.
    pub fn remove_local_message(&mut self, id: &str) {
        let before = self.messages.len();
        self.messages.retain(|m| m.id != id);
        if self.messages.len() != before {
            self.emit(StreamUpdate::MessageDeleted {
                message_id: id.to_string(),
            });
        }
    }

    /// Advances the local last-read pointer to a loaded message and tells
    /// the backend. The local pointer moves even when the backend call
    /// fails, so a stale unread marker never reappears; the error is still
    /// reported.
    pub async fn mark_read(&mut self, up_to_message_id: &str) -> Result<(), ChatError> {
        if self.message(up_to_message_id).is_none() {
            return Err(ChatError::InvalidState("message is not loaded"));
        }
        self.set_last_read(up_to_message_id.to_string());
        self.backend
            .mark_last_read(&self.conversation_id, up_to_message_id)
            .await
    }

    /// Read receipts are best-effort: failures are logged, never surfaced,
    /// and never retried here.
    async fn issue_read_receipts(&mut self, ids: Vec<String>, last_id: String) {
        if let Err(e) = self.backend.mark_messages_read(&ids).await {
            tracing::warn!(error = %e, "mark messages read failed");
        }
        if let Err(e) = self
            .backend
            .mark_last_read(&self.conversation_id, &last_id)
            .await
        {
            tracing::warn!(error = %e, "mark last read failed");
        }
        self.set_last_read(last_id);
    }

    fn set_last_read(&mut self, message_id: String) {
        if self.last_read_id.as_deref() == Some(message_id.as_str()) {
            return;
        }
        self.last_read_id = Some(message_id.clone());
        self.emit(StreamUpdate::ReadPointerChanged { message_id });
    }

    fn emit(&self, update: StreamUpdate) {
        // A dropped receiver means nobody is listening; not an error.
        let _ = self.update_tx.send(update);
    }
}
