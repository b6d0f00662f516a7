use async_trait::async_trait;

use crate::error::ChatError;
use crate::message::{ChangeEvent, Message};
use crate::typing::TypingIndicator;

/// Opaque token returned by the subscribe calls; hand it back to
/// [`ChatBackend::unsubscribe`] to stop delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub u64);

pub type MessageEventHandler = Box<dyn Fn(ChangeEvent, Message) + Send + Sync + 'static>;
pub type TypingEventHandler = Box<dyn Fn(TypingIndicator) + Send + Sync + 'static>;

/// The backend collaborator. Record storage, querying, transport, auth and
/// push registration all live behind this trait; the core only consumes
/// these operations.
///
/// Handlers registered through the subscribe calls are invoked by the
/// backend's delivery machinery; implementations forward them into the
/// owner context that drives the stream and tracker.
#[async_trait]
pub trait ChatBackend: Send + Sync + 'static {
    /// Newest-first page of up to `limit` messages created strictly before
    /// `before` (unbounded when `None`).
    async fn fetch_message_page(
        &self,
        conversation_id: &str,
        limit: usize,
        before: Option<i64>,
    ) -> Result<Vec<Message>, ChatError>;

    /// Persists `draft` and returns the confirmed message. The backend
    /// preserves the client-assigned message id so the echoed create event
    /// reconciles with the optimistic entry.
    async fn send_message(
        &self,
        conversation_id: &str,
        draft: Message,
    ) -> Result<Message, ChatError>;

    async fn mark_messages_read(&self, message_ids: &[String]) -> Result<(), ChatError>;

    async fn mark_last_read(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<(), ChatError>;

    fn subscribe_message_events(
        &self,
        conversation_id: &str,
        handler: MessageEventHandler,
    ) -> Result<SubscriptionHandle, ChatError>;

    fn subscribe_typing_events(
        &self,
        conversation_id: &str,
        handler: TypingEventHandler,
    ) -> Result<SubscriptionHandle, ChatError>;

    fn unsubscribe(&self, handle: SubscriptionHandle);
}
