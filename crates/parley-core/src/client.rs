use std::sync::Arc;

use parley_fetch::{
    BoundedCache, FetchCallback, FetchTicket, ResourceFetchDispatcher, ResourceFetcher,
};

use crate::backend::ChatBackend;
use crate::config::ChatConfig;
use crate::error::ChatError;
use crate::stream::ConversationStream;
use crate::typing::TypingIndicatorTracker;
use crate::updates::{StreamUpdate, TypingUpdate};

/// Composition root. Collaborators are injected explicitly; there are no
/// process-wide singletons. One client per backend account is typical,
/// with streams and trackers handed out per conversation.
pub struct ChatClient {
    backend: Arc<dyn ChatBackend>,
    config: ChatConfig,
    dispatcher: ResourceFetchDispatcher,
}

impl ChatClient {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        fetcher: Arc<dyn ResourceFetcher>,
        runtime: tokio::runtime::Handle,
    ) -> Result<Self, ChatError> {
        Self::with_config(backend, fetcher, runtime, ChatConfig::default())
    }

    pub fn with_config(
        backend: Arc<dyn ChatBackend>,
        fetcher: Arc<dyn ResourceFetcher>,
        runtime: tokio::runtime::Handle,
        config: ChatConfig,
    ) -> Result<Self, ChatError> {
        let cache = BoundedCache::new(config.cache_capacity)
            .map_err(|_| ChatError::InvalidState("cache capacity must be greater than zero"))?;
        let dispatcher = ResourceFetchDispatcher::new(fetcher, Arc::new(cache), runtime);
        Ok(Self {
            backend,
            config,
            dispatcher,
        })
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn ChatBackend> {
        &self.backend
    }

    /// A stream over one conversation plus the channel its updates land on.
    pub fn open_conversation(
        &self,
        conversation_id: &str,
    ) -> (ConversationStream, flume::Receiver<StreamUpdate>) {
        let (tx, rx) = flume::unbounded();
        let stream = ConversationStream::new(self.backend.clone(), conversation_id, &self.config, tx);
        (stream, rx)
    }

    /// A typing tracker excluding `local_user_id` from its aggregate, plus
    /// its update channel.
    pub fn typing_tracker(
        &self,
        local_user_id: &str,
    ) -> (TypingIndicatorTracker, flume::Receiver<TypingUpdate>) {
        let (tx, rx) = flume::unbounded();
        let tracker = TypingIndicatorTracker::new(
            local_user_id,
            self.config.typing_display_duration(),
            tx,
        );
        (tracker, rx)
    }

    /// Requests resource bytes through the coalescing dispatcher.
    pub fn fetch_resource(&self, key: &str, on_complete: FetchCallback) -> FetchTicket {
        self.dispatcher.fetch(key, on_complete)
    }

    pub fn cancel_resource_fetch(&self, ticket: &FetchTicket) {
        self.dispatcher.cancel(ticket)
    }

    pub fn resource_cache(&self) -> &Arc<BoundedCache> {
        self.dispatcher.cache()
    }
}
