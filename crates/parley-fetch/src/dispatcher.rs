use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::{BoundedCache, FetchError};

/// Backend collaborator that resolves a resource locator to raw bytes.
/// Transport, auth and retries live behind this trait.
#[async_trait]
pub trait ResourceFetcher: Send + Sync + 'static {
    async fn fetch_bytes(&self, locator: &str) -> Result<Bytes, FetchError>;
}

/// Invoked exactly once with the fetched bytes, or `None` on failure.
pub type FetchCallback = Box<dyn FnOnce(Option<Bytes>) + Send + 'static>;

/// Identifies one registered waiter. Pass it to
/// [`ResourceFetchDispatcher::cancel`] to stop caring about a result.
/// Waiter ids come from a monotonically increasing counter, so two tickets
/// never collide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    key: String,
    id: u64,
}

impl FetchTicket {
    pub fn key(&self) -> &str {
        &self.key
    }
}

struct DispatchItem {
    waiters: Vec<(u64, FetchCallback)>,
}

/// Coalesces concurrent fetches for the same resource locator into one
/// in-flight operation with many waiters.
///
/// At most one fetch per key is ever in flight. Every waiter registered
/// before completion receives the identical result; the registry entry is
/// discarded on completion (success or failure), so a later request starts
/// fresh. Successful payloads land in the [`BoundedCache`], and cache hits
/// answer synchronously without touching the registry.
pub struct ResourceFetchDispatcher {
    fetcher: Arc<dyn ResourceFetcher>,
    cache: Arc<BoundedCache>,
    runtime: tokio::runtime::Handle,
    items: Arc<Mutex<HashMap<String, DispatchItem>>>,
    next_ticket: AtomicU64,
}

impl ResourceFetchDispatcher {
    pub fn new(
        fetcher: Arc<dyn ResourceFetcher>,
        cache: Arc<BoundedCache>,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        Self {
            fetcher,
            cache,
            runtime,
            items: Arc::new(Mutex::new(HashMap::new())),
            next_ticket: AtomicU64::new(1),
        }
    }

    pub fn cache(&self) -> &Arc<BoundedCache> {
        &self.cache
    }

    /// True while a fetch for `key` has not yet completed.
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.items.lock().contains_key(key)
    }

    /// Requests the bytes behind `key`, joining an in-flight fetch when one
    /// exists. The callback fires on the fetch task (or synchronously on a
    /// cache hit).
    pub fn fetch(&self, key: &str, on_complete: FetchCallback) -> FetchTicket {
        let id = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let ticket = FetchTicket {
            key: key.to_string(),
            id,
        };

        if let Some(hit) = self.cache.get(key) {
            on_complete(Some(hit));
            return ticket;
        }

        // Presence check and waiter registration happen under one lock, so
        // a completing fetch either sees this waiter or has already removed
        // the entry (in which case a new fetch starts).
        let spawn_fetch = {
            let mut items = self.items.lock();
            match items.get_mut(key) {
                Some(item) => {
                    item.waiters.push((id, on_complete));
                    false
                }
                None => {
                    items.insert(
                        key.to_string(),
                        DispatchItem {
                            waiters: vec![(id, on_complete)],
                        },
                    );
                    true
                }
            }
        };

        if spawn_fetch {
            let fetcher = self.fetcher.clone();
            let cache = self.cache.clone();
            let items = self.items.clone();
            let key = key.to_string();
            self.runtime.spawn(async move {
                let result = match fetcher.fetch_bytes(&key).await {
                    Ok(payload) => {
                        cache.put(key.clone(), payload.clone());
                        Some(payload)
                    }
                    Err(e) => {
                        tracing::warn!(key = %key, error = %e, "resource fetch failed");
                        None
                    }
                };

                let drained = items
                    .lock()
                    .remove(&key)
                    .map(|item| item.waiters)
                    .unwrap_or_default();
                for (_, waiter) in drained {
                    waiter(result.clone());
                }
            });
        }

        ticket
    }

    /// Drops one waiter. The underlying fetch keeps running (other waiters
    /// may depend on it); with no waiters left its result is discarded.
    pub fn cancel(&self, ticket: &FetchTicket) {
        let mut items = self.items.lock();
        let Some(item) = items.get_mut(&ticket.key) else {
            tracing::warn!(key = %ticket.key, "cancel for a fetch that is not in flight");
            return;
        };
        item.waiters.retain(|(id, _)| *id != ticket.id);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use tokio::sync::Semaphore;

    use super::*;

    /// Counts calls and blocks each fetch until the gate hands out a permit.
    struct GatedFetcher {
        calls: AtomicUsize,
        gate: Semaphore,
        payload: Bytes,
    }

    impl GatedFetcher {
        fn new(payload: &str) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: Semaphore::new(0),
                payload: Bytes::copy_from_slice(payload.as_bytes()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ResourceFetcher for GatedFetcher {
        async fn fetch_bytes(&self, _locator: &str) -> Result<Bytes, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate
                .acquire()
                .await
                .map_err(|_| FetchError::network("gate closed"))?
                .forget();
            Ok(self.payload.clone())
        }
    }

    struct FailingFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ResourceFetcher for FailingFetcher {
        async fn fetch_bytes(&self, locator: &str) -> Result<Bytes, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::network(format!("no route to {locator}")))
        }
    }

    fn dispatcher(fetcher: Arc<dyn ResourceFetcher>) -> ResourceFetchDispatcher {
        ResourceFetchDispatcher::new(
            fetcher,
            Arc::new(BoundedCache::new(8).unwrap()),
            tokio::runtime::Handle::current(),
        )
    }

    fn collecting_callback() -> (FetchCallback, flume::Receiver<Option<Bytes>>) {
        let (tx, rx) = flume::bounded(1);
        (
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
            rx,
        )
    }

    #[tokio::test]
    async fn concurrent_fetches_share_one_backend_call() {
        let fetcher = GatedFetcher::new("payload");
        let dispatcher = dispatcher(fetcher.clone());

        let (cb1, rx1) = collecting_callback();
        let (cb2, rx2) = collecting_callback();
        dispatcher.fetch("k", cb1);
        dispatcher.fetch("k", cb2);
        assert!(dispatcher.is_in_flight("k"));

        fetcher.gate.add_permits(1);
        let first = rx1.recv_async().await.unwrap();
        let second = rx2.recv_async().await.unwrap();

        assert_eq!(first, Some(Bytes::copy_from_slice(b"payload")));
        assert_eq!(first, second);
        assert_eq!(fetcher.calls(), 1);
        assert!(!dispatcher.is_in_flight("k"));
    }

    #[tokio::test]
    async fn completed_entry_is_discarded_and_refetched() {
        let fetcher = Arc::new(FailingFetcher {
            calls: AtomicUsize::new(0),
        });
        let dispatcher = dispatcher(fetcher.clone());

        let (cb1, rx1) = collecting_callback();
        dispatcher.fetch("k", cb1);
        assert_eq!(rx1.recv_async().await.unwrap(), None);
        assert!(!dispatcher.is_in_flight("k"));

        // Failures are not cached, so the next request starts fresh.
        let (cb2, rx2) = collecting_callback();
        dispatcher.fetch("k", cb2);
        assert_eq!(rx2.recv_async().await.unwrap(), None);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancel_removes_only_that_waiter() {
        let fetcher = GatedFetcher::new("payload");
        let dispatcher = dispatcher(fetcher.clone());

        let (cb1, rx1) = collecting_callback();
        let (cb2, rx2) = collecting_callback();
        let ticket1 = dispatcher.fetch("k", cb1);
        dispatcher.fetch("k", cb2);

        dispatcher.cancel(&ticket1);
        fetcher.gate.add_permits(1);

        assert!(rx2.recv_async().await.unwrap().is_some());
        assert!(rx1.try_recv().is_err());
        // The fetch itself ran to completion.
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn cancel_after_completion_is_harmless() {
        let fetcher = GatedFetcher::new("payload");
        let dispatcher = dispatcher(fetcher.clone());

        let (cb, rx) = collecting_callback();
        let ticket = dispatcher.fetch("k", cb);
        fetcher.gate.add_permits(1);
        rx.recv_async().await.unwrap();

        dispatcher.cancel(&ticket);
        assert!(!dispatcher.is_in_flight("k"));
    }

    #[tokio::test]
    async fn cache_hit_answers_without_a_fetch() {
        let fetcher = GatedFetcher::new("payload");
        let dispatcher = dispatcher(fetcher.clone());
        dispatcher
            .cache()
            .put("k", Bytes::copy_from_slice(b"cached"));

        let (cb, rx) = collecting_callback();
        dispatcher.fetch("k", cb);

        assert_eq!(
            rx.recv_async().await.unwrap(),
            Some(Bytes::copy_from_slice(b"cached"))
        );
        assert_eq!(fetcher.calls(), 0);
        assert!(!dispatcher.is_in_flight("k"));
    }

    #[tokio::test]
    async fn successful_fetch_populates_the_cache() {
        let fetcher = GatedFetcher::new("payload");
        let dispatcher = dispatcher(fetcher.clone());

        let (cb, rx) = collecting_callback();
        dispatcher.fetch("k", cb);
        fetcher.gate.add_permits(1);
        rx.recv_async().await.unwrap();

        assert_eq!(
            dispatcher.cache().get("k"),
            Some(Bytes::copy_from_slice(b"payload"))
        );

        // A second request is served from cache; the gate has no permits
        // left, so a real fetch would hang.
        let (cb2, rx2) = collecting_callback();
        dispatcher.fetch("k", cb2);
        assert!(rx2.recv_async().await.unwrap().is_some());
        assert_eq!(fetcher.calls(), 1);
    }
}
