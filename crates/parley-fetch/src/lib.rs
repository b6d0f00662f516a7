//! Coalescing resource fetches with a bounded in-memory cache.
//!
//! Chat UIs ask for the same attachment or avatar many times in quick
//! succession (every visible cell wants the same bytes). This crate keeps
//! at most one fetch in flight per resource locator and fans the result out
//! to every caller that asked while the fetch was running, with completed
//! payloads held in a fixed-capacity LRU cache.
//!
//! Both [`ResourceFetchDispatcher`] and [`BoundedCache`] are safe to share
//! across threads; each is guarded by a single mutex.

#![forbid(unsafe_code)]

mod cache;
mod dispatcher;
mod error;

pub use cache::BoundedCache;
pub use dispatcher::{FetchCallback, FetchTicket, ResourceFetchDispatcher, ResourceFetcher};
pub use error::FetchError;
