//! Live conversation state for a chat client.
//!
//! Three cooperating components, independent of any UI toolkit:
//!
//! - [`ConversationStream`] merges paginated history with live
//!   create/update/delete events into one ordered, duplicate-free message
//!   list and tracks read/delivery state.
//! - [`TypingIndicatorTracker`] keeps per-user "is typing" state with
//!   debounced fail-safe expiry.
//! - [`ResourceFetchDispatcher`] (re-exported from `parley-fetch`)
//!   coalesces attachment and avatar fetches behind a bounded LRU cache.
//!
//! The backend (record storage, transport, auth, push) stays behind the
//! [`ChatBackend`] and [`ResourceFetcher`] traits; [`ChatClient`] is the
//! composition root that wires them together.

#![forbid(unsafe_code)]

mod backend;
mod client;
mod config;
mod error;
mod logging;
mod message;
mod stream;
mod typing;
mod updates;

pub use backend::{ChatBackend, MessageEventHandler, SubscriptionHandle, TypingEventHandler};
pub use client::ChatClient;
pub use config::ChatConfig;
pub use error::ChatError;
pub use logging::init_logging;
pub use message::{now_seconds, ChangeEvent, DeliveryStatus, Message};
pub use stream::ConversationStream;
pub use typing::{
    schedule_expiry, TimerToken, TypingEvent, TypingIndicator, TypingIndicatorTracker,
};
pub use updates::{StreamUpdate, TypingUpdate};

pub use parley_fetch::{
    BoundedCache, FetchCallback, FetchError, FetchTicket, ResourceFetchDispatcher, ResourceFetcher,
};
