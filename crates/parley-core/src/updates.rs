use crate::message::Message;

/// Typed notifications a [`crate::ConversationStream`] emits on its update
/// channel. Every event the stream can produce is enumerated here; there
/// are no optional hooks.
#[derive(Debug, Clone)]
pub enum StreamUpdate {
    InitialPageLoaded {
        count: usize,
    },
    OlderPageLoaded {
        count: usize,
    },
    /// A live create landed (or replaced an optimistic entry).
    MessageReceived {
        message: Message,
    },
    MessageUpdated {
        message: Message,
    },
    MessageDeleted {
        message_id: String,
    },
    /// An optimistic local append, before the backend round-trip.
    MessageAppended {
        message_id: String,
    },
    SendFailed {
        message_id: String,
        error: String,
    },
    ReadPointerChanged {
        message_id: String,
    },
}

/// Aggregate "someone else is typing" notifications. Emitted only when the
/// visible value or the set of typing users actually changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypingUpdate {
    Changed { typing: bool, user_ids: Vec<String> },
}
