use serde::{Deserialize, Serialize};

/// Delivery/read progress of one message, as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Optimistically appended locally; the backend has not echoed it yet.
    Delivering,
    Delivered,
    SomeRead,
    AllRead,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delivering => "delivering",
            Self::Delivered => "delivered",
            Self::SomeRead => "some_read",
            Self::AllRead => "all_read",
        }
    }
}

/// Kind of a live record-change event from the backend subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    Create,
    Update,
    Delete,
}

/// One chat message. Identity is `id`; updates replace in place by id match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub creator_id: String,
    pub body: Option<String>,
    /// Resource locator of an attachment, resolvable through the fetch
    /// dispatcher.
    pub attachment: Option<String>,
    /// Creation time in seconds since the Unix epoch.
    pub created_at: i64,
    pub status: DeliveryStatus,
}

pub fn now_seconds() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
