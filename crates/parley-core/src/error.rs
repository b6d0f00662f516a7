use thiserror::Error;

/// Nothing here is fatal: every variant is recoverable by retrying or
/// dismissing at the call site.
#[derive(Debug, Clone, Error)]
pub enum ChatError {
    /// Page load, send or receipt failure. Always reported to the caller,
    /// never swallowed, never retried by the core.
    #[error("network operation failed: {message}")]
    Network { message: String },

    /// Operation attempted against state that cannot accept it.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// Live event bound to a different conversation than this stream.
    #[error("event for conversation {actual} does not match {expected}")]
    MalformedEvent { expected: String, actual: String },
}

impl ChatError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }
}
