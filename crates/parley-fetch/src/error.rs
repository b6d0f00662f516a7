use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Cache capacity must be at least one entry.
    #[error("cache capacity must be greater than zero")]
    InvalidCapacity,

    /// The underlying resource fetch failed. Reported to every waiter;
    /// the dispatcher never retries on its own.
    #[error("resource fetch failed: {message}")]
    Network { message: String },
}

impl FetchError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }
}
