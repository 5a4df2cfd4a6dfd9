// session-store-rs/src/error.rs
// Error type shared by the session and memory stores.

/// Store error type.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Session {0} not found")]
    SessionNotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
