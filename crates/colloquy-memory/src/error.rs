//! Error types for memory operations.

/// Errors returned by memory stores and streams.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Vector cache failure.
    #[error("vector error: {0}")]
    Vector(String),
}
