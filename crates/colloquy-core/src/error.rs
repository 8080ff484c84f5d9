//! Error types for the pipeline core.

use thiserror::Error;

/// Errors returned by core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Memory tier error.
    #[error("memory error: {0}")]
    Memory(#[from] colloquy_memory::MemoryError),
}
