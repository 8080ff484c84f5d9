//! Error types for generative and embedding calls.

use thiserror::Error;

/// Errors returned by generative clients.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Transport-level failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The API returned a non-success status.
    #[error("api error (status {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },
    /// The response arrived but carried no usable content.
    #[error("empty response from model")]
    EmptyResponse,
    /// The response body did not match the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),
}
