//! Generative model and embedding access for colloquy.

pub mod cache;
pub mod client;
pub mod error;
pub mod openai;

/// Deterministic-response cache and caching wrapper.
pub use cache::{CachingClient, ResponseCache};
/// Generative client interface.
pub use client::GenerativeClient;
/// LLM error type.
pub use error::LlmError;
/// OpenAI-compatible HTTP client.
pub use openai::{OpenAiClient, OpenAiOptions};
