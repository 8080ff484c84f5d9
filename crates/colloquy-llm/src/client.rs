//! Generative client interface.

use crate::error::LlmError;
use async_trait::async_trait;

/// Stateless request/response access to a text-generation capability and an
/// embedding provider.
///
/// Callers in the pipeline core never treat a failure here as fatal: they
/// map errors to the task's empty or neutral value.
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    /// Produce text for a prompt under a system instruction.
    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<String, LlmError>;

    /// Map text to a fixed-dimension vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;
}
