use async_trait::async_trait;
use colloquy_llm::{GenerativeClient, LlmError};
use parking_lot::Mutex;
use std::sync::Arc;

/// Returns the same response for every generate call.
#[derive(Debug, Clone)]
pub struct FixedClient {
    response: String,
    embedding: Vec<f32>,
}

impl FixedClient {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            embedding: vec![0.0, 0.0],
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }
}

#[async_trait]
impl GenerativeClient for FixedClient {
    async fn generate(
        &self,
        _system: &str,
        _prompt: &str,
        _temperature: f32,
    ) -> Result<String, LlmError> {
        Ok(self.response.clone())
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, LlmError> {
        Ok(self.embedding.clone())
    }
}

/// One recorded generate call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
}

/// Pops scripted responses in order and records every generate call.
///
/// An exhausted script yields empty responses, which callers treat as
/// generation-unavailable.
#[derive(Clone)]
pub struct ScriptedClient {
    responses: Arc<Mutex<Vec<String>>>,
    pub calls: Arc<Mutex<Vec<RecordedCall>>>,
    embedding: Vec<f32>,
}

impl ScriptedClient {
    pub fn new<S: Into<String>>(responses: impl IntoIterator<Item = S>) -> Self {
        let mut responses: Vec<String> = responses.into_iter().map(Into::into).collect();
        responses.reverse();
        Self {
            responses: Arc::new(Mutex::new(responses)),
            calls: Arc::new(Mutex::new(Vec::new())),
            embedding: vec![1.0, 0.0],
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Prompts of all recorded calls, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.calls.lock().iter().map(|call| call.prompt.clone()).collect()
    }
}

#[async_trait]
impl GenerativeClient for ScriptedClient {
    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<String, LlmError> {
        self.calls.lock().push(RecordedCall {
            system: system.to_string(),
            prompt: prompt.to_string(),
            temperature,
        });
        Ok(self.responses.lock().pop().unwrap_or_default())
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, LlmError> {
        Ok(self.embedding.clone())
    }
}

/// Fails every call.
#[derive(Debug, Clone, Default)]
pub struct FailingClient;

impl FailingClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl GenerativeClient for FailingClient {
    async fn generate(
        &self,
        _system: &str,
        _prompt: &str,
        _temperature: f32,
    ) -> Result<String, LlmError> {
        Err(LlmError::EmptyResponse)
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, LlmError> {
        Err(LlmError::EmptyResponse)
    }
}
