//! OpenAI-compatible HTTP client for chat completions and embeddings.

use crate::client::GenerativeClient;
use crate::error::LlmError;
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const MAX_TOKENS: u32 = 8192;

/// Connection options for an OpenAI-compatible endpoint.
///
/// A custom `base_url` supports local servers that speak the same API.
#[derive(Debug, Clone)]
pub struct OpenAiOptions {
    /// Bearer token.
    pub api_key: String,
    /// API root, without a trailing slash.
    pub base_url: String,
    /// Chat model identifier.
    pub model: String,
    /// Embedding model identifier.
    pub embedding_model: String,
}

impl OpenAiOptions {
    /// Options for the hosted API with default model choices.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }

    /// Override the API root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the chat model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the embedding model.
    #[must_use]
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }
}

/// Generative client backed by an OpenAI-compatible HTTP API.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    options: OpenAiOptions,
    http: Client,
}

impl OpenAiClient {
    /// Create a client with a shared connection pool.
    pub fn new(options: OpenAiOptions) -> Self {
        Self {
            options,
            http: Client::new(),
        }
    }

    /// Model identifier used for chat calls.
    pub fn model(&self) -> &str {
        &self.options.model
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatRequestMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl GenerativeClient for OpenAiClient {
    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.options.base_url);
        debug!(
            "chat request (model={}, prompt_len={}, temperature={temperature})",
            self.options.model,
            prompt.len()
        );

        let body = ChatRequest {
            model: &self.options.model,
            messages: vec![
                ChatRequestMessage {
                    role: "system",
                    content: system,
                },
                ChatRequestMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature,
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.options.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|err| LlmError::Malformed(err.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(content)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let url = format!("{}/embeddings", self.options.base_url);
        // Newlines degrade embedding quality on these endpoints.
        let flattened = text.replace('\n', " ");

        let body = EmbeddingRequest {
            model: &self.options.embedding_model,
            input: vec![flattened],
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.options.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|err| LlmError::Malformed(err.to_string()))?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|data| data.embedding)
            .ok_or(LlmError::EmptyResponse)
    }
}
