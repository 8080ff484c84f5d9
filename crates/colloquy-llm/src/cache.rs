//! Deterministic-response caching for temperature-zero calls.

use crate::client::GenerativeClient;
use crate::error::LlmError;
use async_trait::async_trait;
use log::debug;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

/// Process-wide cache of deterministic model responses.
///
/// Keys are a digest of (system instruction, prompt, model identifier).
/// Non-zero-temperature calls are intentionally non-deterministic and must
/// never be cached.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: Mutex<HashMap<String, String>>,
}

impl ResponseCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache key for one deterministic call.
    pub fn key(system: &str, prompt: &str, model: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(system.as_bytes());
        hasher.update(prompt.as_bytes());
        hasher.update(model.as_bytes());
        format!("llm_cache:{:x}", hasher.finalize())
    }

    /// Look up a cached response.
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    /// Store a response.
    pub fn insert(&self, key: String, value: String) {
        self.entries.lock().insert(key, value);
    }

    /// Number of cached responses.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Wraps a client with the deterministic-response cache.
pub struct CachingClient {
    inner: Arc<dyn GenerativeClient>,
    model: String,
    cache: Arc<ResponseCache>,
}

impl CachingClient {
    /// Wrap `inner`, tagging cache keys with the given model identifier.
    pub fn new(inner: Arc<dyn GenerativeClient>, model: impl Into<String>) -> Self {
        Self {
            inner,
            model: model.into(),
            cache: Arc::new(ResponseCache::new()),
        }
    }

    /// Wrap `inner` sharing an existing cache across clients.
    pub fn with_cache(
        inner: Arc<dyn GenerativeClient>,
        model: impl Into<String>,
        cache: Arc<ResponseCache>,
    ) -> Self {
        Self {
            inner,
            model: model.into(),
            cache,
        }
    }
}

#[async_trait]
impl GenerativeClient for CachingClient {
    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<String, LlmError> {
        if temperature != 0.0 {
            return self.inner.generate(system, prompt, temperature).await;
        }

        let key = ResponseCache::key(system, prompt, &self.model);
        if let Some(cached) = self.cache.get(&key) {
            debug!("deterministic cache hit (model={})", self.model);
            return Ok(cached);
        }

        let response = self.inner.generate(system, prompt, temperature).await?;
        if !response.is_empty() {
            self.cache.insert(key, response.clone());
        }
        Ok(response)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.inner.embed(text).await
    }
}
