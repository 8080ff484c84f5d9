//! Per-agent memory stream reconciling three storage tiers.

use crate::error::MemoryError;
use crate::model::MemoryRecord;
use crate::store::DurableStore;
use crate::vector::{DistanceMetric, VectorCache, VectorEntry, embedding_to_bytes};
use chrono::{DateTime, Utc};
use colloquy_llm::GenerativeClient;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

const RATING_SYSTEM: &str = "You rate the importance of research memories.";

/// Append-only memory owned by one agent.
///
/// The in-process list is authoritative for recency and importance queries;
/// the vector cache enables semantic relevance and the durable store
/// survives restarts. Both are best-effort.
pub struct MemoryStream {
    agent: String,
    index_name: String,
    key_prefix: String,
    vector_dim: usize,
    llm: Arc<dyn GenerativeClient>,
    vector: Option<Arc<dyn VectorCache>>,
    durable: Option<Arc<dyn DurableStore>>,
    records: Mutex<Vec<MemoryRecord>>,
}

impl MemoryStream {
    /// Bind a stream to one agent identity and load its persisted history.
    ///
    /// Index creation is idempotent and never fails startup: a cache that
    /// errors here only degrades later retrievals.
    pub async fn new(
        agent: &str,
        vector_dim: usize,
        llm: Arc<dyn GenerativeClient>,
        vector: Option<Arc<dyn VectorCache>>,
        durable: Option<Arc<dyn DurableStore>>,
    ) -> Self {
        let slug = agent.replace(' ', "_");
        let index_name = format!("idx:memory:{slug}");
        let key_prefix = format!("memory:{slug}:");

        let mut records = Vec::new();
        if let Some(store) = &durable {
            match store.load(&slug).await {
                Ok(loaded) => {
                    info!("[{slug}] loaded {} memories from durable store", loaded.len());
                    records = loaded;
                }
                Err(err) => warn!("[{slug}] durable load failed: {err}"),
            }
        }

        if let Some(cache) = &vector {
            if let Err(err) = cache
                .ensure_index(&index_name, vector_dim, DistanceMetric::Cosine)
                .await
            {
                warn!("[{slug}] vector index creation failed: {err}");
            }
        }

        Self {
            agent: slug,
            index_name,
            key_prefix,
            vector_dim,
            llm,
            vector,
            durable,
            records: Mutex::new(records),
        }
    }

    /// Sanitized agent identity this stream is bound to.
    pub fn agent(&self) -> &str {
        &self.agent
    }

    /// Number of records in the in-process list.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether the in-process list is empty.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Store a new memory.
    ///
    /// Importance rating and embedding happen before the list lock is taken;
    /// write-throughs to the vector cache and durable store are best-effort
    /// and unordered relative to each other.
    pub async fn add_memory(&self, description: &str, time: DateTime<Utc>) {
        let importance = self.rate_importance(description).await;
        let embedding = match self.llm.embed(description).await {
            Ok(vector) => vector,
            Err(err) => {
                warn!("[{}] embedding failed: {err}", self.agent);
                Vec::new()
            }
        };

        let record = MemoryRecord::new(description, time, importance, embedding);
        self.records.lock().push(record.clone());

        if let Some(cache) = &self.vector {
            let key = format!("{}{}", self.key_prefix, Uuid::new_v4());
            let entry = VectorEntry {
                description: record.description.clone(),
                importance: record.importance,
                created_at: record.created_at.timestamp(),
                embedding: embedding_to_bytes(&record.embedding),
            };
            if let Err(err) = cache.put(&self.index_name, &key, &entry).await {
                warn!("[{}] vector write-through failed: {err}", self.agent);
            }
        }

        if let Some(store) = &self.durable {
            if let Err(err) = store.append(&self.agent, &record).await {
                warn!("[{}] durable write-through failed: {err}", self.agent);
            }
        }
    }

    /// Semantic retrieval ordered by ascending vector distance.
    ///
    /// Any failure along the vector path degrades to `get_recent`; callers
    /// must tolerate recency-ordered results instead of relevance-ordered
    /// ones.
    pub async fn retrieve(
        &self,
        query: &str,
        time: DateTime<Utc>,
        top_k: usize,
    ) -> Vec<MemoryRecord> {
        let Some(cache) = &self.vector else {
            return self.get_recent(top_k);
        };

        let query_vec = match self.llm.embed(query).await {
            Ok(vector) if !vector.is_empty() => vector,
            Ok(_) => {
                warn!("[{}] empty query embedding, falling back", self.agent);
                return self.get_recent(top_k);
            }
            Err(err) => {
                warn!("[{}] query embedding failed: {err}", self.agent);
                return self.get_recent(top_k);
            }
        };

        match cache.knn_search(&self.index_name, &query_vec, top_k).await {
            Ok(hits) => {
                debug!("[{}] semantic retrieval returned {}", self.agent, hits.len());
                hits.into_iter()
                    .map(|hit| MemoryRecord {
                        description: hit.description,
                        created_at: DateTime::<Utc>::from_timestamp(hit.created_at, 0)
                            .unwrap_or_default(),
                        importance: hit.importance,
                        // Not re-transmitted by the cache.
                        embedding: Vec::new(),
                        last_accessed: time,
                    })
                    .collect()
            }
            Err(err) => {
                warn!("[{}] vector search failed: {err}", self.agent);
                self.get_recent(top_k)
            }
        }
    }

    /// Top records by descending importance; ties keep insertion order.
    pub fn retrieve_important(&self, top_k: usize) -> Vec<MemoryRecord> {
        let mut records = self.records.lock().clone();
        records.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        records.truncate(top_k);
        records
    }

    /// The most recently added records, newest first.
    pub fn get_recent(&self, n: usize) -> Vec<MemoryRecord> {
        let records = self.records.lock();
        let mut indexed: Vec<(usize, MemoryRecord)> =
            records.iter().cloned().enumerate().collect();
        indexed.sort_by(|a, b| {
            b.1.created_at
                .cmp(&a.1.created_at)
                .then_with(|| b.0.cmp(&a.0))
        });
        indexed.into_iter().take(n).map(|(_, record)| record).collect()
    }

    /// Ask the model for a bare 1-10 rating; default 5.0 on any failure.
    async fn rate_importance(&self, description: &str) -> f32 {
        let prompt = format!(
            "Rate the importance of this memory on a scale of 1 to 10: \
             {description}. Return the number only."
        );
        match self.llm.generate(RATING_SYSTEM, &prompt, 0.0).await {
            Ok(response) => parse_importance(&response),
            Err(err) => {
                warn!("[{}] importance rating failed: {err}", self.agent);
                5.0
            }
        }
    }

    /// Width expected for query and record embeddings.
    pub fn vector_dim(&self) -> usize {
        self.vector_dim
    }
}

/// Parse a bare numeric rating, defaulting to 5.0.
fn parse_importance(response: &str) -> f32 {
    response
        .trim()
        .trim_end_matches('.')
        .parse::<f32>()
        .ok()
        .filter(|value| value.is_finite())
        .unwrap_or(5.0)
}

#[cfg(test)]
mod tests {
    use super::{MemoryStream, parse_importance};
    use crate::error::MemoryError;
    use crate::store::{DurableStore, JsonlDurableStore};
    use crate::vector::{DistanceMetric, InMemoryVectorCache, VectorCache, VectorEntry, VectorHit};
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use colloquy_llm::{GenerativeClient, LlmError};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tempfile::tempdir;

    /// Pops scripted generate responses; embeds every text to a fixed vector.
    struct ScriptedClient {
        responses: Mutex<Vec<String>>,
        embedding: Vec<f32>,
    }

    impl ScriptedClient {
        fn new(responses: &[&str], embedding: Vec<f32>) -> Self {
            let mut responses: Vec<String> =
                responses.iter().map(|s| s.to_string()).collect();
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                embedding,
            }
        }
    }

    #[async_trait]
    impl GenerativeClient for ScriptedClient {
        async fn generate(
            &self,
            _system: &str,
            _prompt: &str,
            _temperature: f32,
        ) -> Result<String, LlmError> {
            Ok(self.responses.lock().pop().unwrap_or_default())
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, LlmError> {
            Ok(self.embedding.clone())
        }
    }

    struct FailingVectorCache;

    #[async_trait]
    impl VectorCache for FailingVectorCache {
        async fn ensure_index(
            &self,
            _name: &str,
            _dim: usize,
            _metric: DistanceMetric,
        ) -> Result<(), MemoryError> {
            Err(MemoryError::Vector("cache down".to_string()))
        }

        async fn put(
            &self,
            _index: &str,
            _key: &str,
            _entry: &VectorEntry,
        ) -> Result<(), MemoryError> {
            Err(MemoryError::Vector("cache down".to_string()))
        }

        async fn knn_search(
            &self,
            _index: &str,
            _query: &[f32],
            _k: usize,
        ) -> Result<Vec<VectorHit>, MemoryError> {
            Err(MemoryError::Vector("cache down".to_string()))
        }
    }

    #[test]
    fn importance_parsing_defaults_on_noise() {
        assert_eq!(parse_importance("7"), 7.0);
        assert_eq!(parse_importance(" 8.5 "), 8.5);
        assert_eq!(parse_importance("9."), 9.0);
        assert_eq!(parse_importance("very important"), 5.0);
        assert_eq!(parse_importance(""), 5.0);
    }

    #[tokio::test]
    async fn get_recent_returns_newest_first() {
        let llm = Arc::new(ScriptedClient::new(&["5", "5", "5"], vec![1.0, 0.0]));
        let stream = MemoryStream::new("Dr. Analysis", 2, llm, None, None).await;

        let base = Utc::now();
        stream.add_memory("first", base).await;
        stream.add_memory("second", base + Duration::hours(1)).await;
        stream.add_memory("third", base + Duration::hours(2)).await;

        let recent = stream.get_recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].description, "third");
        assert_eq!(recent[1].description, "second");
    }

    #[tokio::test]
    async fn retrieve_important_orders_by_rating() {
        let llm = Arc::new(ScriptedClient::new(&["2", "8", "5"], vec![1.0, 0.0]));
        let stream = MemoryStream::new("Dr. Analysis", 2, llm, None, None).await;

        let base = Utc::now();
        stream.add_memory("low", base).await;
        stream.add_memory("high", base + Duration::hours(1)).await;
        stream.add_memory("mid", base + Duration::hours(2)).await;

        let top = stream.retrieve_important(1);
        assert_eq!(top[0].description, "high");
        assert_eq!(top[0].importance, 8.0);

        let all = stream.retrieve_important(3);
        assert_eq!(
            all.iter().map(|m| m.description.as_str()).collect::<Vec<_>>(),
            vec!["high", "mid", "low"]
        );

        // Recency ignores importance entirely.
        let recent = stream.get_recent(1);
        assert_eq!(recent[0].description, "mid");
    }

    #[tokio::test]
    async fn retrieve_degrades_to_recency_when_cache_fails() {
        let llm = Arc::new(ScriptedClient::new(&["5", "5"], vec![1.0, 0.0]));
        let cache: Arc<dyn VectorCache> = Arc::new(FailingVectorCache);
        let stream = MemoryStream::new("Dr. Vision", 2, llm, Some(cache), None).await;

        let base = Utc::now();
        stream.add_memory("older", base).await;
        stream.add_memory("newer", base + Duration::hours(1)).await;

        let retrieved = stream.retrieve("anything", base + Duration::hours(2), 2).await;
        let recent = stream.get_recent(2);
        assert_eq!(retrieved, recent);
        assert_eq!(retrieved[0].description, "newer");
    }

    #[tokio::test]
    async fn retrieve_reconstructs_hits_without_embeddings() {
        let llm = Arc::new(ScriptedClient::new(&["6"], vec![1.0, 0.0]));
        let cache = Arc::new(InMemoryVectorCache::new());
        let stream =
            MemoryStream::new("Dr. Vision", 2, llm, Some(cache.clone()), None).await;

        let time = Utc::now();
        stream.add_memory("stored observation", time).await;
        assert_eq!(cache.len("idx:memory:Dr._Vision"), 1);

        let later = time + Duration::hours(1);
        let hits = stream.retrieve("observation", later, 3).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].description, "stored observation");
        assert_eq!(hits[0].importance, 6.0);
        assert!(hits[0].embedding.is_empty());
        assert_eq!(hits[0].last_accessed, later);
    }

    #[tokio::test]
    async fn startup_reloads_durable_history() {
        let temp = tempdir().expect("tempdir");
        let store: Arc<dyn DurableStore> =
            Arc::new(JsonlDurableStore::new(temp.path()).expect("store"));

        {
            let llm = Arc::new(ScriptedClient::new(&["3"], vec![1.0, 0.0]));
            let stream =
                MemoryStream::new("Dr. Analysis", 2, llm, None, Some(store.clone())).await;
            stream.add_memory("persisted", Utc::now()).await;
        }

        let llm = Arc::new(ScriptedClient::new(&[], vec![1.0, 0.0]));
        let reloaded = MemoryStream::new("Dr. Analysis", 2, llm, None, Some(store)).await;
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.get_recent(1)[0].description, "persisted");
        assert_eq!(reloaded.get_recent(1)[0].importance, 3.0);
    }
}
