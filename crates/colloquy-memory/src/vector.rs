//! Vector cache interface and an in-memory reference implementation.

use crate::error::MemoryError;
use async_trait::async_trait;
use log::debug;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Distance metric used by a vector index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMetric {
    /// Cosine distance (1 - cosine similarity).
    Cosine,
    /// Euclidean distance.
    L2,
}

/// Entry written to a vector index.
///
/// The embedding travels as a fixed-width little-endian f32 blob; the cache
/// never needs to interpret record timestamps beyond echoing them back.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorEntry {
    /// Record description.
    pub description: String,
    /// Importance rating copied from the record.
    pub importance: f32,
    /// Creation time as epoch seconds.
    pub created_at: i64,
    /// Embedding as packed f32 bytes.
    pub embedding: Vec<u8>,
}

/// One ranked result from a KNN search. The embedding is omitted so large
/// vectors are not re-transmitted on every query.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    /// Record description.
    pub description: String,
    /// Importance rating stored with the entry.
    pub importance: f32,
    /// Creation time as epoch seconds.
    pub created_at: i64,
    /// Distance to the query vector; lower is closer.
    pub score: f32,
}

/// Vector-capable cache shared across agents but namespaced per index.
#[async_trait]
pub trait VectorCache: Send + Sync {
    /// Create the named index if it does not exist. Creating an index that
    /// already exists must succeed without altering stored data.
    async fn ensure_index(
        &self,
        name: &str,
        dim: usize,
        metric: DistanceMetric,
    ) -> Result<(), MemoryError>;

    /// Store an entry under a unique key.
    async fn put(&self, index: &str, key: &str, entry: &VectorEntry) -> Result<(), MemoryError>;

    /// K-nearest-neighbor search ordered by ascending distance.
    async fn knn_search(
        &self,
        index: &str,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<VectorHit>, MemoryError>;
}

/// Pack an embedding into little-endian f32 bytes.
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Unpack little-endian f32 bytes into an embedding.
pub fn embedding_from_bytes(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[derive(Debug)]
struct Index {
    metric: DistanceMetric,
    entries: HashMap<String, VectorEntry>,
}

/// In-memory vector cache used for local runs and tests.
#[derive(Debug, Default)]
pub struct InMemoryVectorCache {
    indexes: Mutex<HashMap<String, Index>>,
}

impl InMemoryVectorCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries stored under an index.
    pub fn len(&self, index: &str) -> usize {
        self.indexes
            .lock()
            .get(index)
            .map(|idx| idx.entries.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl VectorCache for InMemoryVectorCache {
    async fn ensure_index(
        &self,
        name: &str,
        _dim: usize,
        metric: DistanceMetric,
    ) -> Result<(), MemoryError> {
        let mut indexes = self.indexes.lock();
        if indexes.contains_key(name) {
            debug!("vector index already exists (index={name})");
            return Ok(());
        }
        indexes.insert(
            name.to_string(),
            Index {
                metric,
                entries: HashMap::new(),
            },
        );
        debug!("created vector index (index={name})");
        Ok(())
    }

    async fn put(&self, index: &str, key: &str, entry: &VectorEntry) -> Result<(), MemoryError> {
        let mut indexes = self.indexes.lock();
        let idx = indexes
            .get_mut(index)
            .ok_or_else(|| MemoryError::Vector(format!("unknown index: {index}")))?;
        idx.entries.insert(key.to_string(), entry.clone());
        Ok(())
    }

    async fn knn_search(
        &self,
        index: &str,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<VectorHit>, MemoryError> {
        let indexes = self.indexes.lock();
        let idx = indexes
            .get(index)
            .ok_or_else(|| MemoryError::Vector(format!("unknown index: {index}")))?;

        let mut hits = Vec::new();
        for entry in idx.entries.values() {
            let stored = embedding_from_bytes(&entry.embedding);
            if stored.is_empty() {
                continue;
            }
            let score = match idx.metric {
                DistanceMetric::Cosine => cosine_distance(query, &stored),
                DistanceMetric::L2 => euclidean_distance(query, &stored),
            };
            hits.push(VectorHit {
                description: entry.description.clone(),
                importance: entry.importance,
                created_at: entry.created_at,
                score,
            });
        }
        hits.sort_by(|a, b| a.score.total_cmp(&b.score));
        hits.truncate(k);
        Ok(hits)
    }
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::{
        DistanceMetric, InMemoryVectorCache, VectorCache, VectorEntry, embedding_from_bytes,
        embedding_to_bytes,
    };
    use pretty_assertions::assert_eq;

    fn entry(description: &str, embedding: &[f32]) -> VectorEntry {
        VectorEntry {
            description: description.to_string(),
            importance: 5.0,
            created_at: 0,
            embedding: embedding_to_bytes(embedding),
        }
    }

    #[test]
    fn embedding_bytes_round_trip() {
        let embedding = vec![0.5, -1.25, 3.0];
        let bytes = embedding_to_bytes(&embedding);
        assert_eq!(bytes.len(), 12);
        assert_eq!(embedding_from_bytes(&bytes), embedding);
    }

    #[tokio::test]
    async fn ensure_index_is_idempotent() {
        let cache = InMemoryVectorCache::new();
        cache
            .ensure_index("idx:memory:a", 3, DistanceMetric::Cosine)
            .await
            .expect("create");
        cache
            .put("idx:memory:a", "memory:a:1", &entry("kept", &[1.0, 0.0, 0.0]))
            .await
            .expect("put");

        cache
            .ensure_index("idx:memory:a", 3, DistanceMetric::Cosine)
            .await
            .expect("second create");
        assert_eq!(cache.len("idx:memory:a"), 1);
    }

    #[tokio::test]
    async fn knn_orders_by_ascending_distance() {
        let cache = InMemoryVectorCache::new();
        cache
            .ensure_index("idx", 2, DistanceMetric::Cosine)
            .await
            .expect("create");
        cache
            .put("idx", "k1", &entry("orthogonal", &[0.0, 1.0]))
            .await
            .expect("put");
        cache
            .put("idx", "k2", &entry("aligned", &[1.0, 0.0]))
            .await
            .expect("put");

        let hits = cache.knn_search("idx", &[1.0, 0.0], 2).await.expect("knn");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].description, "aligned");
        assert_eq!(hits[1].description, "orthogonal");
        assert!(hits[0].score < hits[1].score);
    }

    #[tokio::test]
    async fn knn_on_unknown_index_errors() {
        let cache = InMemoryVectorCache::new();
        let result = cache.knn_search("missing", &[1.0], 1).await;
        assert!(result.is_err());
    }
}
