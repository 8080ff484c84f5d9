use async_trait::async_trait;
use colloquy_memory::{DistanceMetric, MemoryError, VectorCache, VectorEntry, VectorHit};

/// Vector cache that fails every call, for degradation tests.
#[derive(Debug, Clone, Default)]
pub struct FailingVectorCache;

impl FailingVectorCache {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl VectorCache for FailingVectorCache {
    async fn ensure_index(
        &self,
        _name: &str,
        _dim: usize,
        _metric: DistanceMetric,
    ) -> Result<(), MemoryError> {
        Err(MemoryError::Vector("cache unavailable".to_string()))
    }

    async fn put(
        &self,
        _index: &str,
        _key: &str,
        _entry: &VectorEntry,
    ) -> Result<(), MemoryError> {
        Err(MemoryError::Vector("cache unavailable".to_string()))
    }

    async fn knn_search(
        &self,
        _index: &str,
        _query: &[f32],
        _k: usize,
    ) -> Result<Vec<VectorHit>, MemoryError> {
        Err(MemoryError::Vector("cache unavailable".to_string()))
    }
}
