//! Memory record model used by streams and stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single unit of agent memory.
///
/// `importance` is assigned once at creation and never recomputed. An empty
/// `embedding` is the valid "unembedded" state used when a record is
/// reconstructed from a search hit that omits the vector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryRecord {
    /// Free-text description; the semantic unit of memory.
    pub description: String,
    /// Logical simulation timestamp, not wall clock.
    pub created_at: DateTime<Utc>,
    /// Importance rating in 1..=10, fixed at creation.
    pub importance: f32,
    /// Embedding vector; empty when unembedded.
    #[serde(default)]
    pub embedding: Vec<f32>,
    /// Advisory timestamp of the last retrieval that included this record.
    pub last_accessed: DateTime<Utc>,
}

impl MemoryRecord {
    /// Create a record with `last_accessed` equal to the creation time.
    pub fn new(
        description: impl Into<String>,
        created_at: DateTime<Utc>,
        importance: f32,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            description: description.into(),
            created_at,
            importance,
            embedding,
            last_accessed: created_at,
        }
    }
}
