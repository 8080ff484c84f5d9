//! Per-agent memory streams with tiered storage for colloquy.
//!
//! The in-process list is the only tier required for correctness; the
//! vector cache and durable store are accelerators whose failure degrades
//! retrieval quality, never correctness.

pub mod error;
pub mod model;
pub mod store;
pub mod stream;
pub mod vector;

/// Memory error type.
pub use error::MemoryError;
/// Memory record model.
pub use model::MemoryRecord;
/// Durable store interface and default JSONL implementation.
pub use store::{DurableStore, JsonlDurableStore};
/// Per-agent memory stream.
pub use stream::MemoryStream;
/// Vector cache interface and in-memory implementation.
pub use vector::{
    DistanceMetric, InMemoryVectorCache, VectorCache, VectorEntry, VectorHit,
    embedding_from_bytes, embedding_to_bytes,
};
