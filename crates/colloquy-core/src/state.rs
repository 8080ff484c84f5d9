//! Durable shared state for cross-agent artifacts.
//!
//! The bibliography, knowledge graph, discussion log, and checkpoint all
//! live behind [`StateStore`]. Updates are read-modify-write under a
//! store-wide lock so concurrent agents never interleave partial edits.

use async_trait::async_trait;
use log::warn;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::CoreError;

/// Closure applied atomically to one state document.
pub type StateUpdate = Box<dyn FnOnce(Value) -> Value + Send>;

/// Keyed JSON documents with atomic read-modify-write.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read a document. Missing documents read as `Value::Null`.
    async fn read(&self, key: &str) -> Result<Value, CoreError>;

    /// Atomically transform a document.
    async fn update(&self, key: &str, apply: StateUpdate) -> Result<(), CoreError>;
}

/// One pretty-printed JSON file per key under a root directory.
pub struct JsonFileStateStore {
    root: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock: Mutex::new(()),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    fn read_value(&self, key: &str) -> Value {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(value) => value,
                Err(err) => {
                    warn!("state file {} is corrupt, treating as empty: {err}", path.display());
                    Value::Null
                }
            },
            Err(_) => Value::Null,
        }
    }

    fn write_value(&self, key: &str, value: &Value) -> Result<(), CoreError> {
        std::fs::create_dir_all(&self.root)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(value)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for JsonFileStateStore {
    async fn read(&self, key: &str) -> Result<Value, CoreError> {
        let _guard = self.lock.lock();
        Ok(self.read_value(key))
    }

    async fn update(&self, key: &str, apply: StateUpdate) -> Result<(), CoreError> {
        let _guard = self.lock.lock();
        let current = self.read_value(key);
        let next = apply(current);
        self.write_value(key, &next)
    }
}

/// In-process store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStateStore {
    documents: Mutex<HashMap<String, Value>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn read(&self, key: &str) -> Result<Value, CoreError> {
        Ok(self
            .documents
            .lock()
            .get(key)
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn update(&self, key: &str, apply: StateUpdate) -> Result<(), CoreError> {
        let mut documents = self.documents.lock();
        let current = documents.get(key).cloned().unwrap_or(Value::Null);
        documents.insert(key.to_string(), apply(current));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{JsonFileStateStore, MemoryStateStore, StateStore};
    use crate::error::CoreError;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    #[tokio::test]
    async fn missing_document_reads_as_null() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStateStore::new(dir.path());
        assert_eq!(store.read("bibliography").await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn update_round_trips_through_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStateStore::new(dir.path());
        store
            .update(
                "bibliography",
                Box::new(|current| {
                    assert_eq!(current, Value::Null);
                    json!([{"number": 1}])
                }),
            )
            .await
            .unwrap();
        assert_eq!(store.read("bibliography").await.unwrap(), json!([{"number": 1}]));

        // A fresh store over the same directory sees the same document.
        let reopened = JsonFileStateStore::new(dir.path());
        assert_eq!(
            reopened.read("bibliography").await.unwrap(),
            json!([{"number": 1}])
        );
    }

    #[tokio::test]
    async fn corrupt_file_reads_as_null() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("graph.json"), "{not json").unwrap();
        let store = JsonFileStateStore::new(dir.path());
        assert_eq!(store.read("graph").await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn write_failure_surfaces_as_io() {
        let dir = tempfile::tempdir().unwrap();
        // A plain file where the state root should be makes directory
        // creation fail.
        let file_root = dir.path().join("not_a_dir");
        std::fs::write(&file_root, "x").unwrap();
        let store = JsonFileStateStore::new(&file_root);

        let err = store
            .update("log", Box::new(|_| json!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Io(_)));
    }

    #[tokio::test]
    async fn memory_store_applies_updates_in_order() {
        let store = MemoryStateStore::new();
        for i in 0..3 {
            store
                .update(
                    "log",
                    Box::new(move |current| {
                        let mut items = match current {
                            Value::Array(items) => items,
                            _ => Vec::new(),
                        };
                        items.push(json!(i));
                        Value::Array(items)
                    }),
                )
                .await
                .unwrap();
        }
        assert_eq!(store.read("log").await.unwrap(), json!([0, 1, 2]));
    }
}
