//! Durable store interface and the default JSONL implementation.

use crate::error::MemoryError;
use crate::model::MemoryRecord;
use async_trait::async_trait;
use log::{debug, info};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Durable storage for memory records, namespaced per agent identity.
///
/// Failures are swallowed by the caller: the in-process list stays the
/// source of truth for the rest of the process lifetime.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Load all previously persisted records for an agent.
    async fn load(&self, agent: &str) -> Result<Vec<MemoryRecord>, MemoryError>;

    /// Append one record to the agent's persisted history.
    async fn append(&self, agent: &str, record: &MemoryRecord) -> Result<(), MemoryError>;
}

/// File-backed durable store keeping one JSONL file per agent.
#[derive(Debug, Clone)]
pub struct JsonlDurableStore {
    /// Root directory for agent files.
    root: PathBuf,
}

impl JsonlDurableStore {
    /// Create a new store under the given root directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        info!("initialized durable memory store (root={})", root.display());
        Ok(Self { root })
    }

    /// Path to an agent's JSONL file.
    fn agent_path(&self, agent: &str) -> PathBuf {
        self.root.join(format!("{agent}.jsonl"))
    }
}

#[async_trait]
impl DurableStore for JsonlDurableStore {
    /// Load records, tolerating blank lines.
    async fn load(&self, agent: &str) -> Result<Vec<MemoryRecord>, MemoryError> {
        let path = self.agent_path(agent);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = OpenOptions::new().read(true).open(path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: MemoryRecord = serde_json::from_str(&line)?;
            records.push(record);
        }
        debug!("loaded {} records (agent={agent})", records.len());
        Ok(records)
    }

    /// Append a record as one JSON line.
    async fn append(&self, agent: &str, record: &MemoryRecord) -> Result<(), MemoryError> {
        let path = self.agent_path(agent);
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let line = serde_json::to_string(record)?;
        writeln!(file, "{line}")?;
        debug!(
            "persisted memory record (agent={agent}, content_len={})",
            record.description.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{DurableStore, JsonlDurableStore};
    use crate::error::MemoryError;
    use crate::model::MemoryRecord;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::tempdir;

    #[tokio::test]
    async fn append_then_load_round_trips() {
        let temp = tempdir().expect("tempdir");
        let store = JsonlDurableStore::new(temp.path()).expect("store");

        let now = Utc::now();
        let first = MemoryRecord::new("read paper A", now, 4.0, vec![0.1, 0.2]);
        let second = MemoryRecord::new("read paper B", now, 7.0, Vec::new());

        store.append("dr_analysis", &first).await.expect("append");
        store.append("dr_analysis", &second).await.expect("append");

        let loaded = store.load("dr_analysis").await.expect("load");
        assert_eq!(loaded, vec![first, second]);
    }

    #[tokio::test]
    async fn load_ignores_blank_lines_and_missing_agents() {
        let temp = tempdir().expect("tempdir");
        let store = JsonlDurableStore::new(temp.path()).expect("store");

        let record = MemoryRecord::new("observation", Utc::now(), 5.0, Vec::new());
        store.append("dr_vision", &record).await.expect("append");
        {
            let path = temp.path().join("dr_vision.jsonl");
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(path)
                .expect("open");
            writeln!(file).expect("write");
        }

        let loaded = store.load("dr_vision").await.expect("load");
        assert_eq!(loaded.len(), 1);

        let empty = store.load("nobody").await.expect("load");
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn append_failure_surfaces_as_io() {
        let temp = tempdir().expect("tempdir");
        let store = JsonlDurableStore::new(temp.path()).expect("store");
        // A directory squatting on the agent's file path makes the append
        // open fail at the filesystem level.
        std::fs::create_dir(temp.path().join("dr_blocked.jsonl")).expect("dir");

        let record = MemoryRecord::new("observation", Utc::now(), 5.0, Vec::new());
        let err = store.append("dr_blocked", &record).await.unwrap_err();
        assert!(matches!(err, MemoryError::Io(_)));
    }
}
