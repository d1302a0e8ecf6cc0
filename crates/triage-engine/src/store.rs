//! Durable execution state
//!
//! Every transition is persisted before the worker proceeds, so a
//! restarted process can pick up where it left off. The file-backed
//! store keeps one JSON document per execution; the in-memory store
//! backs tests and embedded use.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use triage_types::{Execution, ExecutionId};

#[derive(Debug, thiserror::Error)]
pub enum StateStoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Persistence for execution state snapshots
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Persist the current snapshot, replacing any previous one
    async fn save(&self, execution: &Execution) -> Result<(), StateStoreError>;

    /// Load the latest snapshot, if the execution exists
    async fn load(&self, id: &ExecutionId) -> Result<Option<Execution>, StateStoreError>;

    /// All execution ids the store knows about
    async fn list_ids(&self) -> Result<Vec<ExecutionId>, StateStoreError>;
}

// ── In-memory store ──────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryExecutionStore {
    executions: RwLock<HashMap<ExecutionId, Execution>>,
}

impl MemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionStore for MemoryExecutionStore {
    async fn save(&self, execution: &Execution) -> Result<(), StateStoreError> {
        self.executions
            .write()
            .insert(execution.id.clone(), execution.clone());
        Ok(())
    }

    async fn load(&self, id: &ExecutionId) -> Result<Option<Execution>, StateStoreError> {
        Ok(self.executions.read().get(id).cloned())
    }

    async fn list_ids(&self) -> Result<Vec<ExecutionId>, StateStoreError> {
        Ok(self.executions.read().keys().cloned().collect())
    }
}

// ── File-backed store ────────────────────────────────────────────────

/// One `<id>.json` per execution under a base directory. Writes go
/// through a temp file and rename so a crash mid-write never leaves a
/// truncated snapshot.
pub struct FileExecutionStore {
    dir: PathBuf,
}

impl FileExecutionStore {
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StateStoreError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn path_for(&self, id: &ExecutionId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

#[async_trait]
impl ExecutionStore for FileExecutionStore {
    async fn save(&self, execution: &Execution) -> Result<(), StateStoreError> {
        let bytes = serde_json::to_vec_pretty(execution)?;
        let path = self.path_for(&execution.id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn load(&self, id: &ExecutionId) -> Result<Option<Execution>, StateStoreError> {
        let path = self.path_for(id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn list_ids(&self) -> Result<Vec<ExecutionId>, StateStoreError> {
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(stem) = name.strip_suffix(".json") {
                ids.push(ExecutionId::new(stem));
            }
        }
        Ok(ids)
    }
}
