//! Audit sinks: where finalized records land
//!
//! Sinks assign sequence numbers; callers never do. Per-execution
//! ordering relies on the orchestrator's single-writer invariant: no
//! two workers append for the same execution concurrently.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use triage_types::{AuditEvent, AuditRecord, ExecutionId};

/// Errors from audit sinks
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit write failed: {0}")]
    WriteFailure(String),

    #[error("audit io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("audit serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A durable, append-only destination for audit records
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Finalize and append an event. The sink assigns the next
    /// sequence number for the event's execution; the write must be
    /// durable before this returns.
    async fn append(&self, event: AuditEvent) -> Result<AuditRecord, AuditError>;

    /// All records for one execution, in sequence order
    async fn records_for(&self, execution_id: &ExecutionId) -> Result<Vec<AuditRecord>, AuditError>;
}

// ── Memory sink ──────────────────────────────────────────────────────

/// In-memory audit sink, used in tests and embedded setups
#[derive(Default)]
pub struct MemoryAuditSink {
    records: RwLock<Vec<AuditRecord>>,
    sequences: RwLock<HashMap<ExecutionId, u64>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records across every execution, in append order
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.read().clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, event: AuditEvent) -> Result<AuditRecord, AuditError> {
        let mut sequences = self.sequences.write();
        let sequence = sequences.entry(event.execution_id.clone()).or_insert(0);
        let record = AuditRecord::from_event(event, *sequence);
        *sequence += 1;

        self.records.write().push(record.clone());
        Ok(record)
    }

    async fn records_for(&self, execution_id: &ExecutionId) -> Result<Vec<AuditRecord>, AuditError> {
        Ok(self
            .records
            .read()
            .iter()
            .filter(|r| &r.execution_id == execution_id)
            .cloned()
            .collect())
    }
}

// ── File sink ────────────────────────────────────────────────────────

/// Append-only JSONL file sink.
///
/// One record per line. Sequence counters are rebuilt from the file on
/// open, so a restarted process continues each execution's sequence
/// where it left off.
pub struct FileAuditSink {
    path: PathBuf,
    sequences: Arc<RwLock<HashMap<ExecutionId, u64>>>,
}

impl FileAuditSink {
    pub async fn new(path: PathBuf) -> Result<Self, AuditError> {
        let sequences = if path.exists() {
            Self::load_sequences(&path).await?
        } else {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            HashMap::new()
        };

        Ok(Self {
            path,
            sequences: Arc::new(RwLock::new(sequences)),
        })
    }

    async fn load_sequences(path: &PathBuf) -> Result<HashMap<ExecutionId, u64>, AuditError> {
        let file = File::open(path).await?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let mut sequences: HashMap<ExecutionId, u64> = HashMap::new();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let record: AuditRecord = serde_json::from_str(&line)?;
            sequences.insert(record.execution_id, record.sequence + 1);
        }

        Ok(sequences)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Read the full log back, in append order
    pub async fn read_all(&self) -> Result<Vec<AuditRecord>, AuditError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path).await?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let mut records = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }

        Ok(records)
    }
}

#[async_trait]
impl AuditSink for FileAuditSink {
    async fn append(&self, event: AuditEvent) -> Result<AuditRecord, AuditError> {
        // Assign the sequence inside the lock, write outside it
        let (record, json) = {
            let mut sequences = self.sequences.write();
            let sequence = sequences.entry(event.execution_id.clone()).or_insert(0);
            let record = AuditRecord::from_event(event, *sequence);
            *sequence += 1;
            let json = serde_json::to_string(&record)?;
            (record, json)
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(json.as_bytes()).await?;
        file.write_all(b"\n").await?;
        // The append contract promises durability, not just a flushed
        // userspace buffer
        file.sync_all().await?;

        Ok(record)
    }

    async fn records_for(&self, execution_id: &ExecutionId) -> Result<Vec<AuditRecord>, AuditError> {
        Ok(self
            .read_all()
            .await?
            .into_iter()
            .filter(|r| &r.execution_id == execution_id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_types::State;

    fn event(execution: &str, from: State, to: State) -> AuditEvent {
        AuditEvent::new(ExecutionId::new(execution), from, to, "test")
    }

    #[tokio::test]
    async fn test_memory_sink_sequences_per_execution() {
        let sink = MemoryAuditSink::new();

        sink.append(event("a", State::ValidateInput, State::CheckConsent))
            .await
            .unwrap();
        sink.append(event("b", State::ValidateInput, State::CheckConsent))
            .await
            .unwrap();
        sink.append(event("a", State::CheckConsent, State::ExtractEntities))
            .await
            .unwrap();

        let for_a = sink.records_for(&ExecutionId::new("a")).await.unwrap();
        assert_eq!(for_a.len(), 2);
        assert_eq!(for_a[0].sequence, 0);
        assert_eq!(for_a[1].sequence, 1);

        let for_b = sink.records_for(&ExecutionId::new("b")).await.unwrap();
        assert_eq!(for_b.len(), 1);
        assert_eq!(for_b[0].sequence, 0);
    }

    #[tokio::test]
    async fn test_file_sink_appends_and_reads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let sink = FileAuditSink::new(path).await.unwrap();

        sink.append(event("a", State::ValidateInput, State::CheckConsent))
            .await
            .unwrap();
        sink.append(event("a", State::CheckConsent, State::ExtractEntities))
            .await
            .unwrap();

        let records = sink.read_all().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sequence, 0);
        assert_eq!(records[1].sequence, 1);
        assert_eq!(records[1].to_state, State::ExtractEntities);
    }

    #[tokio::test]
    async fn test_file_sink_resumes_sequences_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        {
            let sink = FileAuditSink::new(path.clone()).await.unwrap();
            sink.append(event("a", State::ValidateInput, State::CheckConsent))
                .await
                .unwrap();
            sink.append(event("a", State::CheckConsent, State::ExtractEntities))
                .await
                .unwrap();
        }

        // Reopen: the next sequence number continues from the file
        let sink = FileAuditSink::new(path).await.unwrap();
        let record = sink
            .append(event("a", State::ExtractEntities, State::AssessRisk))
            .await
            .unwrap();
        assert_eq!(record.sequence, 2);

        let for_a = sink.records_for(&ExecutionId::new("a")).await.unwrap();
        assert_eq!(for_a.len(), 3);
        for (i, record) in for_a.iter().enumerate() {
            assert_eq!(record.sequence, i as u64);
        }
    }

    #[tokio::test]
    async fn test_file_sink_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/audit.jsonl");
        let sink = FileAuditSink::new(path.clone()).await.unwrap();
        sink.append(event("a", State::ValidateInput, State::CheckConsent))
            .await
            .unwrap();
        assert!(path.exists());
    }
}
