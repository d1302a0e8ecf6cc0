//! External capabilities consumed by the orchestrator
//!
//! These are the seams to everything out of scope for the core: the
//! entity extraction model, the consent service, the persistence sink,
//! and the notification transport. All are treated as stateless and
//! safely callable from many concurrent executions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use triage_types::{Entity, ExecutionId, Payload, RiskAssessment, RiskLevel};

// ── Entity extraction ────────────────────────────────────────────────

/// Failure from the extraction capability. `transient` failures are
/// retried under the state's budget; the rest are fatal immediately.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ExtractionError {
    pub transient: bool,
    pub message: String,
}

impl ExtractionError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            transient: true,
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            transient: false,
            message: message.into(),
        }
    }
}

/// The opaque entity-detection capability
#[async_trait]
pub trait EntityExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<Vec<Entity>, ExtractionError>;
}

// ── Consent ──────────────────────────────────────────────────────────

/// The consent service could not answer; transient by definition
#[derive(Debug, Clone, thiserror::Error)]
#[error("consent service unavailable: {0}")]
pub struct ConsentUnavailable(pub String);

#[async_trait]
pub trait ConsentService: Send + Sync {
    /// Whether the subject granted consent for the given purpose
    async fn check_consent(
        &self,
        subject_id: &str,
        purpose: &str,
    ) -> Result<bool, ConsentUnavailable>;
}

// ── Persistence ──────────────────────────────────────────────────────

#[derive(Debug, Clone, thiserror::Error)]
#[error("store failure: {0}")]
pub struct StoreError(pub String);

/// Derived artifact generated alongside the de-identified record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub execution_id: ExecutionId,
    pub risk_level: RiskLevel,
    pub total_entities: usize,
    pub sensitive_count: usize,
    pub high_confidence_sensitive_count: usize,
    pub sensitive_types: BTreeSet<String>,
    pub generated_at: DateTime<Utc>,
}

impl Artifact {
    pub fn from_assessment(execution_id: ExecutionId, assessment: &RiskAssessment) -> Self {
        Self {
            execution_id,
            risk_level: assessment.risk_level,
            total_entities: assessment.total_entities,
            sensitive_count: assessment.sensitive_count,
            high_confidence_sensitive_count: assessment.high_confidence_sensitive_count,
            sensitive_types: assessment.sensitive_types.clone(),
            generated_at: Utc::now(),
        }
    }
}

/// Destination for processed and quarantined records
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Persist the de-identified record
    async fn store(
        &self,
        execution_id: &ExecutionId,
        masked_payload: &str,
        metadata: HashMap<String, String>,
    ) -> Result<(), StoreError>;

    /// Persist the derived artifact next to the record
    async fn store_artifact(
        &self,
        execution_id: &ExecutionId,
        artifact: Artifact,
    ) -> Result<(), StoreError>;

    /// Isolate an original payload pending investigation
    async fn quarantine(
        &self,
        execution_id: &ExecutionId,
        payload: &Payload,
        reason: &str,
    ) -> Result<(), StoreError>;
}

// ── Notification ─────────────────────────────────────────────────────

/// Events pushed to the notification transport
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Notification {
    /// An execution was quarantined; manual investigation required
    HighRiskAlert {
        execution_id: ExecutionId,
        reason: String,
        risk_level: Option<RiskLevel>,
        sensitive_count: usize,
        high_confidence_sensitive_count: usize,
        sensitive_types: BTreeSet<String>,
    },
    /// An execution completed processing
    RecordProcessed { execution_id: ExecutionId },
}

/// Fire-and-forget notification transport. Failures are the
/// implementation's problem to log; they are never fatal to an
/// execution.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: Notification);
}

// ── Bundle ───────────────────────────────────────────────────────────

/// The full set of external capabilities the orchestrator drives
#[derive(Clone)]
pub struct Capabilities {
    pub extractor: Arc<dyn EntityExtractor>,
    pub consent: Arc<dyn ConsentService>,
    pub persistence: Arc<dyn PersistenceSink>,
    pub notifier: Arc<dyn NotificationSink>,
}
