//! Error types for the orchestrator

use crate::store::StateStoreError;
use triage_audit::AuditError;
use triage_types::{ExecutionId, TransitionError};

/// Errors surfaced by orchestrator operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("execution not found: {0}")]
    ExecutionNotFound(ExecutionId),

    #[error("execution {0} is held by another worker")]
    LeaseConflict(ExecutionId),

    #[error("invalid or already-consumed resume token")]
    InvalidToken,

    #[error("execution {0} is suspended awaiting an external decision")]
    Suspended(ExecutionId),

    #[error("execution {0} is not suspended")]
    NotSuspended(ExecutionId),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("audit recording failed: {0}")]
    Audit(#[from] AuditError),

    #[error("execution store failure: {0}")]
    Store(#[from] StateStoreError),
}
