//! Audit records: the append-only transition log
//!
//! One record per transition, successful or not. Records for a given
//! execution are totally ordered by a sequence number assigned by the
//! recorder, never by the caller. Records are never updated or
//! deleted; the compliance domain this engine grew out of requires
//! multi-year retention of the full trail.

use crate::execution::ExecutionId;
use crate::state::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A transition event, as produced by the orchestrator.
///
/// The recorder finalizes it into an [`AuditRecord`] by assigning the
/// next sequence number for the execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub execution_id: ExecutionId,
    pub from_state: State,
    pub to_state: State,
    pub decision_reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        execution_id: ExecutionId,
        from_state: State,
        to_state: State,
        decision_reason: impl Into<String>,
    ) -> Self {
        Self {
            execution_id,
            from_state,
            to_state,
            decision_reason: decision_reason.into(),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Whether this event records entry into a terminal state
    pub fn is_terminal(&self) -> bool {
        self.to_state.is_terminal()
    }
}

/// A finalized, sequenced audit record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Monotonically increasing per execution, assigned by the recorder
    pub sequence: u64,
    pub execution_id: ExecutionId,
    pub from_state: State,
    pub to_state: State,
    pub decision_reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    /// Finalize an event with its assigned sequence number
    pub fn from_event(event: AuditEvent, sequence: u64) -> Self {
        Self {
            sequence,
            execution_id: event.execution_id,
            from_state: event.from_state,
            to_state: event.to_state,
            decision_reason: event.decision_reason,
            error: event.error,
            timestamp: event.timestamp,
        }
    }
}
