//! Executions: one in-flight or completed run of the workflow
//!
//! An `Execution` is mutated only by the orchestrator (single-writer
//! invariant) and is fully serializable so suspended executions can be
//! persisted durably before the worker stops scheduling them.

use crate::entity::Entity;
use crate::risk::RiskAssessment;
use crate::state::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ── Identifiers ──────────────────────────────────────────────────────

/// Unique, immutable identifier correlating all audit entries of a run
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExecutionId(pub String);

impl ExecutionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque credential permitting exactly one resumption of a suspended
/// execution
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResumeToken(pub String);

impl ResumeToken {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Display for ResumeToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Payload ──────────────────────────────────────────────────────────

/// The opaque input an execution exclusively owns for its lifetime
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// The data subject the payload concerns (consent lookups key on this)
    pub subject_id: String,
    /// Raw text content
    pub text: String,
    /// Caller-supplied metadata carried through to the persistence sink
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl Payload {
    pub fn new(subject_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            text: text.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

// ── Execution ────────────────────────────────────────────────────────

/// One run of the workflow for a single input payload
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Execution {
    /// Unique execution identifier
    pub id: ExecutionId,
    /// Current state
    pub state: State,
    /// The input payload, exclusively owned by this execution
    pub payload: Payload,
    /// Retry attempt counts per state; reset on entering a new state
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attempt_counts: HashMap<State, u32>,
    /// Extractor output, set once after `ExtractEntities`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<Entity>>,
    /// Risk assessor output, immutable once set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_assessment: Option<RiskAssessment>,
    /// Set only while suspended awaiting an external callback
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_token: Option<ResumeToken>,
    /// Human-readable reason for the last transition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_reason: Option<String>,
    /// When the execution was created
    pub created_at: DateTime<Utc>,
    /// When the execution was last updated
    pub updated_at: DateTime<Utc>,
    /// When the execution reached a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Execution {
    /// Create a new execution in `ValidateInput`
    pub fn new(payload: Payload) -> Self {
        let now = Utc::now();
        Self {
            id: ExecutionId::generate(),
            state: State::ValidateInput,
            payload,
            attempt_counts: HashMap::new(),
            entities: None,
            risk_assessment: None,
            resume_token: None,
            decision_reason: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Enter a new state, resetting that state's attempt count
    pub fn enter(&mut self, state: State, reason: impl Into<String>) {
        self.state = state;
        self.attempt_counts.insert(state, 0);
        self.decision_reason = Some(reason.into());
        self.updated_at = Utc::now();
        if state.is_terminal() {
            self.completed_at = Some(self.updated_at);
        }
    }

    /// Record one more attempt at the current state, returning the new count
    pub fn record_attempt(&mut self) -> u32 {
        let count = self.attempt_counts.entry(self.state).or_insert(0);
        *count += 1;
        self.updated_at = Utc::now();
        *count
    }

    /// Attempts made at the current state so far
    pub fn attempts(&self) -> u32 {
        self.attempt_counts.get(&self.state).copied().unwrap_or(0)
    }

    /// Suspend: attach a fresh resume token
    pub fn suspend(&mut self, token: ResumeToken) {
        self.resume_token = Some(token);
        self.updated_at = Utc::now();
    }

    /// Clear the resume token on resumption
    pub fn clear_token(&mut self) {
        self.resume_token = None;
        self.updated_at = Utc::now();
    }

    /// Record the risk assessment. Immutable once set: a second call
    /// leaves the original in place.
    pub fn set_risk_assessment(&mut self, assessment: RiskAssessment) {
        if self.risk_assessment.is_none() {
            self.risk_assessment = Some(assessment);
            self.updated_at = Utc::now();
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn is_suspended(&self) -> bool {
        self.state == State::ManualReview && self.resume_token.is_some()
    }
}
