//! Review gateway: the seam between suspended executions and human
//! reviewers
//!
//! A suspended execution is represented by its resume token. The token
//! is single-use: `take` removes the pending entry atomically, so a
//! second caller holding the same token gets [`EngineError::InvalidToken`]
//! and can change nothing.

use crate::errors::EngineError;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use triage_types::{Execution, ExecutionId, ResumeToken, RiskLevel};

/// A reviewer's verdict on a suspended execution
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

/// What a reviewer sees. Built from the masked payload only; the raw
/// payload never crosses this boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReviewSummary {
    pub execution_id: ExecutionId,
    pub risk_level: RiskLevel,
    pub sensitive_count: usize,
    pub high_confidence_sensitive_count: usize,
    pub sensitive_types: BTreeSet<String>,
    /// Leading slice of the masked payload, for context
    pub excerpt: String,
}

const EXCERPT_CHARS: usize = 120;

impl ReviewSummary {
    pub fn from_execution(execution: &Execution) -> Option<Self> {
        let assessment = execution.risk_assessment.as_ref()?;
        let excerpt: String = assessment
            .masked_payload
            .chars()
            .take(EXCERPT_CHARS)
            .collect();
        Some(Self {
            execution_id: execution.id.clone(),
            risk_level: assessment.risk_level,
            sensitive_count: assessment.sensitive_count,
            high_confidence_sensitive_count: assessment.high_confidence_sensitive_count,
            sensitive_types: assessment.sensitive_types.clone(),
            excerpt,
        })
    }
}

/// A suspended execution awaiting a decision
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingReview {
    pub execution_id: ExecutionId,
    pub summary: ReviewSummary,
    pub enqueued_at: DateTime<Utc>,
}

/// In-process queue of suspended executions, keyed by resume token
#[derive(Default)]
pub struct ReviewGateway {
    pending: RwLock<HashMap<ResumeToken, PendingReview>>,
}

impl ReviewGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a suspended execution under its token
    pub fn enqueue(&self, token: ResumeToken, review: PendingReview) {
        tracing::info!(
            execution_id = %review.execution_id,
            risk_level = %review.summary.risk_level,
            "execution enqueued for manual review"
        );
        self.pending.write().insert(token, review);
    }

    /// Consume the token, removing the pending entry. Exactly one
    /// caller per token succeeds.
    pub fn take(&self, token: &ResumeToken) -> Result<PendingReview, EngineError> {
        self.pending
            .write()
            .remove(token)
            .ok_or(EngineError::InvalidToken)
    }

    /// Put an entry back after a failed resumption attempt, so the
    /// token stays valid for a later retry.
    pub fn reinstate(&self, token: ResumeToken, review: PendingReview) {
        self.pending.write().insert(token, review);
    }

    /// Invalidate a token without a decision, for cancellation
    pub fn retract(&self, token: &ResumeToken) -> Option<PendingReview> {
        self.pending.write().remove(token)
    }

    /// Snapshot of everything awaiting review, oldest first
    pub fn pending(&self) -> Vec<PendingReview> {
        let mut reviews: Vec<PendingReview> = self.pending.read().values().cloned().collect();
        reviews.sort_by_key(|r| r.enqueued_at);
        reviews
    }
}
