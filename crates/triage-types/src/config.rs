//! Configuration consumed, not owned, by the workflow core
//!
//! All knobs that looked like policy in the original pipeline (risk
//! thresholds, sensitivity allow-list, retry schedules) are
//! configuration here. The defaults mirror the values the pipeline
//! shipped with, but nothing in the engine assumes them.

use crate::risk::RiskLevel;
use crate::state::State;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

// ── Retry ────────────────────────────────────────────────────────────

/// Per-state retry schedule for transient errors
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts before a transient error becomes fatal
    pub max_attempts: u32,
    /// Backoff before the second attempt
    pub initial_backoff_ms: u64,
    /// Multiplier applied per subsequent attempt
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 200,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Backoff to sleep after the given failed attempt (1-based):
    /// `initial * multiplier^(attempt - 1)`
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1);
        let ms = self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(exp as i32);
        Duration::from_millis(ms as u64)
    }
}

// ── Risk configuration ───────────────────────────────────────────────

/// Sensitivity allow-list and tier thresholds for the risk assessor
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Minimum confidence for an entity to count as high-confidence
    pub confidence_threshold: f64,
    /// More high-confidence sensitive entities than this is HIGH
    pub high_count_threshold: usize,
    /// More sensitive entities than this is MEDIUM even without
    /// high-confidence hits
    pub medium_count_threshold: usize,
    /// Entity types treated as sensitive
    pub sensitive_types: BTreeSet<String>,
    /// Extractor categories treated as sensitive regardless of type
    pub sensitive_categories: BTreeSet<String>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        let sensitive_types = [
            "NAME",
            "AGE",
            "ID",
            "EMAIL",
            "URL",
            "ADDRESS",
            "PROFESSION",
            "PHONE_OR_FAX",
            "DATE",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        let sensitive_categories = ["PHI"].into_iter().map(String::from).collect();

        Self {
            confidence_threshold: 0.8,
            high_count_threshold: 5,
            medium_count_threshold: 10,
            sensitive_types,
            sensitive_categories,
        }
    }
}

impl RiskConfig {
    /// Classify a tier from the two sensitive counts, highest first
    pub fn classify(&self, sensitive: usize, high_confidence: usize) -> RiskLevel {
        if high_confidence > self.high_count_threshold {
            RiskLevel::High
        } else if high_confidence > 0 || sensitive > self.medium_count_threshold {
            RiskLevel::Medium
        } else if sensitive > 0 {
            RiskLevel::Low
        } else {
            RiskLevel::Minimal
        }
    }
}

// ── Engine configuration ─────────────────────────────────────────────

/// Configuration surface for the orchestrator
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Retry schedule applied when a state has no specific entry
    pub default_retry: RetryPolicy,
    /// Per-state retry overrides
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub per_state_retry: HashMap<State, RetryPolicy>,
    /// Timeout for each external capability call
    pub call_timeout_ms: u64,
    /// Purpose string passed to consent lookups
    pub consent_purpose: String,
    /// Risk assessor configuration
    pub risk: RiskConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_retry: RetryPolicy::default(),
            per_state_retry: HashMap::new(),
            call_timeout_ms: 5_000,
            consent_purpose: "processing".into(),
            risk: RiskConfig::default(),
        }
    }
}

impl EngineConfig {
    /// The retry policy in effect for a state
    pub fn retry_for(&self, state: State) -> RetryPolicy {
        self.per_state_retry
            .get(&state)
            .copied()
            .unwrap_or(self.default_retry)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn with_retry(mut self, state: State, policy: RetryPolicy) -> Self {
        self.per_state_retry.insert(state, policy);
        self
    }
}
