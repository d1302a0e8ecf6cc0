//! Risk tiers and the risk assessment result

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ── Risk tier ────────────────────────────────────────────────────────

/// Overall risk tier for an execution, driving routing decisions.
///
/// Ordered so that tier comparisons read naturally:
/// `Minimal < Low < Medium < High`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    #[default]
    Minimal,
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Minimal => "MINIMAL",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        };
        f.write_str(name)
    }
}

// ── Assessment ───────────────────────────────────────────────────────

/// The risk assessor's output: derived, immutable, created once per
/// execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Classified risk tier
    pub risk_level: RiskLevel,
    /// All entities the extractor reported
    pub total_entities: usize,
    /// Entities matching the sensitivity allow-list
    pub sensitive_count: usize,
    /// Sensitive entities at or above the confidence threshold
    pub high_confidence_sensitive_count: usize,
    /// Distinct types among the sensitive entities
    pub sensitive_types: BTreeSet<String>,
    /// The payload with sensitive spans replaced by placeholders
    pub masked_payload: String,
}

impl RiskAssessment {
    /// An assessment for a payload with no detected entities
    pub fn minimal(masked_payload: impl Into<String>) -> Self {
        Self {
            risk_level: RiskLevel::Minimal,
            total_entities: 0,
            sensitive_count: 0,
            high_confidence_sensitive_count: 0,
            sensitive_types: BTreeSet::new(),
            masked_payload: masked_payload.into(),
        }
    }
}
