//! The workflow state set and transition table
//!
//! States are a closed enum rather than free-form names so the
//! transition table is an exhaustive match checked at compile time.
//! Risk routing is the outcome mapping of `AssessRisk`: there is no
//! separately-audited decision state, the chosen branch is recorded in
//! the `AssessRisk` transition's decision reason.

use crate::errors::{TransitionError, TransitionResult};
use crate::risk::RiskLevel;
use serde::{Deserialize, Serialize};

// ── State ────────────────────────────────────────────────────────────

/// A state in the per-execution finite state machine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    /// Structural validation of the incoming payload
    ValidateInput,
    /// Consent verification against the consent service
    CheckConsent,
    /// Sensitive-entity detection via the extractor capability
    ExtractEntities,
    /// Risk scoring and masking; outcome carries the risk tier
    AssessRisk,
    /// Suspended awaiting a human decision (resume token issued)
    ManualReview,
    /// Parallel fan-out: persist, derive artifact, notify
    ProcessAndStore,
    /// Isolate the payload pending investigation
    Quarantine,
    /// Raise the high-risk / failure notification
    Alert,
    /// Terminal: processed successfully
    Completed,
    /// Terminal: withdrawn while suspended
    Quarantined,
    /// Terminal: quarantined and reported
    Failed,
}

impl State {
    /// Check whether no further transitions are permitted from here
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Quarantined | Self::Failed)
    }

    /// The state name as recorded in audit trails
    pub fn name(&self) -> &'static str {
        match self {
            Self::ValidateInput => "ValidateInput",
            Self::CheckConsent => "CheckConsent",
            Self::ExtractEntities => "ExtractEntities",
            Self::AssessRisk => "AssessRisk",
            Self::ManualReview => "ManualReview",
            Self::ProcessAndStore => "ProcessAndStore",
            Self::Quarantine => "Quarantine",
            Self::Alert => "Alert",
            Self::Completed => "Completed",
            Self::Quarantined => "Quarantined",
            Self::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ── Outcome ──────────────────────────────────────────────────────────

/// The result of executing one state's handler
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    /// The handler completed normally
    Success,
    /// Risk assessment produced this tier (only valid from `AssessRisk`)
    Risk(RiskLevel),
    /// A reviewer approved the suspended execution
    Approved,
    /// A reviewer rejected the suspended execution
    Rejected,
    /// The suspended execution was externally cancelled
    Cancelled,
    /// A non-retryable error, or a retry budget exhausted
    Fatal(String),
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Risk(level) => write!(f, "risk_level={level}"),
            Self::Approved => write!(f, "review_approved"),
            Self::Rejected => write!(f, "review_rejected"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Fatal(reason) => write!(f, "fatal: {reason}"),
        }
    }
}

// ── Transition table ─────────────────────────────────────────────────

/// Compute the next state for `(state, outcome)`.
///
/// Any outcome applied to a terminal state is a
/// [`TransitionError::TerminalStateViolation`]. A `Fatal` outcome
/// routes to `Quarantine` from every working state except the
/// quarantine path itself, which falls through to `Failed` so failure
/// handling cannot loop on its own failures.
pub fn next_state(state: State, outcome: &Outcome) -> TransitionResult<State> {
    use Outcome::*;
    use State::*;

    if state.is_terminal() {
        return Err(TransitionError::TerminalStateViolation(state));
    }

    let next = match (state, outcome) {
        (ValidateInput, Success) => CheckConsent,
        (CheckConsent, Success) => ExtractEntities,
        (ExtractEntities, Success) => AssessRisk,

        (AssessRisk, Risk(RiskLevel::High)) => Quarantine,
        (AssessRisk, Risk(RiskLevel::Medium)) => ManualReview,
        (AssessRisk, Risk(RiskLevel::Low)) => ProcessAndStore,
        (AssessRisk, Risk(RiskLevel::Minimal)) => ProcessAndStore,

        (ManualReview, Approved) => ProcessAndStore,
        (ManualReview, Rejected) => Quarantine,
        (ManualReview, Cancelled) => Quarantined,

        (ProcessAndStore, Success) => Completed,
        (Quarantine, Success) => Alert,
        (Alert, Success) => Failed,

        (Quarantine, Fatal(_)) | (Alert, Fatal(_)) => Failed,
        (_, Fatal(_)) => Quarantine,

        (from, outcome) => {
            return Err(TransitionError::InvalidOutcome {
                state: from,
                outcome: outcome.to_string(),
            })
        }
    };

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(State::Completed.is_terminal());
        assert!(State::Quarantined.is_terminal());
        assert!(State::Failed.is_terminal());
        assert!(!State::ValidateInput.is_terminal());
        assert!(!State::ManualReview.is_terminal());
        assert!(!State::Quarantine.is_terminal());
    }

    #[test]
    fn test_happy_path() {
        assert_eq!(
            next_state(State::ValidateInput, &Outcome::Success).unwrap(),
            State::CheckConsent
        );
        assert_eq!(
            next_state(State::CheckConsent, &Outcome::Success).unwrap(),
            State::ExtractEntities
        );
        assert_eq!(
            next_state(State::ExtractEntities, &Outcome::Success).unwrap(),
            State::AssessRisk
        );
        assert_eq!(
            next_state(State::ProcessAndStore, &Outcome::Success).unwrap(),
            State::Completed
        );
    }

    #[test]
    fn test_risk_routing() {
        assert_eq!(
            next_state(State::AssessRisk, &Outcome::Risk(RiskLevel::High)).unwrap(),
            State::Quarantine
        );
        assert_eq!(
            next_state(State::AssessRisk, &Outcome::Risk(RiskLevel::Medium)).unwrap(),
            State::ManualReview
        );
        assert_eq!(
            next_state(State::AssessRisk, &Outcome::Risk(RiskLevel::Low)).unwrap(),
            State::ProcessAndStore
        );
        assert_eq!(
            next_state(State::AssessRisk, &Outcome::Risk(RiskLevel::Minimal)).unwrap(),
            State::ProcessAndStore
        );
    }

    #[test]
    fn test_review_outcomes() {
        assert_eq!(
            next_state(State::ManualReview, &Outcome::Approved).unwrap(),
            State::ProcessAndStore
        );
        assert_eq!(
            next_state(State::ManualReview, &Outcome::Rejected).unwrap(),
            State::Quarantine
        );
        assert_eq!(
            next_state(State::ManualReview, &Outcome::Cancelled).unwrap(),
            State::Quarantined
        );
    }

    #[test]
    fn test_fatal_routes_to_quarantine() {
        let fatal = Outcome::Fatal("boom".into());
        assert_eq!(
            next_state(State::ValidateInput, &fatal).unwrap(),
            State::Quarantine
        );
        assert_eq!(
            next_state(State::ExtractEntities, &fatal).unwrap(),
            State::Quarantine
        );
        assert_eq!(
            next_state(State::ProcessAndStore, &fatal).unwrap(),
            State::Quarantine
        );
    }

    #[test]
    fn test_fatal_on_quarantine_path_fails() {
        let fatal = Outcome::Fatal("boom".into());
        assert_eq!(next_state(State::Quarantine, &fatal).unwrap(), State::Failed);
        assert_eq!(next_state(State::Alert, &fatal).unwrap(), State::Failed);
    }

    #[test]
    fn test_terminal_state_violation() {
        for state in [State::Completed, State::Quarantined, State::Failed] {
            let result = next_state(state, &Outcome::Success);
            assert!(matches!(
                result,
                Err(TransitionError::TerminalStateViolation(_))
            ));
        }
    }

    #[test]
    fn test_invalid_outcome_rejected() {
        // Risk outcomes are only meaningful from AssessRisk
        let result = next_state(State::ValidateInput, &Outcome::Risk(RiskLevel::High));
        assert!(matches!(
            result,
            Err(TransitionError::InvalidOutcome { .. })
        ));

        // Review outcomes are only meaningful from ManualReview
        let result = next_state(State::CheckConsent, &Outcome::Approved);
        assert!(matches!(
            result,
            Err(TransitionError::InvalidOutcome { .. })
        ));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(State::AssessRisk.to_string(), "AssessRisk");
        assert_eq!(State::ProcessAndStore.to_string(), "ProcessAndStore");
    }
}
