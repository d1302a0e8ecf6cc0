//! Error types for the transition table

use crate::state::State;

/// Errors raised by the transition table
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransitionError {
    #[error("execution is terminal in state {0}, no further transitions permitted")]
    TerminalStateViolation(State),

    #[error("outcome '{outcome}' is not valid from state {state}")]
    InvalidOutcome { state: State, outcome: String },
}

/// Result type alias for transition computations
pub type TransitionResult<T> = Result<T, TransitionError>;
