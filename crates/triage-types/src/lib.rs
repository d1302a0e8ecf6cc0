//! Domain types for the triage workflow engine
//!
//! This crate defines the data model shared by the risk assessor, the
//! audit recorder, and the orchestrator:
//!
//! - [`Execution`]: one run of the workflow for a single input payload
//! - [`State`] and [`next_state`]: the state set and transition table
//! - [`Entity`] and [`RiskAssessment`]: risk engine input and output
//! - [`AuditRecord`]: the append-only transition log entry
//! - Configuration consumed (not owned) by the core

pub mod audit;
pub mod config;
pub mod entity;
pub mod errors;
pub mod execution;
pub mod risk;
pub mod state;

pub use audit::{AuditEvent, AuditRecord};
pub use config::{EngineConfig, RetryPolicy, RiskConfig};
pub use entity::Entity;
pub use errors::{TransitionError, TransitionResult};
pub use execution::{Execution, ExecutionId, Payload, ResumeToken};
pub use risk::{RiskAssessment, RiskLevel};
pub use state::{next_state, Outcome, State};
