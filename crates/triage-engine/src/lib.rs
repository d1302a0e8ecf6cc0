//! Workflow orchestrator for the triage pipeline
//!
//! A durable state machine per execution: validation, consent
//! verification, entity extraction, risk assessment, and risk-gated
//! routing into automated processing, human review, or quarantine.
//! The orchestrator coordinates; the actual capabilities (extractor,
//! consent service, persistence, notification) are pluggable traits.
//!
//! Guarantees:
//! - at most one active worker per execution at any instant (leases)
//! - exactly-once terminal transition
//! - one acknowledged audit record per transition, before proceeding

pub mod capability;
pub mod errors;
pub mod gateway;
pub mod lease;
pub mod mock;
pub mod orchestrator;
pub mod store;

pub use capability::{
    Artifact, Capabilities, ConsentService, ConsentUnavailable, EntityExtractor,
    ExtractionError, Notification, NotificationSink, PersistenceSink, StoreError,
};
pub use errors::EngineError;
pub use gateway::{Decision, PendingReview, ReviewGateway, ReviewSummary};
pub use lease::{LeaseGuard, LeaseRegistry};
pub use orchestrator::Orchestrator;
pub use store::{ExecutionStore, FileExecutionStore, MemoryExecutionStore, StateStoreError};
