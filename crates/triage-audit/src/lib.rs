//! Append-only audit recording for the triage workflow
//!
//! Every state transition, decision, and error produces exactly one
//! [`AuditRecord`], sequenced per execution by the sink. The
//! orchestrator does not treat a transition as committed until the
//! append is acknowledged; terminal transitions are retried
//! indefinitely because losing the record of a quarantine or
//! completion is worse than delaying it.

mod recorder;
mod sink;

pub use recorder::AuditRecorder;
pub use sink::{AuditError, AuditSink, FileAuditSink, MemoryAuditSink};
