//! Risk assessor for the triage workflow
//!
//! Consumes extracted entities, classifies the overall risk tier, and
//! produces a masked variant of the input payload. [`assess`] is a
//! pure function: no side effects, deterministic for identical entity
//! input. The orchestrator's branching decisions are driven entirely
//! by its output.

mod assessor;
mod masking;

pub use assessor::{assess, is_sensitive};
pub use masking::{mask_payload, resolve_overlaps};
