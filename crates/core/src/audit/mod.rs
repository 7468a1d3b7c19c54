//! Append-only audit trail.
//!
//! Every state change in the ledger produces exactly one [`AuditEntry`],
//! written in the same transaction as the change.

pub mod error;
pub mod recorder;
pub mod types;

pub use error::AuditError;
pub use recorder::{AuditEvent, AuditFilter, AuditRecorder};
pub use types::{AuditAction, AuditEntityType, AuditEntry};
