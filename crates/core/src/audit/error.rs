//! Audit trail errors.

use thiserror::Error;

/// Errors raised while recording the audit trail.
///
/// Both abort the surrounding unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuditError {
    /// A before/after value could not be captured.
    #[error("Failed to serialize audit snapshot: {0}")]
    Serialization(String),

    /// The store refused the audit row.
    #[error("Failed to write audit entry: {0}")]
    WriteFailed(String),
}

impl AuditError {
    /// Returns the reason code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Serialization(_) => "AUDIT_SERIALIZATION",
            Self::WriteFailed(_) => "AUDIT_WRITE_FAILED",
        }
    }
}

impl From<serde_json::Error> for AuditError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
