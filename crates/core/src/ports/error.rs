//! Errors raised by persistence and collaborator adapters.

use thiserror::Error;

/// Persistent store failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The record does not exist in this tenant.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Record kind.
        entity: &'static str,
        /// Record id.
        id: String,
    },

    /// The stored version moved since the record was read.
    #[error("{entity} {id} was modified concurrently")]
    VersionConflict {
        /// Record kind.
        entity: &'static str,
        /// Record id.
        id: String,
    },

    /// A uniqueness guard rejected the write.
    #[error("Duplicate {0}")]
    Duplicate(String),

    /// Connection, query or transaction failure.
    #[error("Store failure: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns the reason code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::VersionConflict { .. } => "VERSION_CONFLICT",
            Self::Duplicate(_) => "DUPLICATE",
            Self::Backend(_) => "STORE_FAILURE",
        }
    }
}

/// Failure of an external collaborator (accounts, periods, identities, rates).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    /// The collaborator could not answer.
    #[error("{service} unavailable: {message}")]
    Unavailable {
        /// Which collaborator.
        service: &'static str,
        /// Underlying failure.
        message: String,
    },
}

impl CollaboratorError {
    /// Returns the reason code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Unavailable { .. } => "COLLABORATOR_UNAVAILABLE",
        }
    }
}

/// Notification dispatch failure. Logged, never propagated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Notification failed: {0}")]
pub struct NotificationError(pub String);
