//! Posting state machine errors.

use thiserror::Error;

use ledgerline_shared::types::{JournalEntryId, UserId};

use crate::journal::JournalStatus;

/// Errors raised by journal entry lifecycle transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PostingError {
    /// Transition not allowed from the current status.
    #[error("Cannot {action} a journal entry in status {from}")]
    InvalidTransition {
        /// Current status.
        from: JournalStatus,
        /// Attempted operation.
        action: &'static str,
    },

    /// Reject/void/reverse/recall without a reason.
    #[error("A reason is required to {action} a journal entry")]
    ReasonRequired {
        /// Attempted operation.
        action: &'static str,
    },

    /// The caller's view of the entry is stale.
    #[error("Journal entry was modified concurrently (expected version {expected}, found {actual})")]
    VersionConflict {
        /// Version the caller last saw.
        expected: i64,
        /// Current version.
        actual: i64,
    },

    /// The document already has an open approval request.
    #[error("Journal entry {entry} already has an open approval request")]
    OpenRequestExists {
        /// The entry.
        entry: JournalEntryId,
    },

    /// Only the submitter may recall.
    #[error("User {user} did not submit this journal entry")]
    NotSubmitter {
        /// The actor.
        user: UserId,
    },

    /// Revaluation entries are unwound by settling the open items they
    /// revalued, not by reversal.
    #[error("Journal entry {entry} was generated by FX revaluation and cannot be reversed")]
    GeneratedEntry {
        /// The entry.
        entry: JournalEntryId,
    },
}

impl PostingError {
    /// Returns the reason code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::ReasonRequired { .. } => "REASON_REQUIRED",
            Self::VersionConflict { .. } => "VERSION_CONFLICT",
            Self::OpenRequestExists { .. } => "OPEN_REQUEST_EXISTS",
            Self::NotSubmitter { .. } => "NOT_SUBMITTER",
            Self::GeneratedEntry { .. } => "GENERATED_ENTRY",
        }
    }
}
