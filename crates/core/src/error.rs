//! Engine-level error type folding every module's errors.

use thiserror::Error;

use ledgerline_shared::types::UserId;

use crate::approval::ApprovalError;
use crate::audit::AuditError;
use crate::fx::FxError;
use crate::journal::JournalValidationError;
use crate::ports::{CollaboratorError, StoreError};
use crate::posting::PostingError;

/// Caller-facing classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request itself is wrong; fix and resend.
    Validation,
    /// Stale state; refetch and retry.
    Conflict,
    /// A referenced record is absent.
    NotFound,
    /// The actor may not do this.
    Permission,
    /// The record's status does not allow this.
    State,
    /// Infrastructure failure.
    Internal,
}

impl ErrorKind {
    /// HTTP status code for this kind.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::Conflict => 409,
            Self::NotFound => 404,
            Self::Permission => 403,
            Self::State => 422,
            Self::Internal => 500,
        }
    }
}

/// Any failure of a ledger operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GlError {
    /// Journal entry validation failed.
    #[error(transparent)]
    Validation(#[from] JournalValidationError),

    /// Approval workflow rule violated.
    #[error(transparent)]
    Approval(#[from] ApprovalError),

    /// Posting lifecycle rule violated.
    #[error(transparent)]
    Posting(#[from] PostingError),

    /// FX revaluation or settlement failed.
    #[error(transparent)]
    Fx(#[from] FxError),

    /// The audit entry could not be written; the operation was rolled back.
    #[error(transparent)]
    Audit(#[from] AuditError),

    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A collaborator failed.
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    /// The caller lacks the administrative role an operation requires.
    #[error("User {user} needs role '{role}' to {action}")]
    NotAuthorized {
        /// The caller.
        user: UserId,
        /// Required role.
        role: String,
        /// Attempted operation.
        action: &'static str,
    },

    /// A referenced record does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Record kind.
        entity: &'static str,
        /// Record id.
        id: String,
    },
}

impl GlError {
    /// Shorthand for [`GlError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Machine-readable reason code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.error_code(),
            Self::Approval(e) => e.error_code(),
            Self::Posting(e) => e.error_code(),
            Self::Fx(e) => e.error_code(),
            Self::Audit(e) => e.error_code(),
            Self::Store(e) => e.error_code(),
            Self::Collaborator(e) => e.error_code(),
            Self::NotAuthorized { .. } => "NOT_AUTHORIZED",
            Self::NotFound { .. } => "NOT_FOUND",
        }
    }

    /// Offending 1-based line number, for line-level validation errors.
    #[must_use]
    pub const fn line(&self) -> Option<u32> {
        match self {
            Self::Validation(e) => e.line(),
            _ => None,
        }
    }

    /// Classification of the failure.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Approval(e) => match e {
                ApprovalError::ReasonRequired { .. }
                | ApprovalError::InvalidDelegation { .. }
                | ApprovalError::InvalidWorkflow(_) => ErrorKind::Validation,
                ApprovalError::RequestTerminal { .. } => ErrorKind::Conflict,
                ApprovalError::NotEligible { .. } => ErrorKind::Permission,
                ApprovalError::NoEligibleApprovers { .. } => ErrorKind::State,
            },
            Self::Posting(e) => match e {
                PostingError::ReasonRequired { .. } => ErrorKind::Validation,
                PostingError::VersionConflict { .. } | PostingError::OpenRequestExists { .. } => {
                    ErrorKind::Conflict
                }
                PostingError::NotSubmitter { .. } => ErrorKind::Permission,
                PostingError::InvalidTransition { .. } | PostingError::GeneratedEntry { .. } => {
                    ErrorKind::State
                }
            },
            Self::Fx(e) => match e {
                FxError::ClosedPeriod { .. } | FxError::InvalidRate { .. } => ErrorKind::Validation,
                FxError::MissingRate { .. } => ErrorKind::NotFound,
                FxError::BatchAlreadyPosted { .. } | FxError::ItemSettled { .. } => {
                    ErrorKind::Conflict
                }
            },
            Self::Store(e) => match e {
                StoreError::NotFound { .. } => ErrorKind::NotFound,
                StoreError::VersionConflict { .. } | StoreError::Duplicate(_) => {
                    ErrorKind::Conflict
                }
                StoreError::Backend(_) => ErrorKind::Internal,
            },
            Self::Audit(_) | Self::Collaborator(_) => ErrorKind::Internal,
            Self::NotAuthorized { .. } => ErrorKind::Permission,
            Self::NotFound { .. } => ErrorKind::NotFound,
        }
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Whether refetching and retrying may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Conflict)
    }
}

/// Result alias for ledger operations.
pub type GlResult<T> = Result<T, GlError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::ApprovalStatus;
    use ledgerline_shared::types::{CurrencyCode, JournalEntryId, UserId};
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(GlError::from(JournalValidationError::Unbalanced { debit: dec!(700), credit: dec!(650), currency: CurrencyCode::USD }), 400, "UNBALANCED")]
    #[case(GlError::from(ApprovalError::RequestTerminal { status: ApprovalStatus::Approved }), 409, "REQUEST_TERMINAL")]
    #[case(GlError::from(ApprovalError::NotEligible { user: UserId::new() }), 403, "NOT_ELIGIBLE_APPROVER")]
    #[case(GlError::from(PostingError::VersionConflict { expected: 1, actual: 2 }), 409, "VERSION_CONFLICT")]
    #[case(GlError::from(AuditError::WriteFailed("down".into())), 500, "AUDIT_WRITE_FAILED")]
    #[case(GlError::NotAuthorized { user: UserId::new(), role: "ledger_admin".into(), action: "define workflows" }, 403, "NOT_AUTHORIZED")]
    #[case(GlError::from(PostingError::GeneratedEntry { entry: JournalEntryId::new() }), 422, "GENERATED_ENTRY")]
    #[case(GlError::from(JournalValidationError::AmountOutOfRange { line: Some(1) }), 400, "AMOUNT_OUT_OF_RANGE")]
    #[case(GlError::not_found("journal entry", "x"), 404, "NOT_FOUND")]
    fn test_status_and_code(#[case] err: GlError, #[case] status: u16, #[case] code: &str) {
        assert_eq!(err.status_code(), status);
        assert_eq!(err.error_code(), code);
    }

    #[test]
    fn test_only_conflicts_are_retryable() {
        assert!(GlError::from(StoreError::VersionConflict { entity: "journal entry", id: "1".into() }).is_retryable());
        assert!(!GlError::from(StoreError::Backend("down".into())).is_retryable());
        assert!(!GlError::from(JournalValidationError::BothSidesNonZero { line: 2 }).is_retryable());
    }

    #[test]
    fn test_line_passes_through() {
        let err = GlError::from(JournalValidationError::NoAmount { line: 4 });
        assert_eq!(err.line(), Some(4));
        assert_eq!(GlError::not_found("approval request", "x").line(), None);
    }
}
