//! Approval workflow errors.

use thiserror::Error;

use ledgerline_shared::types::UserId;

use super::types::ApprovalStatus;

/// Errors raised by the approval workflow engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApprovalError {
    /// Reject and recall need a non-empty reason.
    #[error("A reason is required to {action}")]
    ReasonRequired {
        /// The action attempted.
        action: &'static str,
    },

    /// The request is already terminal.
    #[error("Approval request is already {status}")]
    RequestTerminal {
        /// Its terminal status.
        status: ApprovalStatus,
    },

    /// The actor is not in the current step's approver set.
    #[error("User {user} is not an eligible approver for the current step")]
    NotEligible {
        /// The actor.
        user: UserId,
    },

    /// Approver resolution produced nobody.
    #[error("No eligible approvers could be resolved for step {step_order}")]
    NoEligibleApprovers {
        /// The step that could not be staffed.
        step_order: u32,
    },

    /// Delegation to oneself or to a current approver of the step.
    #[error("Cannot delegate to {to}")]
    InvalidDelegation {
        /// The proposed delegate.
        to: UserId,
    },

    /// A workflow definition is malformed.
    #[error("Invalid workflow: {0}")]
    InvalidWorkflow(String),
}

impl ApprovalError {
    /// Returns the reason code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::ReasonRequired { .. } => "REASON_REQUIRED",
            Self::RequestTerminal { .. } => "REQUEST_TERMINAL",
            Self::NotEligible { .. } => "NOT_ELIGIBLE_APPROVER",
            Self::NoEligibleApprovers { .. } => "NO_ELIGIBLE_APPROVERS",
            Self::InvalidDelegation { .. } => "INVALID_DELEGATION",
            Self::InvalidWorkflow(_) => "INVALID_WORKFLOW",
        }
    }
}
