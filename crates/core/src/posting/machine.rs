//! Journal entry lifecycle.
//!
//! ```text
//! DRAFT -> PENDING_APPROVAL -> APPROVED -> POSTED -> REVERSED
//!   ^   \         |    \
//!   |    +--------+-----+--> VOID
//!   +----- REJECTED / recall / expiry
//! ```
//!
//! Every transition works on a copy of the entry, bumps its version and
//! returns the copy. Persisting it (with the previous version as the
//! optimistic concurrency guard) and writing the audit record belong to
//! the caller's unit of work.

use chrono::{DateTime, Utc};

use ledgerline_shared::types::{Actor, ApprovalRequestId, JournalEntryId, UserId};

use super::error::PostingError;
use crate::journal::{EntryKind, JournalEntry, JournalStatus};

/// Lifecycle operations, also used as audit action names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostingAction {
    /// Draft created.
    Create,
    /// Draft contents replaced.
    Update,
    /// Sent for approval.
    Submit,
    /// Approval completed.
    Approve,
    /// Returned by an approver.
    Reject,
    /// Posted to the ledger.
    Post,
    /// Offset by a reversal.
    Reverse,
    /// Cancelled before posting.
    Void,
    /// Withdrawn by the submitter.
    Recall,
    /// Approval window ran out.
    Expire,
}

impl PostingAction {
    /// Returns the string representation of the action.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Submit => "submit",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Post => "post",
            Self::Reverse => "reverse",
            Self::Void => "void",
            Self::Recall => "recall",
            Self::Expire => "expire",
        }
    }
}

/// Stateless journal entry state machine.
pub struct PostingStateMachine;

impl PostingStateMachine {
    /// Compares the caller's expected version with the stored one.
    ///
    /// # Errors
    ///
    /// `VersionConflict` when they differ.
    pub fn check_version(entry: &JournalEntry, expected: Option<i64>) -> Result<(), PostingError> {
        match expected {
            Some(expected) if expected != entry.version => Err(PostingError::VersionConflict {
                expected,
                actual: entry.version,
            }),
            _ => Ok(()),
        }
    }

    /// Header and lines may only change while DRAFT or REJECTED.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` otherwise.
    pub fn ensure_editable(entry: &JournalEntry) -> Result<(), PostingError> {
        if entry.status.is_editable() {
            Ok(())
        } else {
            Err(PostingError::InvalidTransition {
                from: entry.status,
                action: PostingAction::Update.as_str(),
            })
        }
    }

    /// Fails for entries that may never be reversed, whatever their status.
    ///
    /// # Errors
    ///
    /// `GeneratedEntry` for FX revaluation entries.
    pub fn ensure_reversible(entry: &JournalEntry) -> Result<(), PostingError> {
        if entry.kind == EntryKind::Revaluation {
            return Err(PostingError::GeneratedEntry { entry: entry.id });
        }
        Ok(())
    }

    /// DRAFT or REJECTED -> PENDING_APPROVAL, attached to `request`.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` from any other status.
    pub fn submit(
        entry: &JournalEntry,
        request: ApprovalRequestId,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<JournalEntry, PostingError> {
        Self::guard(entry, PostingAction::Submit)?;
        Ok(Self::advance(entry, JournalStatus::PendingApproval, actor, now, |e| {
            e.approval_request_id = Some(request);
            e.status_reason = None;
        }))
    }

    /// PENDING_APPROVAL -> APPROVED.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` from any other status.
    pub fn approve(
        entry: &JournalEntry,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<JournalEntry, PostingError> {
        Self::guard(entry, PostingAction::Approve)?;
        Ok(Self::advance(entry, JournalStatus::Approved, actor, now, |_| {}))
    }

    /// PENDING_APPROVAL -> REJECTED (editable again).
    ///
    /// # Errors
    ///
    /// `ReasonRequired` or `InvalidTransition`.
    pub fn reject(
        entry: &JournalEntry,
        reason: &str,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<JournalEntry, PostingError> {
        Self::require_reason(reason, PostingAction::Reject)?;
        Self::guard(entry, PostingAction::Reject)?;
        Ok(Self::advance(entry, JournalStatus::Rejected, actor, now, |e| {
            e.status_reason = Some(reason.to_string());
        }))
    }

    /// APPROVED -> POSTED. Line contents are frozen from here on.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` from any other status.
    pub fn post(
        entry: &JournalEntry,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<JournalEntry, PostingError> {
        Self::guard(entry, PostingAction::Post)?;
        Ok(Self::advance(entry, JournalStatus::Posted, actor, now, |e| {
            e.posted_by = Some(actor);
            e.posted_at = Some(now);
        }))
    }

    /// DRAFT -> POSTED for revaluation entries the ledger generates itself;
    /// they carry no approval request.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` for any other entry.
    pub fn post_generated(
        entry: &JournalEntry,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<JournalEntry, PostingError> {
        if entry.status != JournalStatus::Draft || entry.kind != EntryKind::Revaluation {
            return Err(PostingError::InvalidTransition {
                from: entry.status,
                action: PostingAction::Post.as_str(),
            });
        }
        Ok(Self::advance(entry, JournalStatus::Posted, actor, now, |e| {
            e.posted_by = Some(actor);
            e.posted_at = Some(now);
        }))
    }

    /// POSTED -> REVERSED, linked to its reversal entry.
    ///
    /// # Errors
    ///
    /// `ReasonRequired`, `GeneratedEntry` or `InvalidTransition`.
    pub fn reverse(
        entry: &JournalEntry,
        reversal: JournalEntryId,
        reason: &str,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<JournalEntry, PostingError> {
        Self::require_reason(reason, PostingAction::Reverse)?;
        Self::ensure_reversible(entry)?;
        Self::guard(entry, PostingAction::Reverse)?;
        Ok(Self::advance(entry, JournalStatus::Reversed, actor, now, |e| {
            e.reversed_by_entry_id = Some(reversal);
            e.status_reason = Some(reason.to_string());
        }))
    }

    /// Any pre-POSTED status -> VOID.
    ///
    /// # Errors
    ///
    /// `ReasonRequired` or `InvalidTransition`.
    pub fn void(
        entry: &JournalEntry,
        reason: &str,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<JournalEntry, PostingError> {
        Self::require_reason(reason, PostingAction::Void)?;
        Self::guard(entry, PostingAction::Void)?;
        Ok(Self::advance(entry, JournalStatus::Void, actor, now, |e| {
            e.status_reason = Some(reason.to_string());
        }))
    }

    /// PENDING_APPROVAL -> DRAFT, by the submitter only.
    ///
    /// # Errors
    ///
    /// `ReasonRequired`, `NotSubmitter` or `InvalidTransition`.
    pub fn recall(
        entry: &JournalEntry,
        submitter: Actor,
        actor: UserId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<JournalEntry, PostingError> {
        Self::require_reason(reason, PostingAction::Recall)?;
        Self::guard(entry, PostingAction::Recall)?;
        if submitter != Actor::User(actor) {
            return Err(PostingError::NotSubmitter { user: actor });
        }
        Ok(Self::advance(entry, JournalStatus::Draft, Actor::User(actor), now, |e| {
            e.status_reason = Some(reason.to_string());
        }))
    }

    /// PENDING_APPROVAL -> DRAFT after the request expired.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` from any other status.
    pub fn expire(entry: &JournalEntry, now: DateTime<Utc>) -> Result<JournalEntry, PostingError> {
        Self::guard(entry, PostingAction::Expire)?;
        Ok(Self::advance(entry, JournalStatus::Draft, Actor::System, now, |e| {
            e.status_reason = Some("approval request expired".to_string());
        }))
    }

    /// Check if a status transition is valid.
    #[must_use]
    pub fn is_valid_transition(from: JournalStatus, to: JournalStatus) -> bool {
        use JournalStatus::{Approved, Draft, PendingApproval, Posted, Rejected, Reversed, Void};
        matches!(
            (from, to),
            (Draft | Rejected, PendingApproval)
                | (PendingApproval, Approved | Rejected | Draft)
                | (Approved, Posted)
                | (Posted, Reversed)
                | (Draft | Rejected | PendingApproval | Approved, Void)
        )
    }

    fn target(action: PostingAction) -> Option<JournalStatus> {
        match action {
            PostingAction::Submit => Some(JournalStatus::PendingApproval),
            PostingAction::Approve => Some(JournalStatus::Approved),
            PostingAction::Reject => Some(JournalStatus::Rejected),
            PostingAction::Post => Some(JournalStatus::Posted),
            PostingAction::Reverse => Some(JournalStatus::Reversed),
            PostingAction::Void => Some(JournalStatus::Void),
            PostingAction::Recall | PostingAction::Expire => Some(JournalStatus::Draft),
            PostingAction::Create | PostingAction::Update => None,
        }
    }

    fn guard(entry: &JournalEntry, action: PostingAction) -> Result<(), PostingError> {
        let allowed = match action {
            // Recall and expiry only ever leave PENDING_APPROVAL.
            PostingAction::Recall | PostingAction::Expire => {
                entry.status == JournalStatus::PendingApproval
            }
            _ => Self::target(action).is_some_and(|to| Self::is_valid_transition(entry.status, to)),
        };
        if allowed {
            Ok(())
        } else {
            Err(PostingError::InvalidTransition {
                from: entry.status,
                action: action.as_str(),
            })
        }
    }

    fn require_reason(reason: &str, action: PostingAction) -> Result<(), PostingError> {
        if reason.trim().is_empty() {
            Err(PostingError::ReasonRequired {
                action: action.as_str(),
            })
        } else {
            Ok(())
        }
    }

    fn advance(
        entry: &JournalEntry,
        status: JournalStatus,
        actor: Actor,
        now: DateTime<Utc>,
        apply: impl FnOnce(&mut JournalEntry),
    ) -> JournalEntry {
        let mut next = entry.clone();
        next.status = status;
        apply(&mut next);
        next.touch(actor, now);
        next.version += 1;
        next
    }
}

#[cfg(test)]
#[path = "machine_tests.rs"]
mod tests;
