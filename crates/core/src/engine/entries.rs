//! Journal entry lifecycle operations.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::info;

use ledgerline_shared::types::{Actor, JournalEntryId};

use super::{Caller, GlEngine, JOURNAL_DOCUMENT, apply_posting, audit_entry, record_history};
use crate::approval::{
    ApprovalEngine, ApprovalRequest, ApprovalStatus, Approvers, DocumentRef, NewRequest,
};
use crate::audit::AuditAction;
use crate::error::{GlError, GlResult};
use crate::journal::{
    JournalEntry, JournalEntryDraft, JournalStatus, JournalValidationError, ReversalInput,
    ReversalService,
};
use crate::ports::LedgerTx;
use crate::posting::{PostingAction, PostingError, PostingStateMachine};

/// Result of a submission: the entry as it now stands and its request.
///
/// When no approval step applies the request is already APPROVED and, under
/// auto-post, the entry already POSTED.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submission {
    /// The entry after submission.
    pub entry: JournalEntry,
    /// The approval request created for it.
    pub request: ApprovalRequest,
}

/// A reversed entry and the reversing entry created for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reversed {
    /// The original, now REVERSED.
    pub original: JournalEntry,
    /// The new POSTED mirror entry.
    pub reversal: JournalEntry,
}

async fn load_entry(tx: &mut dyn LedgerTx, id: JournalEntryId) -> GlResult<JournalEntry> {
    tx.journal_entry(id)
        .await?
        .ok_or_else(|| GlError::not_found("journal_entry", id))
}

impl GlEngine {
    /// Validates a draft and stores it as a DRAFT entry.
    ///
    /// # Errors
    ///
    /// `Validation` with the first failing reason code; nothing is stored.
    pub async fn create_journal_entry(
        &self,
        caller: Caller,
        mut draft: JournalEntryDraft,
    ) -> GlResult<JournalEntry> {
        draft.tenant_id = caller.tenant_id;
        draft.created_by = caller.actor();
        let validated = self.validate_draft(&draft).await?;

        let now = Utc::now();
        let entry = JournalEntry::new_draft(draft, validated.lines, self.policy.base_currency, now);

        let mut tx = self.store.begin(caller.tenant_id).await?;
        tx.insert_journal_entry(&entry).await?;
        audit_entry(tx.as_mut(), AuditAction::Create, caller.actor(), None, &entry, None, now).await?;
        tx.commit().await?;

        info!(
            tenant_id = %entry.tenant_id,
            entry_id = %entry.id,
            lines = entry.lines.len(),
            "Journal entry created"
        );
        Ok(entry)
    }

    /// Replaces the contents of a DRAFT or REJECTED entry.
    ///
    /// # Errors
    ///
    /// `Conflict` on a stale version, `State` outside DRAFT/REJECTED,
    /// `Validation` for an invalid draft.
    pub async fn update_journal_entry(
        &self,
        caller: Caller,
        id: JournalEntryId,
        mut draft: JournalEntryDraft,
        expected_version: Option<i64>,
    ) -> GlResult<JournalEntry> {
        let mut tx = self.store.begin(caller.tenant_id).await?;
        let current = load_entry(tx.as_mut(), id).await?;
        PostingStateMachine::check_version(&current, expected_version)?;
        PostingStateMachine::ensure_editable(&current)?;

        draft.tenant_id = caller.tenant_id;
        draft.created_by = current.created_by;
        let validated = self.validate_draft(&draft).await?;

        let now = Utc::now();
        let mut updated = current.clone();
        updated.replace_contents(draft, validated.lines, caller.actor(), now);
        updated.version += 1;

        tx.update_journal_entry(&updated, current.version).await?;
        audit_entry(
            tx.as_mut(),
            AuditAction::Update,
            caller.actor(),
            Some(&current),
            &updated,
            None,
            now,
        )
        .await?;
        tx.commit().await?;

        info!(
            tenant_id = %updated.tenant_id,
            entry_id = %updated.id,
            version = updated.version,
            "Journal entry updated"
        );
        Ok(updated)
    }

    /// Loads an entry with its lines.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id.
    pub async fn get_journal_entry(&self, caller: Caller, id: JournalEntryId) -> GlResult<JournalEntry> {
        let mut tx = self.store.begin(caller.tenant_id).await?;
        load_entry(tx.as_mut(), id).await
    }

    /// Re-validates a DRAFT or REJECTED entry and routes it for approval.
    ///
    /// A rejected entry always gets a new request; the rejected one stays in
    /// history untouched.
    ///
    /// # Errors
    ///
    /// - `State` outside DRAFT/REJECTED
    /// - `Conflict` on a stale version or an already open request
    /// - `Validation` if the stored contents no longer validate
    /// - `State` if the first approval step resolves to nobody
    pub async fn submit_journal_entry(
        &self,
        caller: Caller,
        id: JournalEntryId,
        expected_version: Option<i64>,
    ) -> GlResult<Submission> {
        let mut tx = self.store.begin(caller.tenant_id).await?;
        let entry = load_entry(tx.as_mut(), id).await?;
        PostingStateMachine::check_version(&entry, expected_version)?;
        if !entry.status.is_editable() {
            return Err(PostingError::InvalidTransition {
                from: entry.status,
                action: PostingAction::Submit.as_str(),
            }
            .into());
        }
        if tx
            .open_request_for(JOURNAL_DOCUMENT, entry.id.into_inner())
            .await?
            .is_some()
        {
            return Err(PostingError::OpenRequestExists { entry: entry.id }.into());
        }

        self.validate_draft(&entry.to_draft()).await?;

        let document = DocumentRef {
            doc_type: JOURNAL_DOCUMENT.to_string(),
            id: entry.id.into_inner(),
            amount: entry.totals.debit,
            currency: entry.currency,
        };
        let workflows = tx.workflows(JOURNAL_DOCUMENT).await?;
        let identities = self.collaborators.identities.snapshot(caller.tenant_id).await?;
        let now = Utc::now();
        let transition = ApprovalEngine::create_request(
            NewRequest {
                tenant_id: caller.tenant_id,
                workflow: ApprovalEngine::select_workflow(&workflows, &document),
                document,
                submitter: caller.actor(),
            },
            Approvers {
                resolver: self.resolver.as_ref(),
                identities: &identities,
            },
            now,
        )?;
        let request = transition.request;

        let submitted = PostingStateMachine::submit(&entry, request.id, caller.actor(), now)?;
        tx.insert_approval_request(&request).await?;
        record_history(tx.as_mut(), &transition.history).await?;
        audit_entry(
            tx.as_mut(),
            AuditAction::Submit,
            caller.actor(),
            Some(&entry),
            &submitted,
            None,
            now,
        )
        .await?;

        let settled = self
            .follow_request(tx.as_mut(), &request, submitted, caller.actor(), None, now)
            .await?;
        tx.update_journal_entry(&settled, entry.version).await?;
        tx.commit().await?;

        info!(
            tenant_id = %settled.tenant_id,
            entry_id = %settled.id,
            request_id = %request.id,
            status = %settled.status,
            steps = request.total_steps(),
            "Journal entry submitted"
        );
        if request.status != ApprovalStatus::Approved {
            self.notify_request(&request, false);
        }
        Ok(Submission {
            entry: settled,
            request,
        })
    }

    /// Posts an APPROVED entry: freezes it and rolls its base totals into the
    /// period.
    ///
    /// # Errors
    ///
    /// `State` outside APPROVED, `Conflict` on a stale version, `Validation`
    /// once the entry's period has closed.
    pub async fn post_journal_entry(
        &self,
        caller: Caller,
        id: JournalEntryId,
        expected_version: Option<i64>,
    ) -> GlResult<JournalEntry> {
        let mut tx = self.store.begin(caller.tenant_id).await?;
        let entry = load_entry(tx.as_mut(), id).await?;
        PostingStateMachine::check_version(&entry, expected_version)?;
        if entry.status == JournalStatus::Approved {
            self.ensure_period_open(&entry).await?;
        }

        let now = Utc::now();
        let posted = PostingStateMachine::post(&entry, caller.actor(), now)?;
        tx.update_journal_entry(&posted, entry.version).await?;
        apply_posting(tx.as_mut(), &posted).await?;
        audit_entry(tx.as_mut(), AuditAction::Post, caller.actor(), Some(&entry), &posted, None, now)
            .await?;
        tx.commit().await?;

        info!(
            tenant_id = %posted.tenant_id,
            entry_id = %posted.id,
            period_id = %posted.fiscal_period_id,
            "Journal entry posted"
        );
        Ok(posted)
    }

    /// Reverses a POSTED entry by posting its mirror dated `reversal_date`.
    ///
    /// The original's open items close with it.
    ///
    /// # Errors
    ///
    /// - `Validation` for an empty reason or a reversal date in a closed period
    /// - `State` outside POSTED or for an FX revaluation entry
    /// - `Conflict` on a stale version
    pub async fn reverse_journal_entry(
        &self,
        caller: Caller,
        id: JournalEntryId,
        reversal_date: NaiveDate,
        reason: &str,
        expected_version: Option<i64>,
    ) -> GlResult<Reversed> {
        let mut tx = self.store.begin(caller.tenant_id).await?;
        let original = load_entry(tx.as_mut(), id).await?;
        PostingStateMachine::check_version(&original, expected_version)?;
        PostingStateMachine::ensure_reversible(&original)?;
        if !PostingStateMachine::is_valid_transition(original.status, JournalStatus::Reversed) {
            return Err(PostingError::InvalidTransition {
                from: original.status,
                action: PostingAction::Reverse.as_str(),
            }
            .into());
        }

        let periods = &self.collaborators.periods;
        let period = periods
            .period_for_date(caller.tenant_id, reversal_date)
            .await?
            .ok_or_else(|| GlError::not_found("fiscal_period", reversal_date))?;
        if !periods
            .is_open_for_posting(caller.tenant_id, period, reversal_date)
            .await?
        {
            return Err(JournalValidationError::ClosedPeriod {
                period,
                date: reversal_date,
            }
            .into());
        }

        let now = Utc::now();
        let reversal = ReversalService::build_reversal(
            &ReversalInput {
                original: &original,
                reversal_date,
                fiscal_period_id: period,
                reason: reason.to_string(),
                actor: caller.actor(),
            },
            now,
        );
        let reversed =
            PostingStateMachine::reverse(&original, reversal.id, reason, caller.actor(), now)?;

        tx.insert_journal_entry(&reversal).await?;
        apply_posting(tx.as_mut(), &reversal).await?;
        tx.update_journal_entry(&reversed, original.version).await?;
        for item in tx.open_items_for_entry(original.id).await? {
            if item.is_open() {
                let mut closed = item.clone();
                closed.settled_at = Some(now);
                closed.version += 1;
                tx.update_open_item(&closed, item.version).await?;
            }
        }

        audit_entry(tx.as_mut(), AuditAction::Create, caller.actor(), None, &reversal, Some(reason), now)
            .await?;
        audit_entry(tx.as_mut(), AuditAction::Post, caller.actor(), None, &reversal, Some(reason), now)
            .await?;
        audit_entry(
            tx.as_mut(),
            AuditAction::Reverse,
            caller.actor(),
            Some(&original),
            &reversed,
            Some(reason),
            now,
        )
        .await?;
        tx.commit().await?;

        info!(
            tenant_id = %reversed.tenant_id,
            entry_id = %reversed.id,
            reversal_id = %reversal.id,
            "Journal entry reversed"
        );
        Ok(Reversed {
            original: reversed,
            reversal,
        })
    }

    /// Voids an entry that was never posted. A pending entry's open request
    /// is recalled in the same unit of work.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty reason, `State` from POSTED or a terminal
    /// status, `Conflict` on a stale version.
    pub async fn void_journal_entry(
        &self,
        caller: Caller,
        id: JournalEntryId,
        reason: &str,
        expected_version: Option<i64>,
    ) -> GlResult<JournalEntry> {
        let mut tx = self.store.begin(caller.tenant_id).await?;
        let entry = load_entry(tx.as_mut(), id).await?;
        PostingStateMachine::check_version(&entry, expected_version)?;

        let now = Utc::now();
        let voided = PostingStateMachine::void(&entry, reason, caller.actor(), now)?;

        if entry.status == JournalStatus::PendingApproval
            && let Some(request) = tx
                .open_request_for(JOURNAL_DOCUMENT, entry.id.into_inner())
                .await?
        {
            let transition = ApprovalEngine::recall(&request, caller.actor(), reason, now)?;
            tx.update_approval_request(&transition.request, request.version)
                .await?;
            record_history(tx.as_mut(), &transition.history).await?;
        }

        tx.update_journal_entry(&voided, entry.version).await?;
        audit_entry(
            tx.as_mut(),
            AuditAction::Void,
            caller.actor(),
            Some(&entry),
            &voided,
            Some(reason),
            now,
        )
        .await?;
        tx.commit().await?;

        info!(
            tenant_id = %voided.tenant_id,
            entry_id = %voided.id,
            from = %entry.status,
            "Journal entry voided"
        );
        Ok(voided)
    }

    /// The submitter withdraws a PENDING_APPROVAL entry; it returns to DRAFT
    /// and its request becomes RECALLED.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty reason, `State` outside PENDING_APPROVAL,
    /// `Permission` for anyone but the submitter, `Conflict` on a stale
    /// version.
    pub async fn recall_journal_entry(
        &self,
        caller: Caller,
        id: JournalEntryId,
        reason: &str,
        expected_version: Option<i64>,
    ) -> GlResult<JournalEntry> {
        let mut tx = self.store.begin(caller.tenant_id).await?;
        let entry = load_entry(tx.as_mut(), id).await?;
        PostingStateMachine::check_version(&entry, expected_version)?;

        let request_id = match (entry.status, entry.approval_request_id) {
            (JournalStatus::PendingApproval, Some(request_id)) => request_id,
            _ => {
                return Err(PostingError::InvalidTransition {
                    from: entry.status,
                    action: PostingAction::Recall.as_str(),
                }
                .into());
            }
        };
        let request = tx
            .approval_request(request_id)
            .await?
            .ok_or_else(|| GlError::not_found("approval_request", request_id))?;

        let now = Utc::now();
        let recalled =
            PostingStateMachine::recall(&entry, request.submitted_by, caller.user_id, reason, now)?;
        let transition = ApprovalEngine::recall(&request, caller.actor(), reason, now)?;

        tx.update_approval_request(&transition.request, request.version)
            .await?;
        record_history(tx.as_mut(), &transition.history).await?;
        tx.update_journal_entry(&recalled, entry.version).await?;
        audit_entry(
            tx.as_mut(),
            AuditAction::Recall,
            caller.actor(),
            Some(&entry),
            &recalled,
            Some(reason),
            now,
        )
        .await?;
        tx.commit().await?;

        info!(
            tenant_id = %recalled.tenant_id,
            entry_id = %recalled.id,
            request_id = %request.id,
            "Journal entry recalled"
        );
        Ok(recalled)
    }

    /// Stores a generated revaluation or settlement entry directly as POSTED.
    pub(super) async fn post_generated_entry(
        &self,
        tx: &mut dyn LedgerTx,
        draft: JournalEntryDraft,
        actor: Actor,
    ) -> GlResult<JournalEntry> {
        let validated = self.validate_draft(&draft).await?;
        let now = Utc::now();
        let entry = JournalEntry::new_draft(draft, validated.lines, self.policy.base_currency, now);
        let posted = PostingStateMachine::post_generated(&entry, actor, now)?;

        tx.insert_journal_entry(&posted).await?;
        apply_posting(tx, &posted).await?;
        audit_entry(tx, AuditAction::Create, actor, None, &entry, None, now).await?;
        audit_entry(tx, AuditAction::Post, actor, Some(&entry), &posted, None, now).await?;
        Ok(posted)
    }
}
