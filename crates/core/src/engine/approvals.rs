//! Approval decisions, workflow definitions and the escalation sweep.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use ledgerline_shared::types::{Actor, ApprovalRequestId, JournalEntryId, TenantId, UserId};

use super::{Caller, GlEngine, JOURNAL_DOCUMENT, append_audit, apply_posting, audit_entry, record_history};
use crate::approval::{
    ActOutcome, ApprovalAction, ApprovalEngine, ApprovalHistoryEntry, ApprovalRequest,
    ApprovalStatus, ApprovalWorkflow, Approvers, EscalationKind, IdentitySnapshot,
};
use crate::audit::{AuditAction, AuditEntityType, AuditEvent, AuditRecorder};
use crate::error::{GlError, GlResult};
use crate::journal::{JournalEntry, JournalStatus};
use crate::ports::LedgerTx;
use crate::posting::PostingStateMachine;

const DEFAULT_REJECTION: &str = "approval request rejected";

/// Counters for one escalation sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Open requests evaluated.
    pub examined: usize,
    /// Requests that passed their expiry.
    pub expired: usize,
    /// Steps approved automatically.
    pub auto_approved: usize,
    /// Requests rejected automatically.
    pub auto_rejected: usize,
    /// Steps widened to more approvers.
    pub escalated: usize,
    /// Steps flagged only.
    pub notified: usize,
    /// Requests whose evaluation failed and rolled back.
    pub failed: usize,
}

impl SweepReport {
    fn count(&mut self, kind: EscalationKind) {
        match kind {
            EscalationKind::Expired => self.expired += 1,
            EscalationKind::AutoApproved => self.auto_approved += 1,
            EscalationKind::AutoRejected => self.auto_rejected += 1,
            EscalationKind::Escalated => self.escalated += 1,
            EscalationKind::Notified => self.notified += 1,
        }
    }

    /// Requests the sweep changed.
    #[must_use]
    pub const fn changed(&self) -> usize {
        self.expired + self.auto_approved + self.auto_rejected + self.escalated + self.notified
    }
}

async fn load_request(tx: &mut dyn LedgerTx, id: ApprovalRequestId) -> GlResult<ApprovalRequest> {
    tx.approval_request(id)
        .await?
        .ok_or_else(|| GlError::not_found("approval_request", id))
}

impl GlEngine {
    /// Approves the current step of a request.
    ///
    /// When the approval completes the request, the journal entry moves to
    /// APPROVED and, under auto-post, to POSTED in the same unit of work.
    /// A repeated or late approval on a still-open request is a no-op.
    ///
    /// # Errors
    ///
    /// `Conflict` on a terminal request, `Permission` for an ineligible
    /// approver.
    pub async fn approve_request(
        &self,
        caller: Caller,
        request_id: ApprovalRequestId,
        notes: Option<String>,
    ) -> GlResult<ApprovalRequest> {
        self.decide(caller, request_id, ApprovalAction::Approve { notes })
            .await
    }

    /// Rejects a request; the entry returns to an editable state.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty reason, `Conflict` on a terminal request,
    /// `Permission` for an ineligible approver.
    pub async fn reject_request(
        &self,
        caller: Caller,
        request_id: ApprovalRequestId,
        reason: String,
    ) -> GlResult<ApprovalRequest> {
        self.decide(caller, request_id, ApprovalAction::Reject { reason })
            .await
    }

    /// Hands the caller's pending decision to another user.
    ///
    /// # Errors
    ///
    /// `Validation` when delegating to oneself or a co-approver, `Conflict`
    /// on a terminal request, `Permission` for an ineligible approver.
    pub async fn delegate_request(
        &self,
        caller: Caller,
        request_id: ApprovalRequestId,
        to: UserId,
        reason: Option<String>,
    ) -> GlResult<ApprovalRequest> {
        self.decide(caller, request_id, ApprovalAction::Delegate { to, reason })
            .await
    }

    /// Loads a request.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id.
    pub async fn get_approval_request(
        &self,
        caller: Caller,
        request_id: ApprovalRequestId,
    ) -> GlResult<ApprovalRequest> {
        let mut tx = self.store.begin(caller.tenant_id).await?;
        load_request(tx.as_mut(), request_id).await
    }

    /// History of a request, oldest first.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id.
    pub async fn approval_history(
        &self,
        caller: Caller,
        request_id: ApprovalRequestId,
    ) -> GlResult<Vec<ApprovalHistoryEntry>> {
        let mut tx = self.store.begin(caller.tenant_id).await?;
        load_request(tx.as_mut(), request_id).await?;
        Ok(tx.history(request_id).await?)
    }

    /// Validates and stores a workflow definition.
    ///
    /// # Errors
    ///
    /// `Validation` for an inconsistent definition, `Permission` unless the
    /// caller holds the admin role.
    pub async fn define_workflow(
        &self,
        caller: Caller,
        mut workflow: ApprovalWorkflow,
    ) -> GlResult<ApprovalWorkflow> {
        self.ensure_admin(caller.tenant_id, caller.actor(), "define approval workflows")
            .await?;
        workflow.tenant_id = caller.tenant_id;
        ApprovalEngine::validate_workflow(&workflow)?;

        let now = Utc::now();
        let mut tx = self.store.begin(caller.tenant_id).await?;
        tx.insert_workflow(&workflow).await?;
        let entry = AuditRecorder::record(
            &AuditEvent {
                tenant_id: caller.tenant_id,
                entity_type: AuditEntityType::ApprovalWorkflow,
                entity_id: workflow.id.into_inner(),
                action: AuditAction::Define,
                actor: caller.actor(),
                previous: None::<&ApprovalWorkflow>,
                new: Some(&workflow),
                reason: None,
            },
            now,
        )?;
        append_audit(tx.as_mut(), entry).await?;
        tx.commit().await?;

        info!(
            tenant_id = %workflow.tenant_id,
            workflow_id = %workflow.id,
            document_type = %workflow.document_type,
            steps = workflow.steps.len(),
            "Approval workflow defined"
        );
        Ok(workflow)
    }

    /// Evaluates expiry and escalation windows of every open request.
    ///
    /// Each request is its own unit of work; one failing request is logged
    /// and counted without stopping the sweep. Re-running the sweep at the
    /// same instant changes nothing.
    ///
    /// # Errors
    ///
    /// Store failures while listing tenants or requests.
    pub async fn run_escalation_sweep(
        &self,
        now: DateTime<Utc>,
        tenant: Option<TenantId>,
    ) -> GlResult<SweepReport> {
        let tenants = match tenant {
            Some(tenant) => vec![tenant],
            None => self.store.tenants_with_open_requests().await?,
        };

        let mut report = SweepReport::default();
        for tenant in tenants {
            let requests = {
                let mut tx = self.store.begin(tenant).await?;
                tx.open_requests(self.policy.escalation_batch_limit).await?
            };
            if requests.is_empty() {
                continue;
            }
            let identities = match self.collaborators.identities.snapshot(tenant).await {
                Ok(identities) => identities,
                Err(e) => {
                    error!(tenant_id = %tenant, error = %e, "Identity lookup failed, skipping tenant");
                    report.examined += requests.len();
                    report.failed += requests.len();
                    continue;
                }
            };

            for request in &requests {
                report.examined += 1;
                match self.escalate_one(tenant, request.id, &identities, now).await {
                    Ok(Some(kind)) => report.count(kind),
                    Ok(None) => {}
                    Err(e) => {
                        report.failed += 1;
                        error!(
                            tenant_id = %tenant,
                            request_id = %request.id,
                            code = e.error_code(),
                            error = %e,
                            "Escalation failed, rolled back"
                        );
                    }
                }
            }
        }

        info!(
            examined = report.examined,
            changed = report.changed(),
            failed = report.failed,
            "Escalation sweep finished"
        );
        Ok(report)
    }

    async fn decide(
        &self,
        caller: Caller,
        request_id: ApprovalRequestId,
        action: ApprovalAction,
    ) -> GlResult<ApprovalRequest> {
        let reason = match &action {
            ApprovalAction::Reject { reason } => Some(reason.clone()),
            ApprovalAction::Approve { .. } | ApprovalAction::Delegate { .. } => None,
        };

        let mut tx = self.store.begin(caller.tenant_id).await?;
        let request = load_request(tx.as_mut(), request_id).await?;
        let identities = self.collaborators.identities.snapshot(caller.tenant_id).await?;
        let now = Utc::now();

        let outcome = ApprovalEngine::act(
            &request,
            caller.user_id,
            action,
            Approvers {
                resolver: self.resolver.as_ref(),
                identities: &identities,
            },
            now,
        )?;
        let transition = match outcome {
            ActOutcome::Applied(transition) => transition,
            ActOutcome::AlreadySatisfied => {
                info!(
                    tenant_id = %request.tenant_id,
                    request_id = %request.id,
                    user_id = %caller.user_id,
                    "Approval already satisfied, nothing to do"
                );
                return Ok(request);
            }
        };
        let next = transition.request;

        tx.update_approval_request(&next, request.version).await?;
        record_history(tx.as_mut(), &transition.history).await?;
        self.bind_entry(tx.as_mut(), &next, caller.actor(), reason.as_deref(), now)
            .await?;
        tx.commit().await?;

        info!(
            tenant_id = %next.tenant_id,
            request_id = %next.id,
            user_id = %caller.user_id,
            status = %next.status,
            step = next.current_step,
            "Approval request updated"
        );
        self.notify_request(&next, false);
        Ok(next)
    }

    async fn escalate_one(
        &self,
        tenant: TenantId,
        request_id: ApprovalRequestId,
        identities: &IdentitySnapshot,
        now: DateTime<Utc>,
    ) -> GlResult<Option<EscalationKind>> {
        let mut tx = self.store.begin(tenant).await?;
        let request = load_request(tx.as_mut(), request_id).await?;
        let Some(escalation) = ApprovalEngine::escalate(
            &request,
            Approvers {
                resolver: self.resolver.as_ref(),
                identities,
            },
            now,
        )?
        else {
            return Ok(None);
        };

        let transition = escalation.transition;
        let next = transition.request;
        let reason = transition.history.last().and_then(|h| h.reason.clone());

        tx.update_approval_request(&next, request.version).await?;
        record_history(tx.as_mut(), &transition.history).await?;
        self.bind_entry(tx.as_mut(), &next, Actor::System, reason.as_deref(), now)
            .await?;
        tx.commit().await?;

        info!(
            tenant_id = %tenant,
            request_id = %next.id,
            status = %next.status,
            kind = ?escalation.kind,
            "Approval request escalated"
        );
        let escalated = matches!(
            escalation.kind,
            EscalationKind::Escalated | EscalationKind::Notified
        );
        self.notify_request(&next, escalated);
        Ok(Some(escalation.kind))
    }

    /// Carries a terminal request's outcome over to its journal entry.
    async fn bind_entry(
        &self,
        tx: &mut dyn LedgerTx,
        request: &ApprovalRequest,
        actor: Actor,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> GlResult<()> {
        if request.document.doc_type != JOURNAL_DOCUMENT || !request.status.is_terminal() {
            return Ok(());
        }
        let id = JournalEntryId::from_uuid(request.document.id);
        let entry = tx
            .journal_entry(id)
            .await?
            .ok_or_else(|| GlError::not_found("journal_entry", id))?;

        let expected = entry.version;
        let next = self
            .follow_request(tx, request, entry, actor, reason, now)
            .await?;
        if next.version != expected {
            tx.update_journal_entry(&next, expected).await?;
        }
        Ok(())
    }

    /// Moves a PENDING_APPROVAL entry linked to `request` to match the
    /// request's outcome, auditing each step. Entries not waiting on this
    /// request come back unchanged.
    pub(super) async fn follow_request(
        &self,
        tx: &mut dyn LedgerTx,
        request: &ApprovalRequest,
        entry: JournalEntry,
        actor: Actor,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> GlResult<JournalEntry> {
        if entry.status != JournalStatus::PendingApproval
            || entry.approval_request_id != Some(request.id)
        {
            return Ok(entry);
        }

        match request.status {
            ApprovalStatus::Approved => {
                let actor = request.completed_by.unwrap_or(actor);
                let approved = PostingStateMachine::approve(&entry, actor, now)?;
                audit_entry(tx, AuditAction::Approve, actor, Some(&entry), &approved, None, now)
                    .await?;
                if !self.policy.auto_post_on_approval {
                    return Ok(approved);
                }

                self.ensure_period_open(&approved).await?;
                let posted = PostingStateMachine::post(&approved, actor, now)?;
                apply_posting(tx, &posted).await?;
                audit_entry(tx, AuditAction::Post, actor, Some(&approved), &posted, None, now)
                    .await?;
                Ok(posted)
            }
            ApprovalStatus::Rejected => {
                let actor = request.completed_by.unwrap_or(actor);
                let reason = reason.unwrap_or(DEFAULT_REJECTION);
                let rejected = PostingStateMachine::reject(&entry, reason, actor, now)?;
                audit_entry(
                    tx,
                    AuditAction::Reject,
                    actor,
                    Some(&entry),
                    &rejected,
                    Some(reason),
                    now,
                )
                .await?;
                Ok(rejected)
            }
            ApprovalStatus::Expired => {
                let expired = PostingStateMachine::expire(&entry, now)?;
                audit_entry(
                    tx,
                    AuditAction::Expire,
                    Actor::System,
                    Some(&entry),
                    &expired,
                    reason,
                    now,
                )
                .await?;
                Ok(expired)
            }
            ApprovalStatus::Pending
            | ApprovalStatus::Escalated
            | ApprovalStatus::Delegated
            | ApprovalStatus::Recalled => Ok(entry),
        }
    }
}
