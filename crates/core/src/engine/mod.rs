//! The general ledger engine.
//!
//! Binds the pure domain modules to the store and the collaborators. Every
//! mutating operation runs as one unit of work: guard checks, entity writes,
//! approval writes and audit entries commit together or not at all.
//! Notifications go out only after commit and never fail an operation.

mod approvals;
mod entries;
mod fx;
mod policy;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};

use ledgerline_shared::types::{
    Actor, PageRequest, PageResponse, TenantId, UserId,
};

pub use approvals::SweepReport;
pub use entries::{Reversed, Submission};
pub use fx::{RevaluationCommand, SettlementCommand};
pub use policy::LedgerPolicy;

use crate::approval::{
    ApprovalHistoryEntry, ApprovalRequest, ApprovalStatus, ApproverResolver, DirectoryResolver,
    HistoryAction,
};
use crate::audit::{AuditAction, AuditEntityType, AuditEntry, AuditEvent, AuditFilter, AuditRecorder};
use crate::error::{GlError, GlResult};
use crate::fx::OpenItem;
use crate::journal::{
    AccountInfo, AccountRef, JournalEntry, JournalEntryDraft, JournalValidationError,
    JournalValidator, ValidatedEntry,
};
use crate::ports::{
    AccountDirectory, ExchangeRateSource, IdentityProvider, LedgerStore, LedgerTx, Notification,
    NotificationChannel, NotificationEvent, PeriodService,
};

/// Document type under which journal entries are routed for approval.
pub const JOURNAL_DOCUMENT: &str = "journal_entry";

/// The authenticated user and tenant an operation runs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    /// Tenant.
    pub tenant_id: TenantId,
    /// Acting user.
    pub user_id: UserId,
}

impl Caller {
    /// Creates a caller.
    #[must_use]
    pub const fn new(tenant_id: TenantId, user_id: UserId) -> Self {
        Self { tenant_id, user_id }
    }

    /// The caller as an audit actor.
    #[must_use]
    pub const fn actor(&self) -> Actor {
        Actor::User(self.user_id)
    }
}

/// The external services the engine consumes.
#[derive(Clone)]
pub struct Collaborators {
    /// Chart of accounts and subledgers.
    pub accounts: Arc<dyn AccountDirectory>,
    /// Fiscal calendar.
    pub periods: Arc<dyn PeriodService>,
    /// Tenant members.
    pub identities: Arc<dyn IdentityProvider>,
    /// Exchange rates.
    pub rates: Arc<dyn ExchangeRateSource>,
    /// Approval notifications.
    pub notifier: Arc<dyn NotificationChannel>,
}

/// General ledger posting and approval engine.
pub struct GlEngine {
    policy: LedgerPolicy,
    validator: JournalValidator,
    store: Arc<dyn LedgerStore>,
    collaborators: Collaborators,
    resolver: Arc<dyn ApproverResolver>,
}

impl std::fmt::Debug for GlEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlEngine")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl GlEngine {
    /// Creates an engine resolving approvers from the tenant directory.
    #[must_use]
    pub fn new(policy: LedgerPolicy, store: Arc<dyn LedgerStore>, collaborators: Collaborators) -> Self {
        Self {
            validator: JournalValidator::new(policy.tolerance, policy.max_lines),
            policy,
            store,
            collaborators,
            resolver: Arc::new(DirectoryResolver::new()),
        }
    }

    /// Replaces the approver resolver (e.g. to register dynamic rules).
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn ApproverResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Policy in force.
    #[must_use]
    pub const fn policy(&self) -> &LedgerPolicy {
        &self.policy
    }

    /// Searches the audit trail, newest first.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn search_audit_trail(
        &self,
        caller: Caller,
        filter: &AuditFilter,
        page: PageRequest,
    ) -> GlResult<PageResponse<AuditEntry>> {
        Ok(self.store.search_audit(caller.tenant_id, filter, page).await?)
    }

    /// Requires `actor` to hold the configured admin role in the tenant
    /// directory. The system actor (scheduled jobs) always passes.
    async fn ensure_admin(&self, tenant: TenantId, actor: Actor, action: &'static str) -> GlResult<()> {
        let Actor::User(user) = actor else {
            return Ok(());
        };
        let role = &self.policy.admin_role;
        let identities = self.collaborators.identities.snapshot(tenant).await?;
        let allowed = identities
            .member(user)
            .is_some_and(|m| m.active && m.roles.iter().any(|r| r.eq_ignore_ascii_case(role)));
        if allowed {
            return Ok(());
        }
        warn!(tenant_id = %tenant, user_id = %user, action, "Administrative action refused");
        Err(GlError::NotAuthorized {
            user,
            role: role.clone(),
            action,
        })
    }

    /// Asks the fiscal calendar again right before posting. The period may
    /// have closed while the entry waited for approval.
    async fn ensure_period_open(&self, entry: &JournalEntry) -> GlResult<()> {
        let open = self
            .collaborators
            .periods
            .is_open_for_posting(entry.tenant_id, entry.fiscal_period_id, entry.entry_date)
            .await?;
        if open {
            return Ok(());
        }
        warn!(
            tenant_id = %entry.tenant_id,
            entry_id = %entry.id,
            period_id = %entry.fiscal_period_id,
            "Posting refused, period closed"
        );
        Err(JournalValidationError::ClosedPeriod {
            period: entry.fiscal_period_id,
            date: entry.entry_date,
        }
        .into())
    }

    /// Resolves accounts, subledger references and the period, then runs
    /// the validator.
    async fn validate_draft(&self, draft: &JournalEntryDraft) -> GlResult<ValidatedEntry> {
        let tenant = draft.tenant_id;
        let directory = &self.collaborators.accounts;

        let mut accounts: HashMap<AccountRef, Option<AccountInfo>> = HashMap::new();
        for line in &draft.lines {
            if !accounts.contains_key(&line.account) {
                let info = directory.resolve_account(tenant, &line.account).await?;
                accounts.insert(line.account.clone(), info);
            }
        }

        let mut subledgers = HashSet::new();
        for link in draft.lines.iter().filter_map(|l| l.subledger.as_ref()) {
            if !subledgers.contains(link) && directory.subledger_exists(tenant, link).await? {
                subledgers.insert(link.clone());
            }
        }

        let period_open = self
            .collaborators
            .periods
            .is_open_for_posting(tenant, draft.fiscal_period_id, draft.entry_date)
            .await?;

        self.validator
            .validate(
                draft,
                self.policy.base_currency,
                period_open,
                |account| accounts.get(account).cloned().flatten(),
                |link| subledgers.contains(link),
            )
            .map_err(|e| {
                debug!(
                    tenant_id = %tenant,
                    code = e.error_code(),
                    line = ?e.line(),
                    "Journal entry failed validation"
                );
                GlError::from(e)
            })
    }

    /// Notifies the people a request now waits on or concerns.
    fn notify_request(&self, request: &ApprovalRequest, escalated: bool) {
        let submitter: Vec<UserId> = request.submitted_by.user_id().into_iter().collect();
        let (event, recipients) = match request.status {
            ApprovalStatus::Pending | ApprovalStatus::Delegated | ApprovalStatus::Escalated => {
                let event = if escalated {
                    NotificationEvent::Escalated
                } else {
                    NotificationEvent::ApprovalRequired
                };
                (event, request.eligible_approvers())
            }
            ApprovalStatus::Approved => (NotificationEvent::Approved, submitter),
            ApprovalStatus::Rejected => (NotificationEvent::Rejected, submitter),
            ApprovalStatus::Recalled | ApprovalStatus::Expired => return,
        };
        if recipients.is_empty() {
            return;
        }

        let notification = Notification {
            tenant_id: request.tenant_id,
            event,
            request_id: request.id,
            document: request.document.clone(),
            recipients,
        };
        if let Err(e) = self.collaborators.notifier.notify(&notification) {
            warn!(
                tenant_id = %request.tenant_id,
                request_id = %request.id,
                event = event.as_str(),
                error = %e,
                "Notification failed"
            );
        }
    }
}

/// Appends one audit entry; a failure aborts the unit of work.
async fn append_audit(tx: &mut dyn LedgerTx, entry: AuditEntry) -> GlResult<()> {
    if let Err(e) = tx.append_audit(&entry).await {
        error!(
            tenant_id = %entry.tenant_id,
            entity_id = %entry.entity_id,
            action = entry.action.as_str(),
            error = %e,
            "Audit write failed, rolling back"
        );
        return Err(e.into());
    }
    Ok(())
}

/// Audits one journal entry transition.
async fn audit_entry(
    tx: &mut dyn LedgerTx,
    action: AuditAction,
    actor: Actor,
    before: Option<&JournalEntry>,
    after: &JournalEntry,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> GlResult<()> {
    let previous = before.map(JournalEntry::snapshot);
    let new = after.snapshot();
    let entry = AuditRecorder::record(
        &AuditEvent {
            tenant_id: after.tenant_id,
            entity_type: AuditEntityType::JournalEntry,
            entity_id: after.id.into_inner(),
            action,
            actor,
            previous: previous.as_ref(),
            new: Some(&new),
            reason,
        },
        now,
    )?;
    append_audit(tx, entry).await
}

/// Appends approval history and one audit entry per history row.
async fn record_history(tx: &mut dyn LedgerTx, history: &[ApprovalHistoryEntry]) -> GlResult<()> {
    tx.append_history(history).await?;
    for row in history {
        let action = match row.action {
            HistoryAction::Submit => AuditAction::Submit,
            HistoryAction::Approve | HistoryAction::AutoApprove => AuditAction::Approve,
            HistoryAction::Reject | HistoryAction::AutoReject => AuditAction::Reject,
            HistoryAction::Delegate => AuditAction::Delegate,
            HistoryAction::Recall => AuditAction::Recall,
            HistoryAction::Escalate => AuditAction::Escalate,
            HistoryAction::Expire => AuditAction::Expire,
        };
        let entry = AuditRecorder::record(
            &AuditEvent {
                tenant_id: row.tenant_id,
                entity_type: AuditEntityType::ApprovalRequest,
                entity_id: row.request_id.into_inner(),
                action,
                actor: row.actor,
                previous: row.previous.as_ref(),
                new: Some(&row.new),
                reason: row.reason.as_deref(),
            },
            row.created_at,
        )?;
        append_audit(tx, entry).await?;
    }
    Ok(())
}

/// Ledger side effects of a posting: period rollups, and open items for
/// foreign receivable and payable lines of original (non-reversal) entries.
async fn apply_posting(tx: &mut dyn LedgerTx, entry: &JournalEntry) -> GlResult<()> {
    tx.add_period_totals(
        entry.fiscal_period_id,
        entry.totals.base_debit,
        entry.totals.base_credit,
    )
    .await?;

    if entry.reverses_entry_id.is_none() {
        let items: Vec<OpenItem> = entry
            .lines
            .iter()
            .filter_map(|line| OpenItem::from_posted_line(entry, line))
            .collect();
        if !items.is_empty() {
            tx.insert_open_items(&items).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
