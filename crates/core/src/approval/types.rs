//! Approval workflow domain types.
//!
//! Workflows are configuration; requests are the per-document runtime
//! state. A request snapshots the steps that applied at submission so that
//! later workflow edits never change an in-flight approval.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use ledgerline_shared::types::{
    Actor, ApprovalHistoryId, ApprovalRequestId, ApprovalStepId, ApprovalWorkflowId,
    CurrencyCode, TenantId, UserId,
};

/// How a workflow's steps are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    /// First eligible approval completes a step.
    Any,
    /// Every resolved approver (or `required_approvals`) must approve.
    All,
    /// Steps run in order, approvers resolved when a step activates.
    Sequential,
    /// Steps filtered by amount band; none applicable means no approval.
    Threshold,
    /// Amount-banded steps, each needing all of its approvers.
    Matrix,
}

impl RuleType {
    /// Returns the string representation of the rule type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::All => "all",
            Self::Sequential => "sequential",
            Self::Threshold => "threshold",
            Self::Matrix => "matrix",
        }
    }

    /// Parses a rule type from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "any" => Some(Self::Any),
            "all" => Some(Self::All),
            "sequential" => Some(Self::Sequential),
            "threshold" => Some(Self::Threshold),
            "matrix" => Some(Self::Matrix),
            _ => None,
        }
    }

    /// Whether steps are filtered by the document amount.
    #[must_use]
    pub const fn is_amount_banded(&self) -> bool {
        matches!(self, Self::Threshold | Self::Matrix)
    }

    /// Approvals needed to complete a step with `resolved` approvers.
    #[must_use]
    pub fn quorum(&self, required_approvals: Option<u32>, resolved: u32) -> u32 {
        let wanted = match self {
            Self::Any => 1,
            Self::All | Self::Matrix => required_approvals.unwrap_or(resolved),
            Self::Sequential | Self::Threshold => required_approvals.unwrap_or(1),
        };
        wanted.clamp(1, resolved.max(1))
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the approvers of a step are found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApproverSpec {
    /// Explicitly named users.
    Users {
        /// The named approvers.
        users: Vec<UserId>,
    },
    /// Every active member holding a role.
    Role {
        /// Role name.
        role: String,
    },
    /// The submitter's manager chain, up to `levels` levels.
    ManagerOfSubmitter {
        /// How far up the chain approvers are taken from.
        levels: u8,
    },
    /// A named resolver registered with the approver resolver.
    Dynamic {
        /// Registered resolver name.
        resolver: String,
    },
}

/// What the escalation sweep does with an overdue step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum EscalationAction {
    /// Complete the step as if its quorum were met.
    AutoApprove,
    /// Reject the whole request.
    AutoReject,
    /// Add a wider approver set to the step.
    EscalateTo {
        /// Additional approvers.
        approvers: ApproverSpec,
    },
    /// Only mark the request escalated and notify.
    NotifyOnly,
}

impl EscalationAction {
    /// Returns the string representation of the action.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AutoApprove => "auto_approve",
            Self::AutoReject => "auto_reject",
            Self::EscalateTo { .. } => "escalate_to",
            Self::NotifyOnly => "notify_only",
        }
    }
}

/// One step of a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStep {
    /// Step id.
    pub id: ApprovalStepId,
    /// Execution order, unique within the workflow.
    pub step_order: u32,
    /// Display name.
    pub name: String,
    /// Approver resolution.
    pub approvers: ApproverSpec,
    /// Approvals needed (rule dependent default).
    #[serde(default)]
    pub required_approvals: Option<u32>,
    /// Inclusive lower amount bound for banded rules.
    #[serde(default)]
    pub min_amount: Option<Decimal>,
    /// Exclusive upper amount bound for banded rules.
    #[serde(default)]
    pub max_amount: Option<Decimal>,
    /// Currency the amount band is expressed in.
    #[serde(default)]
    pub currency: Option<CurrencyCode>,
    /// Hours before the escalation sweep acts on this step.
    #[serde(default)]
    pub escalation_hours: Option<u32>,
    /// Escalation behaviour (notify-only when absent).
    #[serde(default)]
    pub escalation_action: Option<EscalationAction>,
}

fn in_band(
    amount: Decimal,
    currency: CurrencyCode,
    min: Option<Decimal>,
    max: Option<Decimal>,
    band_currency: Option<CurrencyCode>,
) -> bool {
    band_currency.is_none_or(|c| c == currency)
        && min.is_none_or(|min| amount >= min)
        && max.is_none_or(|max| amount < max)
}

impl ApprovalStep {
    /// Whether `[min_amount, max_amount)` and currency admit the document.
    #[must_use]
    pub fn applies_to(&self, document: &DocumentRef) -> bool {
        in_band(
            document.amount,
            document.currency,
            self.min_amount,
            self.max_amount,
            self.currency,
        )
    }
}

/// A workflow definition for one document type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalWorkflow {
    /// Workflow id.
    pub id: ApprovalWorkflowId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Display name.
    pub name: String,
    /// Document type this workflow gates (`"journal_entry"`, ...).
    pub document_type: String,
    /// Step evaluation rule.
    pub rule_type: RuleType,
    /// Inclusive lower bound of documents this workflow applies to.
    #[serde(default)]
    pub min_amount: Option<Decimal>,
    /// Exclusive upper bound of documents this workflow applies to.
    #[serde(default)]
    pub max_amount: Option<Decimal>,
    /// Currency of the applicability band.
    #[serde(default)]
    pub currency: Option<CurrencyCode>,
    /// Selection priority; lower wins.
    pub priority: i32,
    /// Inactive workflows are never selected.
    pub is_active: bool,
    /// Hours after submission before a request expires.
    #[serde(default)]
    pub expiry_hours: Option<u32>,
    /// Steps in any order; evaluated by `step_order`.
    pub steps: Vec<ApprovalStep>,
}

impl ApprovalWorkflow {
    /// Whether this workflow is eligible for the document.
    #[must_use]
    pub fn matches(&self, document: &DocumentRef) -> bool {
        self.is_active
            && self.document_type == document.doc_type
            && in_band(
                document.amount,
                document.currency,
                self.min_amount,
                self.max_amount,
                self.currency,
            )
    }

    /// Steps that apply to the document, in `step_order`.
    #[must_use]
    pub fn applicable_steps(&self, document: &DocumentRef) -> Vec<ApprovalStep> {
        let mut steps: Vec<ApprovalStep> = self
            .steps
            .iter()
            .filter(|s| !self.rule_type.is_amount_banded() || s.applies_to(document))
            .cloned()
            .collect();
        steps.sort_by_key(|s| s.step_order);
        steps
    }
}

/// Opaque reference to the document being approved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    /// Document type.
    pub doc_type: String,
    /// Document id.
    pub id: Uuid,
    /// Amount the bands are evaluated against.
    pub amount: Decimal,
    /// Currency of `amount`.
    pub currency: CurrencyCode,
}

/// Approval request lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Waiting on the current step.
    Pending,
    /// Fully approved (terminal).
    Approved,
    /// Rejected (terminal).
    Rejected,
    /// Past a step's escalation window, still open.
    Escalated,
    /// Withdrawn by the submitter (terminal).
    Recalled,
    /// Past its expiry (terminal).
    Expired,
    /// A decision was delegated, still open.
    Delegated,
}

impl ApprovalStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Escalated => "escalated",
            Self::Recalled => "recalled",
            Self::Expired => "expired",
            Self::Delegated => "delegated",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "escalated" => Some(Self::Escalated),
            "recalled" => Some(Self::Recalled),
            "expired" => Some(Self::Expired),
            "delegated" => Some(Self::Delegated),
            _ => None,
        }
    }

    /// Terminal requests accept no further state changes.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Approved | Self::Rejected | Self::Recalled | Self::Expired
        )
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A delegated decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    /// Step the delegation belongs to.
    pub step_order: u32,
    /// Delegating approver.
    pub from: UserId,
    /// Delegate.
    pub to: UserId,
    /// Optional reason.
    pub reason: Option<String>,
    /// When it happened.
    pub at: DateTime<Utc>,
}

/// Runtime state of an activated step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepProgress {
    /// Step being tracked.
    pub step_order: u32,
    /// Approvers resolved on activation (plus escalation additions).
    pub approvers: Vec<UserId>,
    /// Approvals needed.
    pub required: u32,
    /// Users who approved, in order.
    pub approvals: Vec<UserId>,
    /// When the step became current.
    pub activated_at: DateTime<Utc>,
    /// When the escalation sweep will act.
    pub due_at: Option<DateTime<Utc>>,
    /// Set once the escalation action has been applied.
    pub escalated: bool,
    /// Set when the quorum was met.
    pub completed_at: Option<DateTime<Utc>>,
}

impl StepProgress {
    /// Users currently allowed to decide: resolved approvers with
    /// delegations applied.
    #[must_use]
    pub fn eligible(&self, delegations: &[Delegation]) -> Vec<UserId> {
        let mut eligible = self.approvers.clone();
        for delegation in delegations.iter().filter(|d| d.step_order == self.step_order) {
            eligible.retain(|u| *u != delegation.from);
            if !eligible.contains(&delegation.to) {
                eligible.push(delegation.to);
            }
        }
        eligible
    }

    /// Whether the step's quorum has been met.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// One workflow applied to one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Request id.
    pub id: ApprovalRequestId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Selected workflow; `None` for an automatic zero-step request.
    pub workflow_id: Option<ApprovalWorkflowId>,
    /// Rule of the selected workflow.
    pub rule_type: RuleType,
    /// The document being approved.
    pub document: DocumentRef,
    /// Lifecycle status.
    pub status: ApprovalStatus,
    /// 1-based position of the current step (0 when there are no steps).
    pub current_step: u32,
    /// Steps that applied at submission, in order.
    pub steps: Vec<ApprovalStep>,
    /// Progress of every step activated so far.
    pub progress: Vec<StepProgress>,
    /// Delegation chain across all steps.
    pub delegations: Vec<Delegation>,
    /// Submitter.
    pub submitted_by: Actor,
    /// Submission time.
    pub submitted_at: DateTime<Utc>,
    /// Who completed the request.
    pub completed_by: Option<Actor>,
    /// When the request became terminal.
    pub completed_at: Option<DateTime<Utc>>,
    /// Due time of the current step.
    pub due_at: Option<DateTime<Utc>>,
    /// When the whole request expires.
    pub expires_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency version.
    pub version: i64,
}

impl ApprovalRequest {
    /// Number of steps snapshotted at submission.
    #[must_use]
    pub fn total_steps(&self) -> u32 {
        u32::try_from(self.steps.len()).unwrap_or(u32::MAX)
    }

    /// Configuration of the current step.
    #[must_use]
    pub fn current_step_config(&self) -> Option<&ApprovalStep> {
        let index = usize::try_from(self.current_step).ok()?.checked_sub(1)?;
        self.steps.get(index)
    }

    /// Progress of the current step.
    #[must_use]
    pub fn current_progress(&self) -> Option<&StepProgress> {
        let order = self.current_step_config()?.step_order;
        self.progress.iter().find(|p| p.step_order == order)
    }

    /// Users allowed to decide the current step.
    #[must_use]
    pub fn eligible_approvers(&self) -> Vec<UserId> {
        self.current_progress()
            .map(|p| p.eligible(&self.delegations))
            .unwrap_or_default()
    }

    /// Every user who has approved any step.
    #[must_use]
    pub fn prior_approvers(&self) -> Vec<UserId> {
        self.progress
            .iter()
            .flat_map(|p| p.approvals.iter().copied())
            .collect()
    }

    /// Compact before/after view recorded on history and audit.
    #[must_use]
    pub fn snapshot(&self) -> ApprovalSnapshot {
        ApprovalSnapshot {
            status: self.status,
            current_step: self.current_step,
            total_steps: self.total_steps(),
            approvals: self
                .current_progress()
                .map_or(0, |p| u32::try_from(p.approvals.len()).unwrap_or(u32::MAX)),
            version: self.version,
        }
    }
}

/// Audit view of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalSnapshot {
    /// Status.
    pub status: ApprovalStatus,
    /// Current step position.
    pub current_step: u32,
    /// Total steps.
    pub total_steps: u32,
    /// Approvals recorded on the current step.
    pub approvals: u32,
    /// Version.
    pub version: i64,
}

/// A decision submitted to `act`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ApprovalAction {
    /// Approve the current step.
    Approve {
        /// Optional notes.
        #[serde(default)]
        notes: Option<String>,
    },
    /// Reject the request.
    Reject {
        /// Mandatory reason.
        reason: String,
    },
    /// Hand the decision to another user.
    Delegate {
        /// The delegate.
        to: UserId,
        /// Optional reason.
        #[serde(default)]
        reason: Option<String>,
    },
}

/// Kind of an approval history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    /// Request created.
    Submit,
    /// A user approved.
    Approve,
    /// A user rejected.
    Reject,
    /// A user delegated.
    Delegate,
    /// The submitter withdrew the document.
    Recall,
    /// Escalation widened or flagged the step.
    Escalate,
    /// Approved without a human decision.
    AutoApprove,
    /// Rejected by escalation.
    AutoReject,
    /// Request expired.
    Expire,
}

impl HistoryAction {
    /// Returns the string representation of the action.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Delegate => "delegate",
            Self::Recall => "recall",
            Self::Escalate => "escalate",
            Self::AutoApprove => "auto_approve",
            Self::AutoReject => "auto_reject",
            Self::Expire => "expire",
        }
    }

    /// Parses an action from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "submit" => Some(Self::Submit),
            "approve" => Some(Self::Approve),
            "reject" => Some(Self::Reject),
            "delegate" => Some(Self::Delegate),
            "recall" => Some(Self::Recall),
            "escalate" => Some(Self::Escalate),
            "auto_approve" => Some(Self::AutoApprove),
            "auto_reject" => Some(Self::AutoReject),
            "expire" => Some(Self::Expire),
            _ => None,
        }
    }
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only record of one action on a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalHistoryEntry {
    /// Entry id.
    pub id: ApprovalHistoryId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Request acted on.
    pub request_id: ApprovalRequestId,
    /// Step position when the action happened.
    pub step: u32,
    /// Who acted.
    pub actor: Actor,
    /// What happened.
    pub action: HistoryAction,
    /// State before.
    pub previous: Option<ApprovalSnapshot>,
    /// State after.
    pub new: ApprovalSnapshot,
    /// Delegate, on delegation.
    pub delegate_to: Option<UserId>,
    /// Reason or notes.
    pub reason: Option<String>,
    /// When.
    pub created_at: DateTime<Utc>,
}

impl ApprovalHistoryEntry {
    /// Records a transition from `before` to `after`.
    #[must_use]
    pub fn record(
        before: Option<&ApprovalRequest>,
        after: &ApprovalRequest,
        actor: Actor,
        action: HistoryAction,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ApprovalHistoryId::new(),
            tenant_id: after.tenant_id,
            request_id: after.id,
            step: before.map_or(after.current_step, |b| b.current_step),
            actor,
            action,
            previous: before.map(ApprovalRequest::snapshot),
            new: after.snapshot(),
            delegate_to: None,
            reason,
            created_at: now,
        }
    }
}

/// `now + hours`, saturating on overflow.
#[must_use]
pub fn after_hours(now: DateTime<Utc>, hours: u32) -> DateTime<Utc> {
    now.checked_add_signed(Duration::hours(i64::from(hours)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
