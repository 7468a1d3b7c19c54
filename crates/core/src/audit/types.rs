//! Audit trail entry types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use ledgerline_shared::types::{Actor, AuditEntryId, TenantId};

/// Kind of record an audit entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEntityType {
    /// A journal entry.
    JournalEntry,
    /// An approval request.
    ApprovalRequest,
    /// An approval workflow definition.
    ApprovalWorkflow,
    /// An FX revaluation or settlement batch.
    FxBatch,
    /// An open foreign-currency item.
    OpenItem,
}

impl AuditEntityType {
    /// Returns the string representation of the entity type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::JournalEntry => "journal_entry",
            Self::ApprovalRequest => "approval_request",
            Self::ApprovalWorkflow => "approval_workflow",
            Self::FxBatch => "fx_batch",
            Self::OpenItem => "open_item",
        }
    }

    /// Parses an entity type from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "journal_entry" => Some(Self::JournalEntry),
            "approval_request" => Some(Self::ApprovalRequest),
            "approval_workflow" => Some(Self::ApprovalWorkflow),
            "fx_batch" => Some(Self::FxBatch),
            "open_item" => Some(Self::OpenItem),
            _ => None,
        }
    }
}

impl fmt::Display for AuditEntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State-changing action recorded on the trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Record created.
    Create,
    /// Draft contents replaced.
    Update,
    /// Submitted for approval.
    Submit,
    /// Approved.
    Approve,
    /// Rejected.
    Reject,
    /// Posted to the ledger.
    Post,
    /// Reversed by a paired entry.
    Reverse,
    /// Voided.
    Void,
    /// Withdrawn by the submitter.
    Recall,
    /// Decision handed to another approver.
    Delegate,
    /// Escalation action applied.
    Escalate,
    /// Expired without a decision.
    Expire,
    /// Workflow defined.
    Define,
    /// FX revaluation batch posted.
    Revalue,
    /// FX position settled.
    Settle,
}

impl AuditAction {
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
            Self::Delegate => "delegate",
            Self::Escalate => "escalate",
            Self::Expire => "expire",
            Self::Define => "define",
            Self::Revalue => "revalue",
            Self::Settle => "settle",
        }
    }

    /// Parses an action from a string.
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.to_lowercase().as_str() {
            "create" => Self::Create,
            "update" => Self::Update,
            "submit" => Self::Submit,
            "approve" => Self::Approve,
            "reject" => Self::Reject,
            "post" => Self::Post,
            "reverse" => Self::Reverse,
            "void" => Self::Void,
            "recall" => Self::Recall,
            "delegate" => Self::Delegate,
            "escalate" => Self::Escalate,
            "expire" => Self::Expire,
            "define" => Self::Define,
            "revalue" => Self::Revalue,
            "settle" => Self::Settle,
            _ => return None,
        })
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One append-only audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Entry id.
    pub id: AuditEntryId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Kind of record changed.
    pub entity_type: AuditEntityType,
    /// Id of the record changed.
    pub entity_id: Uuid,
    /// What happened.
    pub action: AuditAction,
    /// Who did it.
    pub actor: Actor,
    /// State before, absent on creation.
    pub previous: Option<serde_json::Value>,
    /// State after.
    pub new: Option<serde_json::Value>,
    /// Free-text reason.
    pub reason: Option<String>,
    /// When.
    pub created_at: DateTime<Utc>,
}
