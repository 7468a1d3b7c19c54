//! Approval persistence: workflow definitions, requests and their history.
//!
//! Step snapshots, progress and delegations are stored as JSONB on the
//! request row; they are only ever read and written with the request.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, QuerySelect,
};
use uuid::Uuid;

use ledgerline_core::approval::{
    ApprovalHistoryEntry, ApprovalRequest, ApprovalStatus, ApprovalWorkflow, DocumentRef,
    HistoryAction, RuleType,
};
use ledgerline_core::ports::StoreError;
use ledgerline_shared::types::{
    ApprovalHistoryId, ApprovalRequestId, ApprovalWorkflowId, CurrencyCode, TenantId, UserId,
};

use super::convert::{
    actor_columns, actor_from, currency, from_db_time, from_json, optional_actor, parse_enum,
    to_db_time, to_i32, to_json, to_u32,
};
use crate::entities::{approval_history, approval_requests, approval_workflows};
use crate::error::store_error;

const ENTITY: &str = "approval_request";

/// Statuses that still accept decisions.
pub const OPEN_STATUSES: [&str; 3] = ["pending", "escalated", "delegated"];

/// Loads a request.
pub async fn find_request(
    txn: &DatabaseTransaction,
    tenant: TenantId,
    id: ApprovalRequestId,
) -> Result<Option<ApprovalRequest>, StoreError> {
    approval_requests::Entity::find_by_id(id.into_inner())
        .filter(approval_requests::Column::TenantId.eq(tenant.into_inner()))
        .one(txn)
        .await
        .map_err(store_error)?
        .map(request_from_row)
        .transpose()
}

/// The open request for a document.
pub async fn open_request_for(
    txn: &DatabaseTransaction,
    tenant: TenantId,
    document_type: &str,
    document_id: Uuid,
) -> Result<Option<ApprovalRequest>, StoreError> {
    approval_requests::Entity::find()
        .filter(approval_requests::Column::TenantId.eq(tenant.into_inner()))
        .filter(approval_requests::Column::DocumentType.eq(document_type))
        .filter(approval_requests::Column::DocumentId.eq(document_id))
        .filter(approval_requests::Column::Status.is_in(OPEN_STATUSES))
        .one(txn)
        .await
        .map_err(store_error)?
        .map(request_from_row)
        .transpose()
}

/// Open requests, oldest submission first.
pub async fn open_requests(
    txn: &DatabaseTransaction,
    tenant: TenantId,
    limit: usize,
) -> Result<Vec<ApprovalRequest>, StoreError> {
    approval_requests::Entity::find()
        .filter(approval_requests::Column::TenantId.eq(tenant.into_inner()))
        .filter(approval_requests::Column::Status.is_in(OPEN_STATUSES))
        .order_by_asc(approval_requests::Column::SubmittedAt)
        .limit(u64::try_from(limit).unwrap_or(u64::MAX))
        .all(txn)
        .await
        .map_err(store_error)?
        .into_iter()
        .map(request_from_row)
        .collect()
}

/// Inserts a request. A second open request for the same document trips
/// the partial unique index and surfaces as `Duplicate`.
pub async fn insert_request(
    txn: &DatabaseTransaction,
    request: &ApprovalRequest,
) -> Result<(), StoreError> {
    request_row(request)?
        .into_active_model()
        .reset_all()
        .insert(txn)
        .await
        .map_err(store_error)?;
    Ok(())
}

/// Replaces a request if the stored version still equals `expected_version`.
pub async fn update_request(
    txn: &DatabaseTransaction,
    request: &ApprovalRequest,
    expected_version: i64,
) -> Result<(), StoreError> {
    let result = approval_requests::Entity::update_many()
        .set(request_row(request)?.into_active_model().reset_all())
        .filter(approval_requests::Column::Id.eq(request.id.into_inner()))
        .filter(approval_requests::Column::TenantId.eq(request.tenant_id.into_inner()))
        .filter(approval_requests::Column::Version.eq(expected_version))
        .exec(txn)
        .await
        .map_err(store_error)?;
    if result.rows_affected > 0 {
        return Ok(());
    }

    let id = request.id.to_string();
    Err(match find_request(txn, request.tenant_id, request.id).await? {
        Some(_) => StoreError::VersionConflict { entity: ENTITY, id },
        None => StoreError::NotFound { entity: ENTITY, id },
    })
}

/// Appends history rows.
pub async fn append_history(
    txn: &DatabaseTransaction,
    entries: &[ApprovalHistoryEntry],
) -> Result<(), StoreError> {
    if entries.is_empty() {
        return Ok(());
    }
    let rows = entries
        .iter()
        .map(|e| history_row(e).map(|row| row.into_active_model().reset_all()))
        .collect::<Result<Vec<_>, _>>()?;
    approval_history::Entity::insert_many(rows)
        .exec(txn)
        .await
        .map_err(store_error)?;
    Ok(())
}

/// History of a request, oldest first.
pub async fn history(
    txn: &DatabaseTransaction,
    tenant: TenantId,
    request: ApprovalRequestId,
) -> Result<Vec<ApprovalHistoryEntry>, StoreError> {
    approval_history::Entity::find()
        .filter(approval_history::Column::TenantId.eq(tenant.into_inner()))
        .filter(approval_history::Column::RequestId.eq(request.into_inner()))
        .order_by_asc(approval_history::Column::CreatedAt)
        .all(txn)
        .await
        .map_err(store_error)?
        .into_iter()
        .map(history_from_row)
        .collect()
}

/// Workflows defined for a document type.
pub async fn workflows(
    txn: &DatabaseTransaction,
    tenant: TenantId,
    document_type: &str,
) -> Result<Vec<ApprovalWorkflow>, StoreError> {
    approval_workflows::Entity::find()
        .filter(approval_workflows::Column::TenantId.eq(tenant.into_inner()))
        .filter(approval_workflows::Column::DocumentType.eq(document_type))
        .order_by_asc(approval_workflows::Column::Priority)
        .order_by_asc(approval_workflows::Column::CreatedAt)
        .all(txn)
        .await
        .map_err(store_error)?
        .into_iter()
        .map(workflow_from_row)
        .collect()
}

/// Stores a workflow definition.
pub async fn insert_workflow(
    txn: &DatabaseTransaction,
    workflow: &ApprovalWorkflow,
) -> Result<(), StoreError> {
    approval_workflows::Model {
        id: workflow.id.into_inner(),
        tenant_id: workflow.tenant_id.into_inner(),
        name: workflow.name.clone(),
        document_type: workflow.document_type.clone(),
        rule_type: workflow.rule_type.as_str().to_string(),
        min_amount: workflow.min_amount,
        max_amount: workflow.max_amount,
        currency: workflow.currency.map(|c| c.to_string()),
        priority: workflow.priority,
        is_active: workflow.is_active,
        expiry_hours: workflow
            .expiry_hours
            .map(|h| to_i32("expiry_hours", h))
            .transpose()?,
        steps: to_json("steps", &workflow.steps)?,
        created_at: to_db_time(chrono::Utc::now()),
    }
    .into_active_model()
    .reset_all()
    .insert(txn)
    .await
    .map_err(store_error)?;
    Ok(())
}

// ============================================================
// ROW MAPPING
// ============================================================

fn request_row(request: &ApprovalRequest) -> Result<approval_requests::Model, StoreError> {
    let (submitted_by_kind, submitted_by) = actor_columns(request.submitted_by);
    let (completed_by_kind, completed_by) = request
        .completed_by
        .map(actor_columns)
        .map_or((None, None), |(kind, id)| (Some(kind), id));

    Ok(approval_requests::Model {
        id: request.id.into_inner(),
        tenant_id: request.tenant_id.into_inner(),
        workflow_id: request.workflow_id.map(ApprovalWorkflowId::into_inner),
        rule_type: request.rule_type.as_str().to_string(),
        document_type: request.document.doc_type.clone(),
        document_id: request.document.id,
        amount: request.document.amount,
        currency: request.document.currency.to_string(),
        status: request.status.as_str().to_string(),
        current_step: to_i32("current_step", request.current_step)?,
        steps: to_json("steps", &request.steps)?,
        progress: to_json("progress", &request.progress)?,
        delegations: to_json("delegations", &request.delegations)?,
        submitted_by_kind,
        submitted_by,
        submitted_at: to_db_time(request.submitted_at),
        completed_by_kind,
        completed_by,
        completed_at: request.completed_at.map(to_db_time),
        due_at: request.due_at.map(to_db_time),
        expires_at: request.expires_at.map(to_db_time),
        version: request.version,
    })
}

fn request_from_row(row: approval_requests::Model) -> Result<ApprovalRequest, StoreError> {
    Ok(ApprovalRequest {
        id: ApprovalRequestId::from_uuid(row.id),
        tenant_id: TenantId::from_uuid(row.tenant_id),
        workflow_id: row.workflow_id.map(ApprovalWorkflowId::from_uuid),
        rule_type: parse_enum("rule_type", &row.rule_type, RuleType::parse)?,
        document: DocumentRef {
            doc_type: row.document_type,
            id: row.document_id,
            amount: row.amount,
            currency: currency("currency", &row.currency)?,
        },
        status: parse_enum("status", &row.status, ApprovalStatus::parse)?,
        current_step: to_u32("current_step", row.current_step)?,
        steps: from_json("steps", row.steps)?,
        progress: from_json("progress", row.progress)?,
        delegations: from_json("delegations", row.delegations)?,
        submitted_by: actor_from(&row.submitted_by_kind, row.submitted_by),
        submitted_at: from_db_time(row.submitted_at),
        completed_by: optional_actor(row.completed_by_kind.as_deref(), row.completed_by),
        completed_at: row.completed_at.map(from_db_time),
        due_at: row.due_at.map(from_db_time),
        expires_at: row.expires_at.map(from_db_time),
        version: row.version,
    })
}

fn history_row(entry: &ApprovalHistoryEntry) -> Result<approval_history::Model, StoreError> {
    let (actor_kind, actor_id) = actor_columns(entry.actor);
    Ok(approval_history::Model {
        id: entry.id.into_inner(),
        tenant_id: entry.tenant_id.into_inner(),
        request_id: entry.request_id.into_inner(),
        step: to_i32("step", entry.step)?,
        actor_kind,
        actor_id,
        action: entry.action.as_str().to_string(),
        previous: entry
            .previous
            .as_ref()
            .map(|p| to_json("previous", p))
            .transpose()?,
        new: to_json("new", &entry.new)?,
        delegate_to: entry.delegate_to.map(UserId::into_inner),
        reason: entry.reason.clone(),
        created_at: to_db_time(entry.created_at),
    })
}

fn history_from_row(row: approval_history::Model) -> Result<ApprovalHistoryEntry, StoreError> {
    Ok(ApprovalHistoryEntry {
        id: ApprovalHistoryId::from_uuid(row.id),
        tenant_id: TenantId::from_uuid(row.tenant_id),
        request_id: ApprovalRequestId::from_uuid(row.request_id),
        step: to_u32("step", row.step)?,
        actor: actor_from(&row.actor_kind, row.actor_id),
        action: parse_enum("action", &row.action, HistoryAction::parse)?,
        previous: row.previous.map(|p| from_json("previous", p)).transpose()?,
        new: from_json("new", row.new)?,
        delegate_to: row.delegate_to.map(UserId::from_uuid),
        reason: row.reason,
        created_at: from_db_time(row.created_at),
    })
}

fn workflow_from_row(row: approval_workflows::Model) -> Result<ApprovalWorkflow, StoreError> {
    Ok(ApprovalWorkflow {
        id: ApprovalWorkflowId::from_uuid(row.id),
        tenant_id: TenantId::from_uuid(row.tenant_id),
        name: row.name,
        document_type: row.document_type,
        rule_type: parse_enum("rule_type", &row.rule_type, RuleType::parse)?,
        min_amount: row.min_amount,
        max_amount: row.max_amount,
        currency: row
            .currency
            .as_deref()
            .map(|c| currency("currency", c))
            .transpose()?,
        priority: row.priority,
        is_active: row.is_active,
        expiry_hours: row
            .expiry_hours
            .map(|h| to_u32("expiry_hours", h))
            .transpose()?,
        steps: from_json("steps", row.steps)?,
    })
}
