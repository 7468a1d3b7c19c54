//! Audit trail persistence. Rows are insert-only; a trigger refuses
//! UPDATE and DELETE.

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseTransaction, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};

use ledgerline_core::audit::{AuditAction, AuditEntityType, AuditEntry, AuditError, AuditFilter};
use ledgerline_core::ports::StoreError;
use ledgerline_shared::types::{AuditEntryId, PageRequest, PageResponse, TenantId};

use super::convert::{actor_columns, actor_from, from_db_time, parse_enum, to_db_time};
use crate::entities::audit_trail;
use crate::error::store_error;

/// Inserts one entry.
pub async fn append(txn: &DatabaseTransaction, entry: &AuditEntry) -> Result<(), AuditError> {
    let (actor_kind, actor_id) = actor_columns(entry.actor);
    audit_trail::ActiveModel {
        id: Set(entry.id.into_inner()),
        tenant_id: Set(entry.tenant_id.into_inner()),
        entity_type: Set(entry.entity_type.as_str().to_string()),
        entity_id: Set(entry.entity_id),
        action: Set(entry.action.as_str().to_string()),
        actor_kind: Set(actor_kind),
        actor_id: Set(actor_id),
        previous: Set(entry.previous.clone()),
        new: Set(entry.new.clone()),
        reason: Set(entry.reason.clone()),
        created_at: Set(to_db_time(entry.created_at)),
        ..Default::default()
    }
    .insert(txn)
    .await
    .map_err(|e| AuditError::WriteFailed(e.to_string()))?;
    Ok(())
}

/// Filters and pages the trail, newest first.
pub async fn search(
    txn: &DatabaseTransaction,
    tenant: TenantId,
    filter: &AuditFilter,
    page: PageRequest,
) -> Result<PageResponse<AuditEntry>, StoreError> {
    let page = page.clamped();
    let query = audit_trail::Entity::find()
        .filter(audit_trail::Column::TenantId.eq(tenant.into_inner()))
        .filter(condition(filter));

    let total = query.clone().count(txn).await.map_err(store_error)?;
    let rows = query
        .order_by_desc(audit_trail::Column::CreatedAt)
        .order_by_desc(audit_trail::Column::Seq)
        .offset(page.offset())
        .limit(page.limit())
        .all(txn)
        .await
        .map_err(store_error)?;

    let data = rows
        .into_iter()
        .map(entry_from_row)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(PageResponse::new(data, page.page, page.per_page, total))
}

fn condition(filter: &AuditFilter) -> Condition {
    let mut cond = Condition::all();
    if let Some(entity_type) = filter.entity_type {
        cond = cond.add(audit_trail::Column::EntityType.eq(entity_type.as_str()));
    }
    if let Some(entity_id) = filter.entity_id {
        cond = cond.add(audit_trail::Column::EntityId.eq(entity_id));
    }
    if let Some(actor) = filter.actor {
        cond = cond.add(audit_trail::Column::ActorKind.eq(actor.kind_str()));
        cond = match actor.user_id() {
            Some(user) => cond.add(audit_trail::Column::ActorId.eq(user.into_inner())),
            None => cond.add(audit_trail::Column::ActorId.is_null()),
        };
    }
    if let Some(action) = filter.action {
        cond = cond.add(audit_trail::Column::Action.eq(action.as_str()));
    }
    if let Some(text) = filter.text.as_deref().filter(|t| !t.trim().is_empty()) {
        let pattern = like_pattern(text.trim());
        cond = cond.add(Expr::cust_with_values(
            "(reason ILIKE ? OR previous::text ILIKE ? OR new::text ILIKE ?)",
            [pattern.clone(), pattern.clone(), pattern],
        ));
    }
    if let Some(from) = filter.from {
        cond = cond.add(audit_trail::Column::CreatedAt.gte(to_db_time(from)));
    }
    if let Some(to) = filter.to {
        cond = cond.add(audit_trail::Column::CreatedAt.lt(to_db_time(to)));
    }
    cond
}

/// `%text%` with LIKE wildcards in `text` matched literally.
fn like_pattern(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn entry_from_row(row: audit_trail::Model) -> Result<AuditEntry, StoreError> {
    Ok(AuditEntry {
        id: AuditEntryId::from_uuid(row.id),
        tenant_id: TenantId::from_uuid(row.tenant_id),
        entity_type: parse_enum("entity_type", &row.entity_type, AuditEntityType::parse)?,
        entity_id: row.entity_id,
        action: parse_enum("action", &row.action, AuditAction::parse)?,
        actor: actor_from(&row.actor_kind, row.actor_id),
        previous: row.previous,
        new: row.new,
        reason: row.reason,
        created_at: from_db_time(row.created_at),
    })
}
