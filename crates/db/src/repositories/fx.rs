//! FX persistence: open items and posted revaluation or settlement batches.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder,
};

use ledgerline_core::fx::{
    BatchKey, BatchKind, BatchStatus, FxRevaluationBatch, FxRevaluationEntry, GainLossTag,
    OpenItem, RevaluationMethod,
};
use ledgerline_core::journal::{SubledgerKind, SubledgerLink};
use ledgerline_core::ports::StoreError;
use ledgerline_shared::types::{
    AccountId, FiscalPeriodId, FxBatchId, FxEntryId, JournalEntryId, JournalLineId, OpenItemId,
    TenantId,
};

use super::convert::{
    actor_columns, actor_from, currency, from_db_time, from_json, parse_enum, to_db_time,
    to_json,
};
use crate::entities::{fx_revaluation_batches, fx_revaluation_entries, open_items};
use crate::error::store_error;

const ENTITY: &str = "open_item";

/// Unsettled items.
pub async fn open_items(
    txn: &DatabaseTransaction,
    tenant: TenantId,
) -> Result<Vec<OpenItem>, StoreError> {
    open_items::Entity::find()
        .filter(open_items::Column::TenantId.eq(tenant.into_inner()))
        .filter(open_items::Column::SettledAt.is_null())
        .order_by_asc(open_items::Column::OpenedOn)
        .order_by_asc(open_items::Column::Id)
        .all(txn)
        .await
        .map_err(store_error)?
        .into_iter()
        .map(item_from_row)
        .collect()
}

/// One item, settled or not.
pub async fn find_item(
    txn: &DatabaseTransaction,
    tenant: TenantId,
    id: OpenItemId,
) -> Result<Option<OpenItem>, StoreError> {
    open_items::Entity::find_by_id(id.into_inner())
        .filter(open_items::Column::TenantId.eq(tenant.into_inner()))
        .one(txn)
        .await
        .map_err(store_error)?
        .map(item_from_row)
        .transpose()
}

/// Items opened by one journal entry.
pub async fn items_for_entry(
    txn: &DatabaseTransaction,
    tenant: TenantId,
    entry: JournalEntryId,
) -> Result<Vec<OpenItem>, StoreError> {
    open_items::Entity::find()
        .filter(open_items::Column::TenantId.eq(tenant.into_inner()))
        .filter(open_items::Column::SourceEntryId.eq(entry.into_inner()))
        .all(txn)
        .await
        .map_err(store_error)?
        .into_iter()
        .map(item_from_row)
        .collect()
}

/// Inserts items.
pub async fn insert_items(txn: &DatabaseTransaction, items: &[OpenItem]) -> Result<(), StoreError> {
    if items.is_empty() {
        return Ok(());
    }
    let rows = items
        .iter()
        .map(|item| item_row(item).into_active_model().reset_all());
    open_items::Entity::insert_many(rows)
        .exec(txn)
        .await
        .map_err(store_error)?;
    Ok(())
}

/// Replaces an item if the stored version still equals `expected_version`.
pub async fn update_item(
    txn: &DatabaseTransaction,
    item: &OpenItem,
    expected_version: i64,
) -> Result<(), StoreError> {
    let result = open_items::Entity::update_many()
        .set(item_row(item).into_active_model().reset_all())
        .filter(open_items::Column::Id.eq(item.id.into_inner()))
        .filter(open_items::Column::TenantId.eq(item.tenant_id.into_inner()))
        .filter(open_items::Column::Version.eq(expected_version))
        .exec(txn)
        .await
        .map_err(store_error)?;
    if result.rows_affected > 0 {
        return Ok(());
    }

    let id = item.id.to_string();
    Err(match find_item(txn, item.tenant_id, item.id).await? {
        Some(_) => StoreError::VersionConflict { entity: ENTITY, id },
        None => StoreError::NotFound { entity: ENTITY, id },
    })
}

/// The posted batch with this key.
pub async fn posted_batch(
    txn: &DatabaseTransaction,
    tenant: TenantId,
    key: &BatchKey,
) -> Result<Option<FxRevaluationBatch>, StoreError> {
    let Some(header) = fx_revaluation_batches::Entity::find()
        .filter(fx_revaluation_batches::Column::TenantId.eq(tenant.into_inner()))
        .filter(fx_revaluation_batches::Column::BatchKey.eq(key.as_str()))
        .filter(fx_revaluation_batches::Column::Status.eq(BatchStatus::Posted.as_str()))
        .one(txn)
        .await
        .map_err(store_error)?
    else {
        return Ok(None);
    };

    let entries = fx_revaluation_entries::Entity::find()
        .filter(fx_revaluation_entries::Column::BatchId.eq(header.id))
        .order_by_asc(fx_revaluation_entries::Column::Position)
        .all(txn)
        .await
        .map_err(store_error)?
        .into_iter()
        .map(entry_from_row)
        .collect::<Result<Vec<_>, _>>()?;
    batch_from_row(header, entries).map(Some)
}

/// Stores a batch with its entries.
pub async fn insert_batch(
    txn: &DatabaseTransaction,
    batch: &FxRevaluationBatch,
) -> Result<(), StoreError> {
    let (created_by_kind, created_by) = actor_columns(batch.created_by);
    fx_revaluation_batches::Model {
        id: batch.id.into_inner(),
        tenant_id: batch.tenant_id.into_inner(),
        kind: batch.kind.as_str().to_string(),
        batch_key: batch.key.as_str().to_string(),
        revaluation_date: batch.revaluation_date,
        method: batch.method.as_str().to_string(),
        scope: to_json("scope", &batch.scope)?,
        fiscal_period_id: batch.fiscal_period_id.into_inner(),
        base_currency: batch.base_currency.to_string(),
        total_gain_loss: batch.total_gain_loss,
        status: batch.status.as_str().to_string(),
        journal_entry_id: batch.journal_entry_id.map(JournalEntryId::into_inner),
        created_by_kind,
        created_by,
        created_at: to_db_time(batch.created_at),
    }
    .into_active_model()
    .reset_all()
    .insert(txn)
    .await
    .map_err(store_error)?;

    if batch.entries.is_empty() {
        return Ok(());
    }
    let rows = batch
        .entries
        .iter()
        .zip(0..)
        .map(|(entry, position)| entry_row(batch, entry, position).into_active_model().reset_all());
    fx_revaluation_entries::Entity::insert_many(rows)
        .exec(txn)
        .await
        .map_err(store_error)?;
    Ok(())
}

// ============================================================
// ROW MAPPING
// ============================================================

fn item_row(item: &OpenItem) -> open_items::Model {
    open_items::Model {
        id: item.id.into_inner(),
        tenant_id: item.tenant_id.into_inner(),
        account_id: item.account_id.into_inner(),
        source_entry_id: item.source_entry_id.into_inner(),
        source_line_id: item.source_line_id.into_inner(),
        subledger_kind: item.subledger.kind.as_str().to_string(),
        subledger_reference: item.subledger.reference.clone(),
        currency: item.currency.to_string(),
        amount: item.amount,
        original_rate: item.original_rate,
        original_base_amount: item.original_base_amount,
        carrying_base_amount: item.carrying_base_amount,
        opened_on: item.opened_on,
        settled_at: item.settled_at.map(to_db_time),
        version: item.version,
    }
}

fn item_from_row(row: open_items::Model) -> Result<OpenItem, StoreError> {
    Ok(OpenItem {
        id: OpenItemId::from_uuid(row.id),
        tenant_id: TenantId::from_uuid(row.tenant_id),
        account_id: AccountId::from_uuid(row.account_id),
        source_entry_id: JournalEntryId::from_uuid(row.source_entry_id),
        source_line_id: JournalLineId::from_uuid(row.source_line_id),
        subledger: SubledgerLink {
            kind: parse_enum("subledger_kind", &row.subledger_kind, SubledgerKind::parse)?,
            reference: row.subledger_reference,
        },
        currency: currency("currency", &row.currency)?,
        amount: row.amount,
        original_rate: row.original_rate,
        original_base_amount: row.original_base_amount,
        carrying_base_amount: row.carrying_base_amount,
        opened_on: row.opened_on,
        settled_at: row.settled_at.map(from_db_time),
        version: row.version,
    })
}

fn entry_row(
    batch: &FxRevaluationBatch,
    entry: &FxRevaluationEntry,
    position: i32,
) -> fx_revaluation_entries::Model {
    fx_revaluation_entries::Model {
        id: entry.id.into_inner(),
        tenant_id: batch.tenant_id.into_inner(),
        batch_id: entry.batch_id.into_inner(),
        open_item_id: entry.open_item_id.into_inner(),
        account_id: entry.account_id.into_inner(),
        currency: entry.currency.to_string(),
        amount: entry.amount,
        original_base_amount: entry.original_base_amount,
        revaluation_rate: entry.revaluation_rate,
        revalued_base_amount: entry.revalued_base_amount,
        gain_loss: entry.gain_loss,
        tag: entry.tag.as_str().to_string(),
        position,
    }
}

fn entry_from_row(row: fx_revaluation_entries::Model) -> Result<FxRevaluationEntry, StoreError> {
    Ok(FxRevaluationEntry {
        id: FxEntryId::from_uuid(row.id),
        batch_id: FxBatchId::from_uuid(row.batch_id),
        open_item_id: OpenItemId::from_uuid(row.open_item_id),
        account_id: AccountId::from_uuid(row.account_id),
        currency: currency("currency", &row.currency)?,
        amount: row.amount,
        original_base_amount: row.original_base_amount,
        revaluation_rate: row.revaluation_rate,
        revalued_base_amount: row.revalued_base_amount,
        gain_loss: row.gain_loss,
        tag: parse_enum("tag", &row.tag, GainLossTag::parse)?,
    })
}

fn batch_from_row(
    row: fx_revaluation_batches::Model,
    entries: Vec<FxRevaluationEntry>,
) -> Result<FxRevaluationBatch, StoreError> {
    Ok(FxRevaluationBatch {
        id: FxBatchId::from_uuid(row.id),
        tenant_id: TenantId::from_uuid(row.tenant_id),
        kind: parse_enum("kind", &row.kind, BatchKind::parse)?,
        key: BatchKey::from_stored(row.batch_key),
        revaluation_date: row.revaluation_date,
        method: parse_enum("method", &row.method, RevaluationMethod::parse)?,
        scope: from_json("scope", row.scope)?,
        fiscal_period_id: FiscalPeriodId::from_uuid(row.fiscal_period_id),
        base_currency: currency("base_currency", &row.base_currency)?,
        entries,
        total_gain_loss: row.total_gain_loss,
        status: parse_enum("status", &row.status, BatchStatus::parse)?,
        journal_entry_id: row.journal_entry_id.map(JournalEntryId::from_uuid),
        created_by: actor_from(&row.created_by_kind, row.created_by),
        created_at: from_db_time(row.created_at),
    })
}
