//! Journal entry persistence: header rows, line rows and period rollups.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, Set,
};

use ledgerline_core::journal::{
    EntryKind, JournalEntry, JournalLine, JournalStatus, JournalTotals, SubledgerKind,
    SubledgerLink,
};
use ledgerline_core::ports::StoreError;
use ledgerline_shared::types::{
    AccountId, ApprovalRequestId, FiscalPeriodId, JournalEntryId, JournalLineId, SubScopeId,
    TenantId,
};

use super::convert::{
    actor_columns, actor_from, currency, from_db_time, from_json, optional_actor, parse_enum,
    to_db_time, to_i32, to_json, to_u32,
};
use crate::entities::{journal_entries, journal_lines, period_totals};
use crate::error::{corrupt, store_error};

const ENTITY: &str = "journal_entry";

/// Loads an entry with its lines.
pub async fn find(
    txn: &DatabaseTransaction,
    tenant: TenantId,
    id: JournalEntryId,
) -> Result<Option<JournalEntry>, StoreError> {
    let Some(header) = journal_entries::Entity::find_by_id(id.into_inner())
        .filter(journal_entries::Column::TenantId.eq(tenant.into_inner()))
        .one(txn)
        .await
        .map_err(store_error)?
    else {
        return Ok(None);
    };
    let lines = load_lines(txn, id).await?;
    entry_from_rows(header, lines).map(Some)
}

/// Inserts an entry and its lines.
pub async fn insert(txn: &DatabaseTransaction, entry: &JournalEntry) -> Result<(), StoreError> {
    header_row(entry)?
        .into_active_model()
        .reset_all()
        .insert(txn)
        .await
        .map_err(store_error)?;
    insert_lines(txn, entry).await
}

/// Replaces an entry if the stored version still equals `expected_version`.
///
/// Lines are rewritten only when they differ from the stored ones, so status
/// transitions never touch the line table.
pub async fn update(
    txn: &DatabaseTransaction,
    entry: &JournalEntry,
    expected_version: i64,
) -> Result<(), StoreError> {
    let result = journal_entries::Entity::update_many()
        .set(header_row(entry)?.into_active_model().reset_all())
        .filter(journal_entries::Column::Id.eq(entry.id.into_inner()))
        .filter(journal_entries::Column::TenantId.eq(entry.tenant_id.into_inner()))
        .filter(journal_entries::Column::Version.eq(expected_version))
        .exec(txn)
        .await
        .map_err(store_error)?;

    if result.rows_affected == 0 {
        return Err(missing_or_stale(txn, entry.tenant_id, entry.id).await?);
    }

    if load_lines(txn, entry.id).await? != entry.lines {
        journal_lines::Entity::delete_many()
            .filter(journal_lines::Column::JournalEntryId.eq(entry.id.into_inner()))
            .exec(txn)
            .await
            .map_err(store_error)?;
        insert_lines(txn, entry).await?;
    }
    Ok(())
}

/// Adds posted amounts to a period's rollup, creating it on first use.
pub async fn add_period_totals(
    txn: &DatabaseTransaction,
    tenant: TenantId,
    period: FiscalPeriodId,
    debit: Decimal,
    credit: Decimal,
) -> Result<(), StoreError> {
    let row = period_totals::ActiveModel {
        tenant_id: Set(tenant.into_inner()),
        fiscal_period_id: Set(period.into_inner()),
        total_debit: Set(debit),
        total_credit: Set(credit),
        updated_at: Set(to_db_time(Utc::now())),
    };
    period_totals::Entity::insert(row)
        .on_conflict(
            OnConflict::columns([
                period_totals::Column::TenantId,
                period_totals::Column::FiscalPeriodId,
            ])
            .value(
                period_totals::Column::TotalDebit,
                Expr::col((period_totals::Entity, period_totals::Column::TotalDebit)).add(debit),
            )
            .value(
                period_totals::Column::TotalCredit,
                Expr::col((period_totals::Entity, period_totals::Column::TotalCredit)).add(credit),
            )
            .update_column(period_totals::Column::UpdatedAt)
            .to_owned(),
        )
        .exec(txn)
        .await
        .map_err(store_error)?;
    Ok(())
}

/// Posted debit and credit totals of a period.
pub async fn period_totals(
    txn: &DatabaseTransaction,
    tenant: TenantId,
    period: FiscalPeriodId,
) -> Result<(Decimal, Decimal), StoreError> {
    let row = period_totals::Entity::find_by_id((tenant.into_inner(), period.into_inner()))
        .one(txn)
        .await
        .map_err(store_error)?;
    Ok(row.map_or((Decimal::ZERO, Decimal::ZERO), |r| (r.total_debit, r.total_credit)))
}

async fn missing_or_stale(
    txn: &DatabaseTransaction,
    tenant: TenantId,
    id: JournalEntryId,
) -> Result<StoreError, StoreError> {
    let exists = journal_entries::Entity::find_by_id(id.into_inner())
        .filter(journal_entries::Column::TenantId.eq(tenant.into_inner()))
        .one(txn)
        .await
        .map_err(store_error)?
        .is_some();
    let id = id.to_string();
    Ok(if exists {
        StoreError::VersionConflict { entity: ENTITY, id }
    } else {
        StoreError::NotFound { entity: ENTITY, id }
    })
}

async fn load_lines(
    txn: &DatabaseTransaction,
    entry: JournalEntryId,
) -> Result<Vec<JournalLine>, StoreError> {
    journal_lines::Entity::find()
        .filter(journal_lines::Column::JournalEntryId.eq(entry.into_inner()))
        .order_by_asc(journal_lines::Column::LineNumber)
        .all(txn)
        .await
        .map_err(store_error)?
        .into_iter()
        .map(line_from_row)
        .collect()
}

async fn insert_lines(txn: &DatabaseTransaction, entry: &JournalEntry) -> Result<(), StoreError> {
    if entry.lines.is_empty() {
        return Ok(());
    }
    let rows = entry
        .lines
        .iter()
        .map(|line| line_row(entry, line).map(|row| row.into_active_model().reset_all()))
        .collect::<Result<Vec<_>, _>>()?;
    journal_lines::Entity::insert_many(rows)
        .exec(txn)
        .await
        .map_err(store_error)?;
    Ok(())
}

// ============================================================
// ROW MAPPING
// ============================================================

fn header_row(entry: &JournalEntry) -> Result<journal_entries::Model, StoreError> {
    let (created_by_kind, created_by) = actor_columns(entry.created_by);
    let (updated_by_kind, updated_by) = actor_columns(entry.updated_by);
    let (posted_by_kind, posted_by) = entry
        .posted_by
        .map(actor_columns)
        .map_or((None, None), |(kind, id)| (Some(kind), id));

    Ok(journal_entries::Model {
        id: entry.id.into_inner(),
        tenant_id: entry.tenant_id.into_inner(),
        sub_scope_id: entry.sub_scope_id.map(SubScopeId::into_inner),
        fiscal_period_id: entry.fiscal_period_id.into_inner(),
        entry_date: entry.entry_date,
        kind: entry.kind.as_str().to_string(),
        source_module: entry.source_module.clone(),
        source_document: entry.source_document.clone(),
        description: entry.description.clone(),
        notes: entry.notes.clone(),
        currency: entry.currency.to_string(),
        base_currency: entry.base_currency.to_string(),
        exchange_rate: entry.exchange_rate,
        total_debit: entry.totals.debit,
        total_credit: entry.totals.credit,
        total_base_debit: entry.totals.base_debit,
        total_base_credit: entry.totals.base_credit,
        status: entry.status.as_str().to_string(),
        status_reason: entry.status_reason.clone(),
        reverses_entry_id: entry.reverses_entry_id.map(JournalEntryId::into_inner),
        reversed_by_entry_id: entry.reversed_by_entry_id.map(JournalEntryId::into_inner),
        approval_request_id: entry.approval_request_id.map(ApprovalRequestId::into_inner),
        version: entry.version,
        created_by_kind,
        created_by,
        created_at: to_db_time(entry.created_at),
        updated_by_kind,
        updated_by,
        updated_at: to_db_time(entry.updated_at),
        posted_by_kind,
        posted_by,
        posted_at: entry.posted_at.map(to_db_time),
    })
}

fn line_row(entry: &JournalEntry, line: &JournalLine) -> Result<journal_lines::Model, StoreError> {
    Ok(journal_lines::Model {
        id: line.id.into_inner(),
        tenant_id: entry.tenant_id.into_inner(),
        journal_entry_id: entry.id.into_inner(),
        line_number: to_i32("line_number", line.line_number)?,
        account_id: line.account_id.into_inner(),
        description: line.description.clone(),
        debit: line.debit,
        credit: line.credit,
        base_debit: line.base_debit,
        base_credit: line.base_credit,
        exchange_rate: line.exchange_rate,
        subledger_kind: line.subledger.as_ref().map(|s| s.kind.as_str().to_string()),
        subledger_reference: line.subledger.as_ref().map(|s| s.reference.clone()),
        dimensions: to_json("dimensions", &line.dimensions)?,
        tax: line.tax.as_ref().map(|t| to_json("tax", t)).transpose()?,
        intercompany: line.intercompany,
        counterparty_scope_id: line.counterparty_scope_id.map(SubScopeId::into_inner),
    })
}

fn entry_from_rows(
    row: journal_entries::Model,
    lines: Vec<JournalLine>,
) -> Result<JournalEntry, StoreError> {
    Ok(JournalEntry {
        id: JournalEntryId::from_uuid(row.id),
        tenant_id: TenantId::from_uuid(row.tenant_id),
        sub_scope_id: row.sub_scope_id.map(SubScopeId::from_uuid),
        fiscal_period_id: FiscalPeriodId::from_uuid(row.fiscal_period_id),
        entry_date: row.entry_date,
        kind: parse_enum("kind", &row.kind, EntryKind::parse)?,
        source_module: row.source_module,
        source_document: row.source_document,
        description: row.description,
        notes: row.notes,
        currency: currency("currency", &row.currency)?,
        base_currency: currency("base_currency", &row.base_currency)?,
        exchange_rate: row.exchange_rate,
        totals: JournalTotals {
            debit: row.total_debit,
            credit: row.total_credit,
            base_debit: row.total_base_debit,
            base_credit: row.total_base_credit,
        },
        status: parse_enum("status", &row.status, JournalStatus::parse)?,
        status_reason: row.status_reason,
        reverses_entry_id: row.reverses_entry_id.map(JournalEntryId::from_uuid),
        reversed_by_entry_id: row.reversed_by_entry_id.map(JournalEntryId::from_uuid),
        approval_request_id: row.approval_request_id.map(ApprovalRequestId::from_uuid),
        lines,
        version: row.version,
        created_by: actor_from(&row.created_by_kind, row.created_by),
        created_at: from_db_time(row.created_at),
        updated_by: actor_from(&row.updated_by_kind, row.updated_by),
        updated_at: from_db_time(row.updated_at),
        posted_by: optional_actor(row.posted_by_kind.as_deref(), row.posted_by),
        posted_at: row.posted_at.map(from_db_time),
    })
}

fn line_from_row(row: journal_lines::Model) -> Result<JournalLine, StoreError> {
    let subledger = match (row.subledger_kind, row.subledger_reference) {
        (Some(kind), Some(reference)) => Some(SubledgerLink {
            kind: parse_enum("subledger_kind", &kind, SubledgerKind::parse)?,
            reference,
        }),
        (None, None) => None,
        (kind, _) => return Err(corrupt("subledger_kind", kind.unwrap_or_default())),
    };
    Ok(JournalLine {
        id: JournalLineId::from_uuid(row.id),
        line_number: to_u32("line_number", row.line_number)?,
        account_id: AccountId::from_uuid(row.account_id),
        description: row.description,
        debit: row.debit,
        credit: row.credit,
        base_debit: row.base_debit,
        base_credit: row.base_credit,
        exchange_rate: row.exchange_rate,
        subledger,
        dimensions: from_json("dimensions", row.dimensions)?,
        tax: row.tax.map(|t| from_json("tax", t)).transpose()?,
        intercompany: row.intercompany,
        counterparty_scope_id: row.counterparty_scope_id.map(SubScopeId::from_uuid),
    })
}
