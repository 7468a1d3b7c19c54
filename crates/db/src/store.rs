//! `PostgreSQL` implementation of the ledger store port.
//!
//! Each [`PgTx`] is one database transaction with the tenant's RLS context
//! set, so every query it runs sees only that tenant's rows.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, Statement,
};
use uuid::Uuid;

use ledgerline_core::approval::{ApprovalHistoryEntry, ApprovalRequest, ApprovalWorkflow};
use ledgerline_core::audit::{AuditEntry, AuditError, AuditFilter};
use ledgerline_core::fx::{BatchKey, FxRevaluationBatch, OpenItem};
use ledgerline_core::journal::JournalEntry;
use ledgerline_core::ports::{LedgerStore, LedgerTx, StoreError};
use ledgerline_shared::types::{
    ApprovalRequestId, FiscalPeriodId, JournalEntryId, OpenItemId, PageRequest, PageResponse,
    TenantId,
};

use crate::error::store_error;
use crate::repositories::{approval, audit, fx, journal};
use crate::rls::RlsConnection;

const OPEN_REQUEST_TENANTS_SQL: &str = "SELECT tenant_id FROM tenants_with_open_requests()";

/// Store backed by a `SeaORM` connection pool.
#[derive(Clone)]
pub struct PgStore {
    db: DatabaseConnection,
}

impl PgStore {
    /// Wraps a connection pool.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn scoped(&self, tenant: TenantId) -> Result<RlsConnection, StoreError> {
        RlsConnection::new(&self.db, tenant)
            .await
            .map_err(store_error)
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn begin(&self, tenant: TenantId) -> Result<Box<dyn LedgerTx>, StoreError> {
        let rls = self.scoped(tenant).await?;
        Ok(Box::new(PgTx {
            txn: rls.into_inner(),
            tenant,
        }))
    }

    async fn search_audit(
        &self,
        tenant: TenantId,
        filter: &AuditFilter,
        page: PageRequest,
    ) -> Result<PageResponse<AuditEntry>, StoreError> {
        let rls = self.scoped(tenant).await?;
        let result = audit::search(rls.transaction(), tenant, filter, page).await?;
        rls.commit().await.map_err(store_error)?;
        Ok(result)
    }

    async fn tenants_with_open_requests(&self) -> Result<Vec<TenantId>, StoreError> {
        let rows = self
            .db
            .query_all(Statement::from_string(
                DbBackend::Postgres,
                OPEN_REQUEST_TENANTS_SQL,
            ))
            .await
            .map_err(store_error)?;
        rows.iter()
            .map(|row| {
                row.try_get::<Uuid>("", "tenant_id")
                    .map(TenantId::from_uuid)
                    .map_err(store_error)
            })
            .collect()
    }
}

/// One tenant-scoped database transaction.
pub struct PgTx {
    txn: DatabaseTransaction,
    tenant: TenantId,
}

#[async_trait]
impl LedgerTx for PgTx {
    async fn journal_entry(
        &mut self,
        id: JournalEntryId,
    ) -> Result<Option<JournalEntry>, StoreError> {
        journal::find(&self.txn, self.tenant, id).await
    }

    async fn insert_journal_entry(&mut self, entry: &JournalEntry) -> Result<(), StoreError> {
        journal::insert(&self.txn, entry).await
    }

    async fn update_journal_entry(
        &mut self,
        entry: &JournalEntry,
        expected_version: i64,
    ) -> Result<(), StoreError> {
        journal::update(&self.txn, entry, expected_version).await
    }

    async fn approval_request(
        &mut self,
        id: ApprovalRequestId,
    ) -> Result<Option<ApprovalRequest>, StoreError> {
        approval::find_request(&self.txn, self.tenant, id).await
    }

    async fn open_request_for(
        &mut self,
        document_type: &str,
        document_id: Uuid,
    ) -> Result<Option<ApprovalRequest>, StoreError> {
        approval::open_request_for(&self.txn, self.tenant, document_type, document_id).await
    }

    async fn open_requests(&mut self, limit: usize) -> Result<Vec<ApprovalRequest>, StoreError> {
        approval::open_requests(&self.txn, self.tenant, limit).await
    }

    async fn insert_approval_request(
        &mut self,
        request: &ApprovalRequest,
    ) -> Result<(), StoreError> {
        approval::insert_request(&self.txn, request).await
    }

    async fn update_approval_request(
        &mut self,
        request: &ApprovalRequest,
        expected_version: i64,
    ) -> Result<(), StoreError> {
        approval::update_request(&self.txn, request, expected_version).await
    }

    async fn append_history(&mut self, entries: &[ApprovalHistoryEntry]) -> Result<(), StoreError> {
        approval::append_history(&self.txn, entries).await
    }

    async fn history(
        &mut self,
        request: ApprovalRequestId,
    ) -> Result<Vec<ApprovalHistoryEntry>, StoreError> {
        approval::history(&self.txn, self.tenant, request).await
    }

    async fn workflows(&mut self, document_type: &str) -> Result<Vec<ApprovalWorkflow>, StoreError> {
        approval::workflows(&self.txn, self.tenant, document_type).await
    }

    async fn insert_workflow(&mut self, workflow: &ApprovalWorkflow) -> Result<(), StoreError> {
        approval::insert_workflow(&self.txn, workflow).await
    }

    async fn open_items(&mut self) -> Result<Vec<OpenItem>, StoreError> {
        fx::open_items(&self.txn, self.tenant).await
    }

    async fn open_item(&mut self, id: OpenItemId) -> Result<Option<OpenItem>, StoreError> {
        fx::find_item(&self.txn, self.tenant, id).await
    }

    async fn open_items_for_entry(
        &mut self,
        entry: JournalEntryId,
    ) -> Result<Vec<OpenItem>, StoreError> {
        fx::items_for_entry(&self.txn, self.tenant, entry).await
    }

    async fn insert_open_items(&mut self, items: &[OpenItem]) -> Result<(), StoreError> {
        fx::insert_items(&self.txn, items).await
    }

    async fn update_open_item(
        &mut self,
        item: &OpenItem,
        expected_version: i64,
    ) -> Result<(), StoreError> {
        fx::update_item(&self.txn, item, expected_version).await
    }

    async fn posted_batch(
        &mut self,
        key: &BatchKey,
    ) -> Result<Option<FxRevaluationBatch>, StoreError> {
        fx::posted_batch(&self.txn, self.tenant, key).await
    }

    async fn insert_batch(&mut self, batch: &FxRevaluationBatch) -> Result<(), StoreError> {
        fx::insert_batch(&self.txn, batch).await
    }

    async fn append_audit(&mut self, entry: &AuditEntry) -> Result<(), AuditError> {
        audit::append(&self.txn, entry).await
    }

    async fn add_period_totals(
        &mut self,
        period: FiscalPeriodId,
        debit: Decimal,
        credit: Decimal,
    ) -> Result<(), StoreError> {
        journal::add_period_totals(&self.txn, self.tenant, period, debit, credit).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.txn.commit().await.map_err(store_error)
    }
}
