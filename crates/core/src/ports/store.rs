//! Transactional persistence port.
//!
//! Every mutating ledger operation runs inside one [`LedgerTx`]. Dropping a
//! transaction without calling [`LedgerTx::commit`] discards every write
//! made through it.

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use ledgerline_shared::types::{
    ApprovalRequestId, FiscalPeriodId, JournalEntryId, OpenItemId, PageRequest, PageResponse,
    TenantId,
};

use super::error::StoreError;
use crate::approval::{ApprovalHistoryEntry, ApprovalRequest, ApprovalWorkflow};
use crate::audit::{AuditEntry, AuditError, AuditFilter};
use crate::fx::{BatchKey, FxRevaluationBatch, OpenItem};
use crate::journal::JournalEntry;

/// Entry point to the durable store.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Opens a unit of work scoped to one tenant.
    async fn begin(&self, tenant: TenantId) -> Result<Box<dyn LedgerTx>, StoreError>;

    /// Audit trail query, newest first.
    async fn search_audit(
        &self,
        tenant: TenantId,
        filter: &AuditFilter,
        page: PageRequest,
    ) -> Result<PageResponse<AuditEntry>, StoreError>;

    /// Tenants with at least one non-terminal approval request.
    async fn tenants_with_open_requests(&self) -> Result<Vec<TenantId>, StoreError>;
}

/// One tenant-scoped unit of work.
#[async_trait]
pub trait LedgerTx: Send {
    /// Loads a journal entry.
    async fn journal_entry(
        &mut self,
        id: JournalEntryId,
    ) -> Result<Option<JournalEntry>, StoreError>;

    /// Inserts a journal entry with its lines.
    async fn insert_journal_entry(&mut self, entry: &JournalEntry) -> Result<(), StoreError>;

    /// Replaces a journal entry if its stored version is `expected_version`.
    async fn update_journal_entry(
        &mut self,
        entry: &JournalEntry,
        expected_version: i64,
    ) -> Result<(), StoreError>;

    /// Loads an approval request.
    async fn approval_request(
        &mut self,
        id: ApprovalRequestId,
    ) -> Result<Option<ApprovalRequest>, StoreError>;

    /// The non-terminal request for a document, if any.
    async fn open_request_for(
        &mut self,
        document_type: &str,
        document_id: Uuid,
    ) -> Result<Option<ApprovalRequest>, StoreError>;

    /// Non-terminal requests, oldest first.
    async fn open_requests(&mut self, limit: usize) -> Result<Vec<ApprovalRequest>, StoreError>;

    /// Inserts a request.
    async fn insert_approval_request(&mut self, request: &ApprovalRequest)
    -> Result<(), StoreError>;

    /// Replaces a request if its stored version is `expected_version`.
    async fn update_approval_request(
        &mut self,
        request: &ApprovalRequest,
        expected_version: i64,
    ) -> Result<(), StoreError>;

    /// Appends history rows.
    async fn append_history(&mut self, entries: &[ApprovalHistoryEntry]) -> Result<(), StoreError>;

    /// History of one request, oldest first.
    async fn history(
        &mut self,
        request: ApprovalRequestId,
    ) -> Result<Vec<ApprovalHistoryEntry>, StoreError>;

    /// Workflows for a document type.
    async fn workflows(&mut self, document_type: &str) -> Result<Vec<ApprovalWorkflow>, StoreError>;

    /// Stores a workflow definition.
    async fn insert_workflow(&mut self, workflow: &ApprovalWorkflow) -> Result<(), StoreError>;

    /// Open (unsettled) items.
    async fn open_items(&mut self) -> Result<Vec<OpenItem>, StoreError>;

    /// Loads one item, settled or not.
    async fn open_item(&mut self, id: OpenItemId) -> Result<Option<OpenItem>, StoreError>;

    /// Items opened by one entry.
    async fn open_items_for_entry(
        &mut self,
        entry: JournalEntryId,
    ) -> Result<Vec<OpenItem>, StoreError>;

    /// Inserts items.
    async fn insert_open_items(&mut self, items: &[OpenItem]) -> Result<(), StoreError>;

    /// Replaces an item if its stored version is `expected_version`.
    async fn update_open_item(
        &mut self,
        item: &OpenItem,
        expected_version: i64,
    ) -> Result<(), StoreError>;

    /// The posted batch with this key, if any.
    async fn posted_batch(&mut self, key: &BatchKey)
    -> Result<Option<FxRevaluationBatch>, StoreError>;

    /// Stores a posted batch with its entries.
    async fn insert_batch(&mut self, batch: &FxRevaluationBatch) -> Result<(), StoreError>;

    /// Appends an audit entry.
    async fn append_audit(&mut self, entry: &AuditEntry) -> Result<(), AuditError>;

    /// Adds to a period's posted debit and credit rollups (base currency).
    async fn add_period_totals(
        &mut self,
        period: FiscalPeriodId,
        debit: Decimal,
        credit: Decimal,
    ) -> Result<(), StoreError>;

    /// Makes every write durable.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
