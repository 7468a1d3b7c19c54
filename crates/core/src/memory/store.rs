//! In-memory ledger store.
//!
//! A transaction works on a copy of its tenant's tables and swaps it back in
//! on commit, so an abandoned transaction leaves nothing behind. Each tenant
//! has its own lock: units of work of one tenant are serialized, different
//! tenants proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use ledgerline_shared::types::{
    ApprovalRequestId, FiscalPeriodId, JournalEntryId, OpenItemId, PageRequest, PageResponse,
    TenantId,
};

use crate::approval::{ApprovalHistoryEntry, ApprovalRequest, ApprovalWorkflow};
use crate::audit::{AuditEntry, AuditError, AuditFilter, AuditRecorder};
use crate::fx::{BatchKey, BatchStatus, FxRevaluationBatch, OpenItem};
use crate::journal::JournalEntry;
use crate::ports::{LedgerStore, LedgerTx, StoreError};

#[derive(Debug, Clone, Default)]
struct Tables {
    entries: HashMap<JournalEntryId, JournalEntry>,
    requests: HashMap<ApprovalRequestId, ApprovalRequest>,
    history: Vec<ApprovalHistoryEntry>,
    workflows: Vec<ApprovalWorkflow>,
    open_items: HashMap<OpenItemId, OpenItem>,
    batches: Vec<FxRevaluationBatch>,
    audit: Vec<AuditEntry>,
    period_totals: HashMap<FiscalPeriodId, (Decimal, Decimal)>,
}

type TenantSlot = Arc<Mutex<Tables>>;

/// Store keeping every tenant's records in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tenants: Arc<DashMap<TenantId, TenantSlot>>,
    fail_audit_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following audit write fail, for rollback tests.
    pub fn set_audit_write_failure(&self, fail: bool) {
        self.fail_audit_writes.store(fail, Ordering::SeqCst);
    }

    /// Committed audit entries of a tenant, in write order.
    pub async fn audit_entries(&self, tenant: TenantId) -> Vec<AuditEntry> {
        self.read(tenant, |t| t.audit.clone()).await
    }

    /// Committed journal entries of a tenant.
    pub async fn journal_entries(&self, tenant: TenantId) -> Vec<JournalEntry> {
        self.read(tenant, |t| t.entries.values().cloned().collect())
            .await
    }

    /// Committed approval requests of a tenant.
    pub async fn approval_requests(&self, tenant: TenantId) -> Vec<ApprovalRequest> {
        self.read(tenant, |t| t.requests.values().cloned().collect())
            .await
    }

    /// Posted debit and credit rollups of a period.
    pub async fn period_totals(&self, tenant: TenantId, period: FiscalPeriodId) -> (Decimal, Decimal) {
        self.read(tenant, |t| {
            t.period_totals
                .get(&period)
                .copied()
                .unwrap_or((Decimal::ZERO, Decimal::ZERO))
        })
        .await
    }

    /// Open items of a tenant, settled ones included.
    pub async fn open_items(&self, tenant: TenantId) -> Vec<OpenItem> {
        self.read(tenant, |t| t.open_items.values().cloned().collect())
            .await
    }

    /// Stores an open item directly, as if booked earlier.
    pub async fn seed_open_item(&self, item: OpenItem) {
        let slot = self.slot(item.tenant_id);
        slot.lock().await.open_items.insert(item.id, item);
    }

    /// The tenant's lock, created on first use. The map shard is released
    /// before the caller awaits the lock.
    fn slot(&self, tenant: TenantId) -> TenantSlot {
        Arc::clone(self.tenants.entry(tenant).or_default().value())
    }

    async fn read<T>(&self, tenant: TenantId, f: impl FnOnce(&Tables) -> T) -> T {
        let slot = self.tenants.get(&tenant).map(|s| Arc::clone(s.value()));
        match slot {
            Some(slot) => {
                let tables = slot.lock().await;
                f(&tables)
            }
            None => f(&Tables::default()),
        }
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn begin(&self, tenant: TenantId) -> Result<Box<dyn LedgerTx>, StoreError> {
        let guard = self.slot(tenant).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            working,
            fail_audit_writes: self.fail_audit_writes.load(Ordering::SeqCst),
        }))
    }

    async fn search_audit(
        &self,
        tenant: TenantId,
        filter: &AuditFilter,
        page: PageRequest,
    ) -> Result<PageResponse<AuditEntry>, StoreError> {
        let entries = self.read(tenant, |t| t.audit.clone()).await;
        Ok(AuditRecorder::search(entries, filter, page))
    }

    async fn tenants_with_open_requests(&self) -> Result<Vec<TenantId>, StoreError> {
        let slots: Vec<(TenantId, TenantSlot)> = self
            .tenants
            .iter()
            .map(|s| (*s.key(), Arc::clone(s.value())))
            .collect();

        let mut tenants = Vec::new();
        for (tenant, slot) in slots {
            let tables = slot.lock().await;
            if tables.requests.values().any(|r| !r.status.is_terminal()) {
                tenants.push(tenant);
            }
        }
        tenants.sort_unstable();
        Ok(tenants)
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
    fail_audit_writes: bool,
}

fn conflict(entity: &'static str, id: impl ToString) -> StoreError {
    StoreError::VersionConflict {
        entity,
        id: id.to_string(),
    }
}

fn not_found(entity: &'static str, id: impl ToString) -> StoreError {
    StoreError::NotFound {
        entity,
        id: id.to_string(),
    }
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn journal_entry(
        &mut self,
        id: JournalEntryId,
    ) -> Result<Option<JournalEntry>, StoreError> {
        Ok(self.working.entries.get(&id).cloned())
    }

    async fn insert_journal_entry(&mut self, entry: &JournalEntry) -> Result<(), StoreError> {
        if self.working.entries.contains_key(&entry.id) {
            return Err(StoreError::Duplicate(format!("journal entry {}", entry.id)));
        }
        self.working.entries.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn update_journal_entry(
        &mut self,
        entry: &JournalEntry,
        expected_version: i64,
    ) -> Result<(), StoreError> {
        let stored = self
            .working
            .entries
            .get_mut(&entry.id)
            .ok_or_else(|| not_found("journal entry", entry.id))?;
        if stored.version != expected_version {
            return Err(conflict("journal entry", entry.id));
        }
        *stored = entry.clone();
        Ok(())
    }

    async fn approval_request(
        &mut self,
        id: ApprovalRequestId,
    ) -> Result<Option<ApprovalRequest>, StoreError> {
        Ok(self.working.requests.get(&id).cloned())
    }

    async fn open_request_for(
        &mut self,
        document_type: &str,
        document_id: Uuid,
    ) -> Result<Option<ApprovalRequest>, StoreError> {
        Ok(self
            .working
            .requests
            .values()
            .find(|r| {
                !r.status.is_terminal()
                    && r.document.doc_type == document_type
                    && r.document.id == document_id
            })
            .cloned())
    }

    async fn open_requests(&mut self, limit: usize) -> Result<Vec<ApprovalRequest>, StoreError> {
        let mut open: Vec<ApprovalRequest> = self
            .working
            .requests
            .values()
            .filter(|r| !r.status.is_terminal())
            .cloned()
            .collect();
        open.sort_by_key(|r| (r.submitted_at, r.id));
        open.truncate(limit);
        Ok(open)
    }

    async fn insert_approval_request(
        &mut self,
        request: &ApprovalRequest,
    ) -> Result<(), StoreError> {
        let duplicate_open = !request.status.is_terminal()
            && self.working.requests.values().any(|r| {
                !r.status.is_terminal()
                    && r.document.doc_type == request.document.doc_type
                    && r.document.id == request.document.id
            });
        if duplicate_open {
            return Err(StoreError::Duplicate(format!(
                "open approval request for {}",
                request.document.id
            )));
        }
        self.working.requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn update_approval_request(
        &mut self,
        request: &ApprovalRequest,
        expected_version: i64,
    ) -> Result<(), StoreError> {
        let stored = self
            .working
            .requests
            .get_mut(&request.id)
            .ok_or_else(|| not_found("approval request", request.id))?;
        if stored.version != expected_version {
            return Err(conflict("approval request", request.id));
        }
        *stored = request.clone();
        Ok(())
    }

    async fn append_history(&mut self, entries: &[ApprovalHistoryEntry]) -> Result<(), StoreError> {
        self.working.history.extend_from_slice(entries);
        Ok(())
    }

    async fn history(
        &mut self,
        request: ApprovalRequestId,
    ) -> Result<Vec<ApprovalHistoryEntry>, StoreError> {
        Ok(self
            .working
            .history
            .iter()
            .filter(|h| h.request_id == request)
            .cloned()
            .collect())
    }

    async fn workflows(&mut self, document_type: &str) -> Result<Vec<ApprovalWorkflow>, StoreError> {
        Ok(self
            .working
            .workflows
            .iter()
            .filter(|w| w.document_type == document_type)
            .cloned()
            .collect())
    }

    async fn insert_workflow(&mut self, workflow: &ApprovalWorkflow) -> Result<(), StoreError> {
        self.working.workflows.push(workflow.clone());
        Ok(())
    }

    async fn open_items(&mut self) -> Result<Vec<OpenItem>, StoreError> {
        let mut items: Vec<OpenItem> = self
            .working
            .open_items
            .values()
            .filter(|i| i.is_open())
            .cloned()
            .collect();
        items.sort_by_key(|i| (i.opened_on, i.id));
        Ok(items)
    }

    async fn open_item(&mut self, id: OpenItemId) -> Result<Option<OpenItem>, StoreError> {
        Ok(self.working.open_items.get(&id).cloned())
    }

    async fn open_items_for_entry(
        &mut self,
        entry: JournalEntryId,
    ) -> Result<Vec<OpenItem>, StoreError> {
        Ok(self
            .working
            .open_items
            .values()
            .filter(|i| i.source_entry_id == entry)
            .cloned()
            .collect())
    }

    async fn insert_open_items(&mut self, items: &[OpenItem]) -> Result<(), StoreError> {
        for item in items {
            self.working.open_items.insert(item.id, item.clone());
        }
        Ok(())
    }

    async fn update_open_item(
        &mut self,
        item: &OpenItem,
        expected_version: i64,
    ) -> Result<(), StoreError> {
        let stored = self
            .working
            .open_items
            .get_mut(&item.id)
            .ok_or_else(|| not_found("open item", item.id))?;
        if stored.version != expected_version {
            return Err(conflict("open item", item.id));
        }
        *stored = item.clone();
        Ok(())
    }

    async fn posted_batch(
        &mut self,
        key: &BatchKey,
    ) -> Result<Option<FxRevaluationBatch>, StoreError> {
        Ok(self
            .working
            .batches
            .iter()
            .find(|b| b.status == BatchStatus::Posted && &b.key == key)
            .cloned())
    }

    async fn insert_batch(&mut self, batch: &FxRevaluationBatch) -> Result<(), StoreError> {
        if self.working.batches.iter().any(|b| b.key == batch.key) {
            return Err(StoreError::Duplicate(format!("fx batch {}", batch.key)));
        }
        self.working.batches.push(batch.clone());
        Ok(())
    }

    async fn append_audit(&mut self, entry: &AuditEntry) -> Result<(), AuditError> {
        if self.fail_audit_writes {
            return Err(AuditError::WriteFailed("audit store unavailable".to_string()));
        }
        self.working.audit.push(entry.clone());
        Ok(())
    }

    async fn add_period_totals(
        &mut self,
        period: FiscalPeriodId,
        debit: Decimal,
        credit: Decimal,
    ) -> Result<(), StoreError> {
        let totals = self
            .working
            .period_totals
            .entry(period)
            .or_insert((Decimal::ZERO, Decimal::ZERO));
        totals.0 += debit;
        totals.1 += credit;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let Self {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }
}
