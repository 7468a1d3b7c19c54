//! Entity re-exports.

pub use super::accounts::Entity as Accounts;
pub use super::approval_history::Entity as ApprovalHistory;
pub use super::approval_requests::Entity as ApprovalRequests;
pub use super::approval_workflows::Entity as ApprovalWorkflows;
pub use super::audit_trail::Entity as AuditTrail;
pub use super::exchange_rates::Entity as ExchangeRates;
pub use super::fiscal_periods::Entity as FiscalPeriods;
pub use super::fx_revaluation_batches::Entity as FxRevaluationBatches;
pub use super::fx_revaluation_entries::Entity as FxRevaluationEntries;
pub use super::journal_entries::Entity as JournalEntries;
pub use super::journal_lines::Entity as JournalLines;
pub use super::open_items::Entity as OpenItems;
pub use super::period_totals::Entity as PeriodTotals;
pub use super::subledger_records::Entity as SubledgerRecords;
pub use super::tenant_members::Entity as TenantMembers;
