//! `SeaORM` entities, one module per table.

pub mod prelude;

pub mod accounts;
pub mod approval_history;
pub mod approval_requests;
pub mod approval_workflows;
pub mod audit_trail;
pub mod exchange_rates;
pub mod fiscal_periods;
pub mod fx_revaluation_batches;
pub mod fx_revaluation_entries;
pub mod journal_entries;
pub mod journal_lines;
pub mod open_items;
pub mod period_totals;
pub mod subledger_records;
pub mod tenant_members;
