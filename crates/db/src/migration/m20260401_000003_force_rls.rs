//! FORCE ROW LEVEL SECURITY on every tenant table, so policies also bind
//! the table owner.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        for table in TENANT_TABLES {
            db.execute_unprepared(&format!("ALTER TABLE {table} FORCE ROW LEVEL SECURITY;"))
                .await?;
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        for table in TENANT_TABLES {
            db.execute_unprepared(&format!("ALTER TABLE {table} NO FORCE ROW LEVEL SECURITY;"))
                .await?;
        }
        Ok(())
    }
}

const TENANT_TABLES: [&str; 15] = [
    "journal_entries",
    "journal_lines",
    "period_totals",
    "approval_workflows",
    "approval_requests",
    "approval_history",
    "open_items",
    "fx_revaluation_batches",
    "fx_revaluation_entries",
    "audit_trail",
    "accounts",
    "subledger_records",
    "fiscal_periods",
    "tenant_members",
    "exchange_rates",
];
