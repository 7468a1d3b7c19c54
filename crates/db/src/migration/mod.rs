//! Database migrations.
//!
//! Migrations are managed using sea-orm-migration.

pub use sea_orm_migration::prelude::*;

mod m20260401_000001_ledger;
mod m20260401_000002_reference_data;
mod m20260401_000003_force_rls;

/// Migrator for running database migrations.
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260401_000001_ledger::Migration),
            Box::new(m20260401_000002_reference_data::Migration),
            Box::new(m20260401_000003_force_rls::Migration),
        ]
    }
}
