//! `PostgreSQL` persistence for Ledgerline.
//!
//! - `SeaORM` entity definitions, one per table
//! - Repository functions mapping rows to domain types
//! - [`PgStore`], the ledger store port over tenant-scoped transactions
//! - Collaborator adapters over the reference tables
//! - Database migrations

pub mod collaborators;
pub mod entities;
pub mod error;
pub mod migration;
pub mod repositories;
pub mod rls;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use tracing::info;

use ledgerline_core::Collaborators;
use ledgerline_shared::config::DatabaseConfig;

pub use collaborators::{PgAccounts, PgIdentities, PgPeriods, PgRates, TracingNotifier};
pub use rls::{RlsConnection, RlsExt};
pub use store::{PgStore, PgTx};

/// Establishes a connection pool sized from configuration.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Database pool ready"
    );
    Ok(db)
}

/// Every collaborator port backed by this database.
#[must_use]
pub fn collaborators(db: &DatabaseConnection) -> Collaborators {
    Collaborators {
        accounts: Arc::new(PgAccounts::new(db.clone())),
        periods: Arc::new(PgPeriods::new(db.clone())),
        identities: Arc::new(PgIdentities::new(db.clone())),
        rates: Arc::new(PgRates::new(db.clone())),
        notifier: Arc::new(TracingNotifier),
    }
}
