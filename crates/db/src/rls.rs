//! Row-Level Security (RLS) context management.
//!
//! Every tenant table carries a `tenant_isolation` policy keyed on the
//! `app.current_tenant_id` setting. A transaction opened through
//! [`RlsConnection`] sets it with `SET LOCAL`, so the scope ends with the
//! transaction and a pooled connection never leaks one tenant's context to
//! the next borrower.
//!
//! ```ignore
//! let rls = RlsConnection::new(&db, tenant).await?;
//! let entries = journal_entries::Entity::find().all(rls.transaction()).await?;
//! rls.commit().await?;
//! ```

use sea_orm::{ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr, TransactionTrait};

use ledgerline_shared::types::TenantId;

/// A transaction bound to one tenant's rows.
pub struct RlsConnection {
    txn: DatabaseTransaction,
}

impl RlsConnection {
    /// Begins a transaction and sets the tenant context on it.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started or the context
    /// cannot be set.
    pub async fn new(db: &DatabaseConnection, tenant: TenantId) -> Result<Self, DbErr> {
        let txn = db.begin().await?;
        set_rls_context(&txn, tenant).await?;
        Ok(Self { txn })
    }

    /// The underlying transaction.
    #[must_use]
    pub fn transaction(&self) -> &DatabaseTransaction {
        &self.txn
    }

    /// Unwraps the transaction, keeping the context set on it.
    #[must_use]
    pub fn into_inner(self) -> DatabaseTransaction {
        self.txn
    }

    /// Commits the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails.
    pub async fn commit(self) -> Result<(), DbErr> {
        self.txn.commit().await
    }

    /// Rolls back the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback fails.
    pub async fn rollback(self) -> Result<(), DbErr> {
        self.txn.rollback().await
    }
}

/// Extension trait for opening tenant-scoped transactions.
#[async_trait::async_trait]
pub trait RlsExt {
    /// Opens an [`RlsConnection`] for `tenant`.
    ///
    /// # Errors
    ///
    /// Returns an error if the RLS connection cannot be created.
    async fn with_rls(&self, tenant: TenantId) -> Result<RlsConnection, DbErr>;
}

#[async_trait::async_trait]
impl RlsExt for DatabaseConnection {
    async fn with_rls(&self, tenant: TenantId) -> Result<RlsConnection, DbErr> {
        RlsConnection::new(self, tenant).await
    }
}

/// Sets the tenant context on an existing transaction.
///
/// # Errors
///
/// Returns an error if the statement fails.
pub async fn set_rls_context(txn: &DatabaseTransaction, tenant: TenantId) -> Result<(), DbErr> {
    txn.execute_unprepared(&context_sql(tenant)).await?;
    Ok(())
}

// A typed id renders as a bare UUID, so interpolation cannot inject SQL.
fn context_sql(tenant: TenantId) -> String {
    format!("SET LOCAL app.current_tenant_id = '{tenant}'")
}
