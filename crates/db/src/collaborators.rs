//! Collaborator adapters over the reference tables.
//!
//! Accounts, fiscal periods, members and rates belong to other services; the
//! ledger reads the replicated rows under the same RLS context as its own.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use moka::future::Cache;
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};
use tracing::{debug, info};

use ledgerline_core::approval::{IdentitySnapshot, Member};
use ledgerline_core::currency::{ExchangeRate, RateType};
use ledgerline_core::journal::{AccountInfo, AccountRef, SubledgerLink};
use ledgerline_core::ports::{
    AccountDirectory, CollaboratorError, ExchangeRateSource, IdentityProvider, Notification,
    NotificationChannel, NotificationError, PeriodService,
};
use ledgerline_shared::types::{AccountId, CurrencyCode, FiscalPeriodId, TenantId, UserId};

use crate::entities::{accounts, exchange_rates, fiscal_periods, subledger_records, tenant_members};
use crate::error::collaborator_error;
use crate::rls::RlsConnection;

/// Default lifetime of a cached membership snapshot.
const IDENTITY_TTL_SECS: u64 = 60;

/// Default number of tenants whose snapshots are cached.
const IDENTITY_CACHE_CAPACITY: u64 = 1_000;

/// Chart of accounts and subledger records.
#[derive(Clone)]
pub struct PgAccounts {
    db: DatabaseConnection,
}

impl PgAccounts {
    /// Creates the adapter.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AccountDirectory for PgAccounts {
    async fn resolve_account(
        &self,
        tenant: TenantId,
        account: &AccountRef,
    ) -> Result<Option<AccountInfo>, CollaboratorError> {
        let err = |e: DbErr| collaborator_error("accounts", &e);
        let rls = RlsConnection::new(&self.db, tenant).await.map_err(err)?;

        let query = accounts::Entity::find()
            .filter(accounts::Column::TenantId.eq(tenant.into_inner()));
        let query = match account {
            AccountRef::Id(id) => query.filter(accounts::Column::Id.eq(id.into_inner())),
            AccountRef::Code(code) => query.filter(accounts::Column::Code.eq(code.trim())),
        };
        let row = query.one(rls.transaction()).await.map_err(err)?;
        rls.commit().await.map_err(err)?;

        Ok(row.map(|a| AccountInfo {
            id: AccountId::from_uuid(a.id),
            code: a.code,
            name: a.name,
            is_active: a.is_active,
            allow_direct_posting: a.allow_direct_posting,
        }))
    }

    async fn subledger_exists(
        &self,
        tenant: TenantId,
        link: &SubledgerLink,
    ) -> Result<bool, CollaboratorError> {
        let err = |e: DbErr| collaborator_error("subledgers", &e);
        let rls = RlsConnection::new(&self.db, tenant).await.map_err(err)?;
        let count = subledger_records::Entity::find()
            .filter(subledger_records::Column::TenantId.eq(tenant.into_inner()))
            .filter(subledger_records::Column::Kind.eq(link.kind.as_str()))
            .filter(subledger_records::Column::Reference.eq(link.reference.as_str()))
            .count(rls.transaction())
            .await
            .map_err(err)?;
        rls.commit().await.map_err(err)?;
        Ok(count > 0)
    }
}

/// Fiscal calendar.
#[derive(Clone)]
pub struct PgPeriods {
    db: DatabaseConnection,
}

impl PgPeriods {
    /// Creates the adapter.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PeriodService for PgPeriods {
    async fn is_open_for_posting(
        &self,
        tenant: TenantId,
        period: FiscalPeriodId,
        date: NaiveDate,
    ) -> Result<bool, CollaboratorError> {
        let err = |e: DbErr| collaborator_error("periods", &e);
        let rls = RlsConnection::new(&self.db, tenant).await.map_err(err)?;
        let row = fiscal_periods::Entity::find_by_id(period.into_inner())
            .filter(fiscal_periods::Column::TenantId.eq(tenant.into_inner()))
            .one(rls.transaction())
            .await
            .map_err(err)?;
        rls.commit().await.map_err(err)?;

        Ok(row.is_some_and(|p| p.status == "open" && p.start_date <= date && date <= p.end_date))
    }

    async fn period_for_date(
        &self,
        tenant: TenantId,
        date: NaiveDate,
    ) -> Result<Option<FiscalPeriodId>, CollaboratorError> {
        let err = |e: DbErr| collaborator_error("periods", &e);
        let rls = RlsConnection::new(&self.db, tenant).await.map_err(err)?;
        let row = fiscal_periods::Entity::find()
            .filter(fiscal_periods::Column::TenantId.eq(tenant.into_inner()))
            .filter(fiscal_periods::Column::StartDate.lte(date))
            .filter(fiscal_periods::Column::EndDate.gte(date))
            .order_by_asc(fiscal_periods::Column::StartDate)
            .one(rls.transaction())
            .await
            .map_err(err)?;
        rls.commit().await.map_err(err)?;
        Ok(row.map(|p| FiscalPeriodId::from_uuid(p.id)))
    }
}

/// Tenant membership, cached per tenant for a short time.
#[derive(Clone)]
pub struct PgIdentities {
    db: DatabaseConnection,
    cache: Cache<TenantId, IdentitySnapshot>,
}

impl PgIdentities {
    /// Creates the adapter with the default cache settings.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self::with_cache(db, IDENTITY_CACHE_CAPACITY, IDENTITY_TTL_SECS)
    }

    /// Creates the adapter with a custom cache size and lifetime.
    #[must_use]
    pub fn with_cache(db: DatabaseConnection, max_capacity: u64, ttl_secs: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();
        Self { db, cache }
    }

    /// Drops a tenant's cached snapshot.
    pub async fn invalidate(&self, tenant: TenantId) {
        self.cache.invalidate(&tenant).await;
    }

    async fn load(&self, tenant: TenantId) -> Result<IdentitySnapshot, DbErr> {
        let rls = RlsConnection::new(&self.db, tenant).await?;
        let rows = tenant_members::Entity::find()
            .filter(tenant_members::Column::TenantId.eq(tenant.into_inner()))
            .all(rls.transaction())
            .await?;
        rls.commit().await?;

        let members = rows
            .into_iter()
            .map(|row| Member {
                user_id: UserId::from_uuid(row.user_id),
                roles: roles_from_json(row.roles),
                manager_id: row.manager_id.map(UserId::from_uuid),
                active: row.active,
            })
            .collect();
        Ok(IdentitySnapshot::new(members))
    }
}

#[async_trait]
impl IdentityProvider for PgIdentities {
    async fn snapshot(&self, tenant: TenantId) -> Result<IdentitySnapshot, CollaboratorError> {
        if let Some(snapshot) = self.cache.get(&tenant).await {
            return Ok(snapshot);
        }
        let snapshot = self
            .load(tenant)
            .await
            .map_err(|e| collaborator_error("identities", &e))?;
        debug!(tenant_id = %tenant, members = snapshot.members.len(), "Loaded tenant members");
        self.cache.insert(tenant, snapshot.clone()).await;
        Ok(snapshot)
    }
}

/// Roles are stored as a JSON array of names; anything else means none.
fn roles_from_json(value: serde_json::Value) -> Vec<String> {
    serde_json::from_value(value).unwrap_or_default()
}

/// Published exchange rates.
#[derive(Clone)]
pub struct PgRates {
    db: DatabaseConnection,
}

impl PgRates {
    /// Creates the adapter.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ExchangeRateSource for PgRates {
    async fn rate(
        &self,
        tenant: TenantId,
        from: CurrencyCode,
        to: CurrencyCode,
        date: NaiveDate,
        rate_type: RateType,
    ) -> Result<Option<Decimal>, CollaboratorError> {
        if from == to {
            return Ok(Some(Decimal::ONE));
        }
        let err = |e: DbErr| collaborator_error("rates", &e);
        let (from_code, to_code) = (from.to_string(), to.to_string());

        // Latest quote on or before the date, in either direction.
        let pair = Condition::any()
            .add(
                Condition::all()
                    .add(exchange_rates::Column::FromCurrency.eq(from_code.as_str()))
                    .add(exchange_rates::Column::ToCurrency.eq(to_code.as_str())),
            )
            .add(
                Condition::all()
                    .add(exchange_rates::Column::FromCurrency.eq(to_code.as_str()))
                    .add(exchange_rates::Column::ToCurrency.eq(from_code.as_str())),
            );

        let rls = RlsConnection::new(&self.db, tenant).await.map_err(err)?;
        let rows = exchange_rates::Entity::find()
            .filter(exchange_rates::Column::TenantId.eq(tenant.into_inner()))
            .filter(exchange_rates::Column::RateType.eq(rate_type.as_str()))
            .filter(exchange_rates::Column::EffectiveDate.lte(date))
            .filter(pair)
            .order_by_desc(exchange_rates::Column::EffectiveDate)
            .limit(2)
            .all(rls.transaction())
            .await
            .map_err(err)?;
        rls.commit().await.map_err(err)?;

        let Some(latest) = rows.first() else {
            return Ok(None);
        };
        // A direct quote wins over an inverse one from the same day.
        let row = rows
            .iter()
            .find(|r| r.effective_date == latest.effective_date && r.from_currency.trim() == from_code)
            .unwrap_or(latest);
        if row.from_currency.trim() == from_code {
            return Ok(Some(row.rate));
        }
        let quote = ExchangeRate::new(to, from, row.rate, rate_type, row.effective_date);
        Ok(quote.inverse().map(|r| r.rate))
    }
}

/// Notification channel that writes each event to the log. Delivery to
/// people is the notification service's job; it tails these events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl NotificationChannel for TracingNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotificationError> {
        info!(
            tenant_id = %notification.tenant_id,
            event = notification.event.as_str(),
            request_id = %notification.request_id,
            document_id = %notification.document.id,
            recipients = notification.recipients.len(),
            "Approval notification"
        );
        Ok(())
    }
}
