//! Fixed collaborator data held in memory, for tests, demos and the jobs
//! binary's dry runs.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::{DashMap, DashSet};
use rust_decimal::Decimal;

use ledgerline_shared::types::{CurrencyCode, FiscalPeriodId, TenantId};

use crate::approval::IdentitySnapshot;
use crate::currency::{ExchangeRate, RateType};
use crate::journal::{AccountInfo, AccountRef, SubledgerLink};
use crate::ports::{
    AccountDirectory, CollaboratorError, ExchangeRateSource, IdentityProvider, Notification,
    NotificationChannel, NotificationError, PeriodService,
};

/// Chart of accounts and subledger records per tenant.
#[derive(Debug, Default)]
pub struct StaticAccounts {
    accounts: DashMap<TenantId, Vec<AccountInfo>>,
    subledgers: DashSet<(TenantId, SubledgerLink)>,
}

impl StaticAccounts {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an account.
    pub fn add_account(&self, tenant: TenantId, account: AccountInfo) {
        self.accounts.entry(tenant).or_default().push(account);
    }

    /// Registers a subledger record.
    pub fn add_subledger(&self, tenant: TenantId, link: SubledgerLink) {
        self.subledgers.insert((tenant, link));
    }
}

#[async_trait]
impl AccountDirectory for StaticAccounts {
    async fn resolve_account(
        &self,
        tenant: TenantId,
        account: &AccountRef,
    ) -> Result<Option<AccountInfo>, CollaboratorError> {
        Ok(self.accounts.get(&tenant).and_then(|accounts| {
            accounts
                .iter()
                .find(|a| match account {
                    AccountRef::Id(id) => a.id == *id,
                    AccountRef::Code(code) => a.code == *code,
                })
                .cloned()
        }))
    }

    async fn subledger_exists(
        &self,
        tenant: TenantId,
        link: &SubledgerLink,
    ) -> Result<bool, CollaboratorError> {
        Ok(self.subledgers.contains(&(tenant, link.clone())))
    }
}

/// One fiscal period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodWindow {
    /// Period id.
    pub id: FiscalPeriodId,
    /// First day.
    pub start: NaiveDate,
    /// Last day.
    pub end: NaiveDate,
    /// Whether postings are accepted.
    pub open: bool,
}

impl PeriodWindow {
    fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Fiscal calendar per tenant.
#[derive(Debug, Default)]
pub struct StaticPeriods {
    periods: DashMap<TenantId, Vec<PeriodWindow>>,
}

impl StaticPeriods {
    /// Creates an empty calendar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a period.
    pub fn add_period(&self, tenant: TenantId, period: PeriodWindow) {
        self.periods.entry(tenant).or_default().push(period);
    }

    /// Opens or closes a period.
    pub fn set_open(&self, tenant: TenantId, period: FiscalPeriodId, open: bool) {
        if let Some(mut periods) = self.periods.get_mut(&tenant) {
            for window in periods.iter_mut().filter(|p| p.id == period) {
                window.open = open;
            }
        }
    }
}

#[async_trait]
impl PeriodService for StaticPeriods {
    async fn is_open_for_posting(
        &self,
        tenant: TenantId,
        period: FiscalPeriodId,
        date: NaiveDate,
    ) -> Result<bool, CollaboratorError> {
        Ok(self.periods.get(&tenant).is_some_and(|periods| {
            periods
                .iter()
                .any(|p| p.id == period && p.open && p.contains(date))
        }))
    }

    async fn period_for_date(
        &self,
        tenant: TenantId,
        date: NaiveDate,
    ) -> Result<Option<FiscalPeriodId>, CollaboratorError> {
        Ok(self
            .periods
            .get(&tenant)
            .and_then(|periods| periods.iter().find(|p| p.contains(date)).map(|p| p.id)))
    }
}

/// Tenant membership per tenant.
#[derive(Debug, Default)]
pub struct StaticIdentities {
    snapshots: DashMap<TenantId, IdentitySnapshot>,
}

impl StaticIdentities {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces a tenant's members.
    pub fn set(&self, tenant: TenantId, snapshot: IdentitySnapshot) {
        self.snapshots.insert(tenant, snapshot);
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentities {
    async fn snapshot(&self, tenant: TenantId) -> Result<IdentitySnapshot, CollaboratorError> {
        Ok(self
            .snapshots
            .get(&tenant)
            .map(|s| s.clone())
            .unwrap_or_default())
    }
}

/// Published rates per tenant.
#[derive(Debug, Default)]
pub struct StaticRates {
    rates: DashMap<TenantId, Vec<ExchangeRate>>,
}

impl StaticRates {
    /// Creates an empty rate table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a rate.
    pub fn publish(&self, tenant: TenantId, rate: ExchangeRate) {
        self.rates.entry(tenant).or_default().push(rate);
    }
}

#[async_trait]
impl ExchangeRateSource for StaticRates {
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
        let Some(rates) = self.rates.get(&tenant) else {
            return Ok(None);
        };
        // Latest rate on or before the date; an inverse quote also serves.
        let effective = rates
            .iter()
            .filter(|r| r.rate_type == rate_type && r.effective_date <= date)
            .filter_map(|r| {
                if r.from_currency == from && r.to_currency == to {
                    Some(r.clone())
                } else if r.from_currency == to && r.to_currency == from {
                    r.inverse()
                } else {
                    None
                }
            })
            .max_by_key(|r| r.effective_date);
        Ok(effective.map(|r| r.rate))
    }
}

/// Notification channel that keeps what it was asked to send.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    /// Creates a notifier that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following dispatch fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Notifications accepted so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl NotificationChannel for RecordingNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotificationError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotificationError("channel offline".to_string()));
        }
        self.sent
            .lock()
            .map_err(|e| NotificationError(e.to_string()))?
            .push(notification.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerline_shared::types::AccountId;
    use rust_decimal_macros::dec;

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, month, day).unwrap()
    }

    #[tokio::test]
    async fn test_account_resolution_by_id_and_code() {
        let directory = StaticAccounts::new();
        let tenant = TenantId::new();
        let cash = AccountInfo {
            id: AccountId::new(),
            code: "1000".to_string(),
            name: "Cash".to_string(),
            is_active: true,
            allow_direct_posting: true,
        };
        directory.add_account(tenant, cash.clone());

        let by_code = directory
            .resolve_account(tenant, &AccountRef::Code("1000".to_string()))
            .await
            .unwrap();
        let by_id = directory
            .resolve_account(tenant, &AccountRef::Id(cash.id))
            .await
            .unwrap();
        let other_tenant = directory
            .resolve_account(TenantId::new(), &AccountRef::Id(cash.id))
            .await
            .unwrap();

        assert_eq!(by_code, Some(cash.clone()));
        assert_eq!(by_id, Some(cash));
        assert!(other_tenant.is_none());
    }

    #[tokio::test]
    async fn test_period_open_and_lookup() {
        let periods = StaticPeriods::new();
        let tenant = TenantId::new();
        let january = PeriodWindow {
            id: FiscalPeriodId::new(),
            start: date(1, 1),
            end: date(1, 31),
            open: true,
        };
        periods.add_period(tenant, january);

        assert!(periods.is_open_for_posting(tenant, january.id, date(1, 15)).await.unwrap());
        assert!(!periods.is_open_for_posting(tenant, january.id, date(2, 1)).await.unwrap());
        assert_eq!(periods.period_for_date(tenant, date(1, 31)).await.unwrap(), Some(january.id));

        periods.set_open(tenant, january.id, false);
        assert!(!periods.is_open_for_posting(tenant, january.id, date(1, 15)).await.unwrap());
    }

    #[tokio::test]
    async fn test_latest_rate_on_or_before_date() {
        let rates = StaticRates::new();
        let tenant = TenantId::new();
        for (day, rate) in [(1, dec!(1.05)), (31, dec!(1.10))] {
            rates.publish(
                tenant,
                ExchangeRate::new(CurrencyCode::EUR, CurrencyCode::USD, rate, RateType::Closing, date(1, day)),
            );
        }

        let mid_month = rates
            .rate(tenant, CurrencyCode::EUR, CurrencyCode::USD, date(1, 20), RateType::Closing)
            .await
            .unwrap();
        let month_end = rates
            .rate(tenant, CurrencyCode::EUR, CurrencyCode::USD, date(1, 31), RateType::Closing)
            .await
            .unwrap();
        let average = rates
            .rate(tenant, CurrencyCode::EUR, CurrencyCode::USD, date(1, 31), RateType::Average)
            .await
            .unwrap();

        assert_eq!(mid_month, Some(dec!(1.05)));
        assert_eq!(month_end, Some(dec!(1.10)));
        assert!(average.is_none());
    }

    #[test]
    fn test_failing_notifier_keeps_nothing() {
        let notifier = RecordingNotifier::new();
        notifier.set_failing(true);
        let notification = Notification {
            tenant_id: TenantId::new(),
            event: crate::ports::NotificationEvent::Approved,
            request_id: ledgerline_shared::types::ApprovalRequestId::new(),
            document: crate::approval::DocumentRef {
                doc_type: "journal_entry".to_string(),
                id: uuid::Uuid::now_v7(),
                amount: dec!(1),
                currency: CurrencyCode::USD,
            },
            recipients: Vec::new(),
        };

        assert!(notifier.notify(&notification).is_err());
        assert!(notifier.sent().is_empty());
    }
}
