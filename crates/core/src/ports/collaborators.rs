//! Narrow interfaces to the services the ledger consumes but does not own.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ledgerline_shared::types::{
    ApprovalRequestId, CurrencyCode, FiscalPeriodId, TenantId, UserId,
};

use super::error::{CollaboratorError, NotificationError};
use crate::approval::{DocumentRef, IdentitySnapshot};
use crate::currency::RateType;
use crate::journal::{AccountInfo, AccountRef, SubledgerLink};

/// Chart of accounts and subledger lookups.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Resolves an account by id or code; `None` if unknown.
    async fn resolve_account(
        &self,
        tenant: TenantId,
        account: &AccountRef,
    ) -> Result<Option<AccountInfo>, CollaboratorError>;

    /// Whether a subledger record exists.
    async fn subledger_exists(
        &self,
        tenant: TenantId,
        link: &SubledgerLink,
    ) -> Result<bool, CollaboratorError>;
}

/// Fiscal calendar.
#[async_trait]
pub trait PeriodService: Send + Sync {
    /// Whether `period` accepts postings dated `date`.
    async fn is_open_for_posting(
        &self,
        tenant: TenantId,
        period: FiscalPeriodId,
        date: NaiveDate,
    ) -> Result<bool, CollaboratorError>;

    /// The period containing `date`, if any.
    async fn period_for_date(
        &self,
        tenant: TenantId,
        date: NaiveDate,
    ) -> Result<Option<FiscalPeriodId>, CollaboratorError>;
}

/// Tenant membership, roles and reporting lines.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Current membership facts for approver resolution.
    async fn snapshot(&self, tenant: TenantId) -> Result<IdentitySnapshot, CollaboratorError>;
}

/// Published exchange rates.
#[async_trait]
pub trait ExchangeRateSource: Send + Sync {
    /// The `from` to `to` rate effective on `date`.
    async fn rate(
        &self,
        tenant: TenantId,
        from: CurrencyCode,
        to: CurrencyCode,
        date: NaiveDate,
        rate_type: RateType,
    ) -> Result<Option<Decimal>, CollaboratorError>;
}

/// Approval events pushed to people.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    /// A step is waiting on its approvers.
    ApprovalRequired,
    /// The request completed with approval.
    Approved,
    /// The request was rejected.
    Rejected,
    /// A step went past its escalation window.
    Escalated,
}

impl NotificationEvent {
    /// Returns the string representation of the event.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ApprovalRequired => "approval_required",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Escalated => "escalated",
        }
    }
}

/// One message to dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Tenant.
    pub tenant_id: TenantId,
    /// Event.
    pub event: NotificationEvent,
    /// Request concerned.
    pub request_id: ApprovalRequestId,
    /// Document concerned.
    pub document: DocumentRef,
    /// Who should hear about it.
    pub recipients: Vec<UserId>,
}

/// Fire-and-forget dispatch. Failures are logged by the caller and never
/// undo the transition that triggered them.
#[cfg_attr(test, mockall::automock)]
pub trait NotificationChannel: Send + Sync {
    /// Sends one notification.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError` if the message could not be handed off.
    fn notify(&self, notification: &Notification) -> Result<(), NotificationError>;
}
