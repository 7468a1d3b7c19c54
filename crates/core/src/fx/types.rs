//! FX revaluation domain types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use ledgerline_shared::config::FxConfig;
use ledgerline_shared::types::{
    AccountId, Actor, CurrencyCode, FiscalPeriodId, FxBatchId, FxEntryId, JournalEntryId,
    JournalLineId, OpenItemId, TenantId,
};

use crate::currency::RateType;
use crate::journal::{JournalEntry, JournalLine, SubledgerLink};

/// Namespace for deterministic batch and entry ids.
const FX_NAMESPACE: Uuid = Uuid::from_u128(0x6c65_6467_6572_6c69_6e65_2d66_782d_7631);

/// Which balances are revalued and at which rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevaluationMethod {
    /// Monetary balance sheet positions at the closing rate.
    BalanceSheet,
    /// Individual open items at the closing rate.
    OpenItem,
    /// Open items at the period average rate.
    AverageRate,
    /// Open items at the closing rate.
    ClosingRate,
}

impl RevaluationMethod {
    /// Returns the string representation of the method.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BalanceSheet => "balance_sheet",
            Self::OpenItem => "open_item",
            Self::AverageRate => "average_rate",
            Self::ClosingRate => "closing_rate",
        }
    }

    /// Parses a method from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "balance_sheet" => Some(Self::BalanceSheet),
            "open_item" => Some(Self::OpenItem),
            "average_rate" => Some(Self::AverageRate),
            "closing_rate" => Some(Self::ClosingRate),
            _ => None,
        }
    }

    /// The published rate this method revalues at.
    #[must_use]
    pub const fn rate_type(&self) -> RateType {
        match self {
            Self::AverageRate => RateType::Average,
            Self::BalanceSheet | Self::OpenItem | Self::ClosingRate => RateType::Closing,
        }
    }
}

impl fmt::Display for RevaluationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Restricts a batch to some currencies and accounts; empty lists mean all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevaluationScope {
    /// Currencies to revalue.
    #[serde(default)]
    pub currencies: Vec<CurrencyCode>,
    /// Accounts to revalue.
    #[serde(default)]
    pub accounts: Vec<AccountId>,
}

impl RevaluationScope {
    /// Whether an item in `currency` on `account` is in scope.
    #[must_use]
    pub fn includes(&self, currency: CurrencyCode, account: AccountId) -> bool {
        (self.currencies.is_empty() || self.currencies.contains(&currency))
            && (self.accounts.is_empty() || self.accounts.contains(&account))
    }

    /// Canonical text form, independent of list order and duplicates.
    #[must_use]
    pub fn canonical(&self) -> String {
        let mut currencies: Vec<&str> = self.currencies.iter().map(CurrencyCode::as_str).collect();
        currencies.sort_unstable();
        currencies.dedup();
        let mut accounts: Vec<String> = self.accounts.iter().map(ToString::to_string).collect();
        accounts.sort_unstable();
        accounts.dedup();

        let join = |parts: Vec<String>| {
            if parts.is_empty() {
                "*".to_string()
            } else {
                parts.join(",")
            }
        };
        format!(
            "{}/{}",
            join(currencies.into_iter().map(str::to_string).collect()),
            join(accounts)
        )
    }
}

/// Identity of a posting run: (scope, date, method).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchKey(String);

impl BatchKey {
    /// Key for a revaluation run.
    #[must_use]
    pub fn revaluation(scope: &RevaluationScope, date: NaiveDate, method: RevaluationMethod) -> Self {
        Self(format!("revaluation|{method}|{date}|{}", scope.canonical()))
    }

    /// Key for the settlement of one open item.
    #[must_use]
    pub fn settlement(item: OpenItemId) -> Self {
        Self(format!("settlement|{item}"))
    }

    /// Rebuilds a key from storage.
    #[must_use]
    pub fn from_stored(key: String) -> Self {
        Self(key)
    }

    /// The key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An unsettled foreign-currency receivable or payable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenItem {
    /// Item id.
    pub id: OpenItemId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// GL account carrying the balance.
    pub account_id: AccountId,
    /// Posting entry that opened the item.
    pub source_entry_id: JournalEntryId,
    /// Line that opened the item.
    pub source_line_id: JournalLineId,
    /// Subledger record.
    pub subledger: SubledgerLink,
    /// Document currency.
    pub currency: CurrencyCode,
    /// Signed document amount (debit positive).
    pub amount: Decimal,
    /// Rate at booking.
    pub original_rate: Decimal,
    /// Signed base amount at booking.
    pub original_base_amount: Decimal,
    /// Signed base amount after the last posted revaluation.
    pub carrying_base_amount: Decimal,
    /// Booking date.
    pub opened_on: NaiveDate,
    /// Settlement time, once settled.
    pub settled_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency version.
    pub version: i64,
}

impl OpenItem {
    /// Opens an item for a posted foreign-currency line linked to a
    /// receivable or payable; `None` for any other line.
    #[must_use]
    pub fn from_posted_line(entry: &JournalEntry, line: &JournalLine) -> Option<Self> {
        let subledger = line.subledger.clone()?;
        if entry.currency == entry.base_currency || !subledger.kind.tracks_open_items() {
            return None;
        }
        Some(Self {
            id: OpenItemId::new(),
            tenant_id: entry.tenant_id,
            account_id: line.account_id,
            source_entry_id: entry.id,
            source_line_id: line.id,
            subledger,
            currency: entry.currency,
            amount: line.signed_amount(),
            original_rate: line.exchange_rate.unwrap_or(entry.exchange_rate),
            original_base_amount: line.signed_base_amount(),
            carrying_base_amount: line.signed_base_amount(),
            opened_on: entry.entry_date,
            settled_at: None,
            version: 1,
        })
    }

    /// Whether the item is still open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.settled_at.is_none()
    }

    /// Revaluation adjustments posted so far.
    #[must_use]
    pub fn accumulated_unrealized(&self) -> Decimal {
        self.carrying_base_amount - self.original_base_amount
    }
}

/// Whether a gain or loss is still a valuation or has been realized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GainLossTag {
    /// Position still open.
    Unrealized,
    /// Position settled.
    Realized,
}

impl GainLossTag {
    /// Returns the string representation of the tag.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unrealized => "unrealized",
            Self::Realized => "realized",
        }
    }

    /// Parses a tag from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unrealized" => Some(Self::Unrealized),
            "realized" => Some(Self::Realized),
            _ => None,
        }
    }
}

/// One recomputed position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FxRevaluationEntry {
    /// Entry id (deterministic per batch and item).
    pub id: FxEntryId,
    /// Batch.
    pub batch_id: FxBatchId,
    /// Revalued item.
    pub open_item_id: OpenItemId,
    /// Item account.
    pub account_id: AccountId,
    /// Item currency.
    pub currency: CurrencyCode,
    /// Signed document amount.
    pub amount: Decimal,
    /// Base amount compared against.
    pub original_base_amount: Decimal,
    /// Rate applied.
    pub revaluation_rate: Decimal,
    /// Base amount at that rate.
    pub revalued_base_amount: Decimal,
    /// `revalued - original`, signed.
    pub gain_loss: Decimal,
    /// Unrealized or realized.
    pub tag: GainLossTag,
}

/// What a batch does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    /// Period-end revaluation of open items.
    Revaluation,
    /// Settlement of one open item.
    Settlement,
}

impl BatchKind {
    /// Returns the string representation of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Revaluation => "revaluation",
            Self::Settlement => "settlement",
        }
    }

    /// Parses a kind from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "revaluation" => Some(Self::Revaluation),
            "settlement" => Some(Self::Settlement),
            _ => None,
        }
    }
}

/// Batch status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Computed only.
    Preview,
    /// Posted to the ledger.
    Posted,
}

impl BatchStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Preview => "preview",
            Self::Posted => "posted",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "preview" => Some(Self::Preview),
            "posted" => Some(Self::Posted),
            _ => None,
        }
    }
}

/// Gain/loss per position at a revaluation date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FxRevaluationBatch {
    /// Batch id (deterministic per tenant and key).
    pub id: FxBatchId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Revaluation or settlement.
    pub kind: BatchKind,
    /// Re-run guard key.
    pub key: BatchKey,
    /// Revaluation date.
    pub revaluation_date: NaiveDate,
    /// Method.
    pub method: RevaluationMethod,
    /// Scope.
    pub scope: RevaluationScope,
    /// Period the adjustment posts into.
    pub fiscal_period_id: FiscalPeriodId,
    /// Base currency.
    pub base_currency: CurrencyCode,
    /// Computed positions.
    pub entries: Vec<FxRevaluationEntry>,
    /// Net unrealized (or realized) result.
    pub total_gain_loss: Decimal,
    /// Preview or posted.
    pub status: BatchStatus,
    /// Consolidated journal entry, once posted.
    pub journal_entry_id: Option<JournalEntryId>,
    /// Who ran it.
    pub created_by: Actor,
    /// When.
    pub created_at: DateTime<Utc>,
}

impl FxRevaluationBatch {
    /// Deterministic batch id.
    #[must_use]
    pub fn id_for(tenant: TenantId, key: &BatchKey) -> FxBatchId {
        FxBatchId::from_uuid(Uuid::new_v5(
            &FX_NAMESPACE,
            format!("{tenant}|{key}").as_bytes(),
        ))
    }

    /// Deterministic entry id.
    #[must_use]
    pub fn entry_id_for(batch: FxBatchId, item: OpenItemId, tag: GainLossTag) -> FxEntryId {
        FxEntryId::from_uuid(Uuid::new_v5(
            &FX_NAMESPACE,
            format!("{batch}|{item}|{}", tag.as_str()).as_bytes(),
        ))
    }

    /// Whether there is nothing to post.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Account codes receiving FX results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FxAccounts {
    /// Unrealized gain.
    pub unrealized_gain: String,
    /// Unrealized loss.
    pub unrealized_loss: String,
    /// Realized gain.
    pub realized_gain: String,
    /// Realized loss.
    pub realized_loss: String,
}

impl From<&FxConfig> for FxAccounts {
    fn from(config: &FxConfig) -> Self {
        Self {
            unrealized_gain: config.unrealized_gain_account.clone(),
            unrealized_loss: config.unrealized_loss_account.clone(),
            realized_gain: config.realized_gain_account.clone(),
            realized_loss: config.realized_loss_account.clone(),
        }
    }
}

impl Default for FxAccounts {
    fn default() -> Self {
        Self::from(&FxConfig::default())
    }
}
