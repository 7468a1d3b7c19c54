//! Journal entry domain types.
//!
//! A journal entry is a header plus ordered debit/credit lines. Drafts are
//! what callers submit; `JournalEntry` is what the validator produces and the
//! store persists.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use ledgerline_shared::types::{
    AccountId, Actor, ApprovalRequestId, CurrencyCode, FiscalPeriodId, JournalEntryId,
    JournalLineId, SubScopeId, TenantId,
};

/// Journal entry classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Ordinary business transaction.
    Normal,
    /// Opening balances for a fiscal year.
    Opening,
    /// Year-end closing entry.
    Closing,
    /// Period-end adjustment.
    Adjustment,
    /// Mirror of a posted entry.
    Reversal,
    /// Consolidation across sub-scopes.
    Consolidation,
    /// Intercompany elimination.
    Elimination,
    /// FX revaluation or settlement adjustment.
    Revaluation,
}

impl EntryKind {
    /// Returns the string representation of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Opening => "opening",
            Self::Closing => "closing",
            Self::Adjustment => "adjustment",
            Self::Reversal => "reversal",
            Self::Consolidation => "consolidation",
            Self::Elimination => "elimination",
            Self::Revaluation => "revaluation",
        }
    }

    /// Parses a kind from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "normal" => Some(Self::Normal),
            "opening" => Some(Self::Opening),
            "closing" => Some(Self::Closing),
            "adjustment" => Some(Self::Adjustment),
            "reversal" => Some(Self::Reversal),
            "consolidation" => Some(Self::Consolidation),
            "elimination" => Some(Self::Elimination),
            "revaluation" => Some(Self::Revaluation),
            _ => None,
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Journal entry lifecycle status.
///
/// ```text
/// DRAFT -> PENDING_APPROVAL -> APPROVED -> POSTED -> REVERSED
///   ^            |
///   +-- REJECTED-+            (VOID reachable from any pre-POSTED state)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalStatus {
    /// Being drafted, editable.
    Draft,
    /// Waiting on an approval request.
    PendingApproval,
    /// Approved, waiting to be posted.
    Approved,
    /// Posted to the ledger (immutable).
    Posted,
    /// Returned by an approver, editable.
    Rejected,
    /// Cancelled before posting (terminal).
    Void,
    /// Offset by a reversal entry (terminal).
    Reversed,
}

impl JournalStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::Posted => "posted",
            Self::Rejected => "rejected",
            Self::Void => "void",
            Self::Reversed => "reversed",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "pending_approval" => Some(Self::PendingApproval),
            "approved" => Some(Self::Approved),
            "posted" => Some(Self::Posted),
            "rejected" => Some(Self::Rejected),
            "void" => Some(Self::Void),
            "reversed" => Some(Self::Reversed),
            _ => None,
        }
    }

    /// Returns true if header and lines may still be changed.
    #[must_use]
    pub const fn is_editable(&self) -> bool {
        matches!(self, Self::Draft | Self::Rejected)
    }

    /// Returns true once line contents are frozen.
    #[must_use]
    pub const fn is_immutable(&self) -> bool {
        matches!(self, Self::Posted | Self::Reversed | Self::Void)
    }

    /// Returns true if no further transition is possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Void | Self::Reversed)
    }
}

impl fmt::Display for JournalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detail ledger a line drills down into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubledgerKind {
    /// Customer invoices.
    Receivable,
    /// Vendor bills.
    Payable,
    /// Stock records.
    Inventory,
    /// Fixed asset register.
    FixedAsset,
    /// Bank statement lines.
    Bank,
}

impl SubledgerKind {
    /// Returns the string representation of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Receivable => "receivable",
            Self::Payable => "payable",
            Self::Inventory => "inventory",
            Self::FixedAsset => "fixed_asset",
            Self::Bank => "bank",
        }
    }

    /// Parses a kind from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "receivable" => Some(Self::Receivable),
            "payable" => Some(Self::Payable),
            "inventory" => Some(Self::Inventory),
            "fixed_asset" => Some(Self::FixedAsset),
            "bank" => Some(Self::Bank),
            _ => None,
        }
    }

    /// Open receivable/payable balances are tracked for FX revaluation.
    #[must_use]
    pub const fn tracks_open_items(&self) -> bool {
        matches!(self, Self::Receivable | Self::Payable)
    }
}

impl fmt::Display for SubledgerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Link from a line to a subledger record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubledgerLink {
    /// Which subledger.
    pub kind: SubledgerKind,
    /// Record reference inside that subledger (invoice number, asset tag, ...).
    pub reference: String,
}

impl fmt::Display for SubledgerLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.reference)
    }
}

/// Tax code and amount carried on a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxDetail {
    /// Tax code.
    pub code: String,
    /// Tax amount in document currency.
    pub amount: Decimal,
}

/// Account reference as supplied by a caller: an id or a chart code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccountRef {
    /// Account id.
    Id(AccountId),
    /// Account code from the chart of accounts.
    Code(String),
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Code(code) => f.write_str(code),
        }
    }
}

/// One proposed line of a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLineInput {
    /// Account to post to.
    pub account: AccountRef,
    /// Line description.
    #[serde(default)]
    pub description: Option<String>,
    /// Debit amount in document currency.
    #[serde(default)]
    pub debit: Decimal,
    /// Credit amount in document currency.
    #[serde(default)]
    pub credit: Decimal,
    /// Pre-computed base debit (imports of historical entries only).
    #[serde(default)]
    pub base_debit: Option<Decimal>,
    /// Pre-computed base credit (imports of historical entries only).
    #[serde(default)]
    pub base_credit: Option<Decimal>,
    /// Per-line override of the header exchange rate.
    #[serde(default)]
    pub exchange_rate: Option<Decimal>,
    /// Subledger drill-down link.
    #[serde(default)]
    pub subledger: Option<SubledgerLink>,
    /// Free-form cost/department/project tags.
    #[serde(default)]
    pub dimensions: Vec<String>,
    /// Tax code and amount.
    #[serde(default)]
    pub tax: Option<TaxDetail>,
    /// Intercompany line.
    #[serde(default)]
    pub intercompany: bool,
    /// Counter-party sub-scope for intercompany lines.
    #[serde(default)]
    pub counterparty_scope_id: Option<SubScopeId>,
}

impl JournalLineInput {
    /// A plain debit line.
    #[must_use]
    pub fn debit(account: AccountRef, amount: Decimal) -> Self {
        Self::plain(account, amount, Decimal::ZERO)
    }

    /// A plain credit line.
    #[must_use]
    pub fn credit(account: AccountRef, amount: Decimal) -> Self {
        Self::plain(account, Decimal::ZERO, amount)
    }

    fn plain(account: AccountRef, debit: Decimal, credit: Decimal) -> Self {
        Self {
            account,
            description: None,
            debit,
            credit,
            base_debit: None,
            base_credit: None,
            exchange_rate: None,
            subledger: None,
            dimensions: Vec::new(),
            tax: None,
            intercompany: false,
            counterparty_scope_id: None,
        }
    }
}

/// A proposed journal entry, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntryDraft {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Optional sub-scope.
    pub sub_scope_id: Option<SubScopeId>,
    /// Fiscal period the entry posts into.
    pub fiscal_period_id: FiscalPeriodId,
    /// Accounting date.
    pub entry_date: NaiveDate,
    /// Entry classification.
    pub kind: EntryKind,
    /// Module that produced the entry (`"gl"`, `"ap"`, `"fx"`, ...).
    pub source_module: String,
    /// Source document reference.
    pub source_document: Option<String>,
    /// Header description.
    pub description: String,
    /// Free-text notes.
    pub notes: Option<String>,
    /// Document currency.
    pub currency: CurrencyCode,
    /// Document-to-base exchange rate.
    pub exchange_rate: Decimal,
    /// Proposed lines, in display order.
    pub lines: Vec<JournalLineInput>,
    /// Who is drafting the entry.
    pub created_by: Actor,
}

/// A validated line, as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    /// Line id.
    pub id: JournalLineId,
    /// 1-based line number, unique within the entry.
    pub line_number: u32,
    /// Resolved account.
    pub account_id: AccountId,
    /// Line description.
    pub description: Option<String>,
    /// Debit amount in document currency.
    pub debit: Decimal,
    /// Credit amount in document currency.
    pub credit: Decimal,
    /// Debit amount in base currency.
    pub base_debit: Decimal,
    /// Credit amount in base currency.
    pub base_credit: Decimal,
    /// Per-line rate override that was applied.
    pub exchange_rate: Option<Decimal>,
    /// Subledger drill-down link.
    pub subledger: Option<SubledgerLink>,
    /// Free-form tags.
    pub dimensions: Vec<String>,
    /// Tax code and amount.
    pub tax: Option<TaxDetail>,
    /// Intercompany line.
    pub intercompany: bool,
    /// Counter-party sub-scope.
    pub counterparty_scope_id: Option<SubScopeId>,
}

impl JournalLine {
    /// Signed document amount (debit positive).
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        self.debit - self.credit
    }

    /// Signed base amount (debit positive).
    #[must_use]
    pub fn signed_base_amount(&self) -> Decimal {
        self.base_debit - self.base_credit
    }
}

/// Denormalized totals in document and base currency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalTotals {
    /// Sum of line debits, document currency.
    pub debit: Decimal,
    /// Sum of line credits, document currency.
    pub credit: Decimal,
    /// Sum of line debits, base currency.
    pub base_debit: Decimal,
    /// Sum of line credits, base currency.
    pub base_credit: Decimal,
}

impl JournalTotals {
    /// Sums the given lines, or `None` if a sum overflows.
    #[must_use]
    pub fn checked_of(lines: &[JournalLine]) -> Option<Self> {
        lines.iter().try_fold(Self::default(), |acc, line| {
            Some(Self {
                debit: acc.debit.checked_add(line.debit)?,
                credit: acc.credit.checked_add(line.credit)?,
                base_debit: acc.base_debit.checked_add(line.base_debit)?,
                base_credit: acc.base_credit.checked_add(line.base_credit)?,
            })
        })
    }

    /// Sums lines that already passed validation, whose amounts are bounded.
    #[must_use]
    pub fn of(lines: &[JournalLine]) -> Self {
        lines.iter().fold(Self::default(), |acc, line| Self {
            debit: acc.debit + line.debit,
            credit: acc.credit + line.credit,
            base_debit: acc.base_debit + line.base_debit,
            base_credit: acc.base_credit + line.base_credit,
        })
    }

    /// Totals with debit and credit swapped.
    #[must_use]
    pub const fn swapped(&self) -> Self {
        Self {
            debit: self.credit,
            credit: self.debit,
            base_debit: self.base_credit,
            base_credit: self.base_debit,
        }
    }
}

/// A journal entry as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Entry id.
    pub id: JournalEntryId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Optional sub-scope.
    pub sub_scope_id: Option<SubScopeId>,
    /// Fiscal period.
    pub fiscal_period_id: FiscalPeriodId,
    /// Accounting date.
    pub entry_date: NaiveDate,
    /// Entry classification.
    pub kind: EntryKind,
    /// Producing module.
    pub source_module: String,
    /// Source document reference.
    pub source_document: Option<String>,
    /// Header description.
    pub description: String,
    /// Free-text notes.
    pub notes: Option<String>,
    /// Document currency.
    pub currency: CurrencyCode,
    /// Tenant base currency at the time of validation.
    pub base_currency: CurrencyCode,
    /// Document-to-base exchange rate.
    pub exchange_rate: Decimal,
    /// Denormalized totals.
    pub totals: JournalTotals,
    /// Lifecycle status.
    pub status: JournalStatus,
    /// Reason given for the last reject/void/reverse.
    pub status_reason: Option<String>,
    /// Set on a reversal entry: the entry it offsets.
    pub reverses_entry_id: Option<JournalEntryId>,
    /// Set on a reversed entry: its reversal.
    pub reversed_by_entry_id: Option<JournalEntryId>,
    /// Current (or last) approval request.
    pub approval_request_id: Option<ApprovalRequestId>,
    /// Lines in display order.
    pub lines: Vec<JournalLine>,
    /// Optimistic concurrency version, bumped on every write.
    pub version: i64,
    /// Creator.
    pub created_by: Actor,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last writer.
    pub updated_by: Actor,
    /// Last write time.
    pub updated_at: DateTime<Utc>,
    /// Poster.
    pub posted_by: Option<Actor>,
    /// Posting time.
    pub posted_at: Option<DateTime<Utc>>,
}

impl JournalEntry {
    /// Builds a new DRAFT entry from a validated draft.
    #[must_use]
    pub fn new_draft(
        draft: JournalEntryDraft,
        lines: Vec<JournalLine>,
        base_currency: CurrencyCode,
        now: DateTime<Utc>,
    ) -> Self {
        let totals = JournalTotals::of(&lines);
        Self {
            id: JournalEntryId::new(),
            tenant_id: draft.tenant_id,
            sub_scope_id: draft.sub_scope_id,
            fiscal_period_id: draft.fiscal_period_id,
            entry_date: draft.entry_date,
            kind: draft.kind,
            source_module: draft.source_module,
            source_document: draft.source_document,
            description: draft.description,
            notes: draft.notes,
            currency: draft.currency,
            base_currency,
            exchange_rate: draft.exchange_rate,
            totals,
            status: JournalStatus::Draft,
            status_reason: None,
            reverses_entry_id: None,
            reversed_by_entry_id: None,
            approval_request_id: None,
            lines,
            version: 1,
            created_by: draft.created_by,
            created_at: now,
            updated_by: draft.created_by,
            updated_at: now,
            posted_by: None,
            posted_at: None,
        }
    }

    /// Replaces header and lines with a re-validated draft.
    pub fn replace_contents(
        &mut self,
        draft: JournalEntryDraft,
        lines: Vec<JournalLine>,
        actor: Actor,
        now: DateTime<Utc>,
    ) {
        self.totals = JournalTotals::of(&lines);
        self.sub_scope_id = draft.sub_scope_id;
        self.fiscal_period_id = draft.fiscal_period_id;
        self.entry_date = draft.entry_date;
        self.kind = draft.kind;
        self.source_module = draft.source_module;
        self.source_document = draft.source_document;
        self.description = draft.description;
        self.notes = draft.notes;
        self.currency = draft.currency;
        self.exchange_rate = draft.exchange_rate;
        self.lines = lines;
        self.touch(actor, now);
    }

    /// Records a write by `actor`.
    pub fn touch(&mut self, actor: Actor, now: DateTime<Utc>) {
        self.updated_by = actor;
        self.updated_at = now;
    }

    /// The stored contents as a draft, for re-validation on submit.
    ///
    /// Base amounts are carried over as given so a resubmission checks
    /// exactly what is stored.
    #[must_use]
    pub fn to_draft(&self) -> JournalEntryDraft {
        JournalEntryDraft {
            tenant_id: self.tenant_id,
            sub_scope_id: self.sub_scope_id,
            fiscal_period_id: self.fiscal_period_id,
            entry_date: self.entry_date,
            kind: self.kind,
            source_module: self.source_module.clone(),
            source_document: self.source_document.clone(),
            description: self.description.clone(),
            notes: self.notes.clone(),
            currency: self.currency,
            exchange_rate: self.exchange_rate,
            lines: self
                .lines
                .iter()
                .map(|line| JournalLineInput {
                    account: AccountRef::Id(line.account_id),
                    description: line.description.clone(),
                    debit: line.debit,
                    credit: line.credit,
                    base_debit: Some(line.base_debit),
                    base_credit: Some(line.base_credit),
                    exchange_rate: line.exchange_rate,
                    subledger: line.subledger.clone(),
                    dimensions: line.dimensions.clone(),
                    tax: line.tax.clone(),
                    intercompany: line.intercompany,
                    counterparty_scope_id: line.counterparty_scope_id,
                })
                .collect(),
            created_by: self.created_by,
        }
    }

    /// Compact before/after view recorded on the audit trail.
    #[must_use]
    pub fn snapshot(&self) -> JournalSnapshot {
        JournalSnapshot {
            status: self.status,
            version: self.version,
            totals: self.totals,
            line_count: self.lines.len(),
            approval_request_id: self.approval_request_id,
            reverses_entry_id: self.reverses_entry_id,
            reversed_by_entry_id: self.reversed_by_entry_id,
            status_reason: self.status_reason.clone(),
        }
    }
}

/// Audit view of a journal entry's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalSnapshot {
    /// Status.
    pub status: JournalStatus,
    /// Version.
    pub version: i64,
    /// Totals.
    pub totals: JournalTotals,
    /// Number of lines.
    pub line_count: usize,
    /// Approval request.
    pub approval_request_id: Option<ApprovalRequestId>,
    /// Offset entry, on reversals.
    pub reverses_entry_id: Option<JournalEntryId>,
    /// Reversal, on reversed entries.
    pub reversed_by_entry_id: Option<JournalEntryId>,
    /// Reason for the last reject/void/reverse.
    pub status_reason: Option<String>,
}
