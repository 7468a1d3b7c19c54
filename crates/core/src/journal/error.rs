//! Journal validation errors.
//!
//! Every variant carries a machine-readable reason code and, where a single
//! line is at fault, its 1-based line number so a UI can highlight it.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use ledgerline_shared::types::{CurrencyCode, FiscalPeriodId};

use crate::currency::CurrencyService;

fn amount(value: &Decimal, currency: &CurrencyCode) -> String {
    CurrencyService::display(*value, *currency)
}

/// Reasons a journal entry candidate is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JournalValidationError {
    // ========== Structural ==========
    /// Fewer lines than the double-entry minimum.
    #[error("Journal entry must have at least {min} lines, got {count}")]
    TooFewLines {
        /// Lines supplied.
        count: usize,
        /// Minimum allowed.
        min: usize,
    },

    /// More lines than the configured maximum.
    #[error("Journal entry may have at most {max} lines, got {count}")]
    TooManyLines {
        /// Lines supplied.
        count: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// Both debit and credit are non-zero.
    #[error("Line {line} has both a debit and a credit amount")]
    BothSidesNonZero {
        /// Offending line.
        line: u32,
    },

    /// Neither debit nor credit is set.
    #[error("Line {line} has neither a debit nor a credit amount")]
    NoAmount {
        /// Offending line.
        line: u32,
    },

    /// A negative amount was supplied.
    #[error("Line {line} has a negative amount")]
    NegativeAmount {
        /// Offending line.
        line: u32,
    },

    /// More than four dimension tags.
    #[error("Line {line} has {count} dimension tags, at most {max} are allowed")]
    TooManyDimensions {
        /// Offending line.
        line: u32,
        /// Tags supplied.
        count: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// Header or line exchange rate is not a positive number
    /// (or is not 1 for a base-currency document).
    #[error("Invalid exchange rate {rate}")]
    InvalidExchangeRate {
        /// Offending line; `None` for the header rate.
        line: Option<u32>,
        /// The rate supplied.
        rate: Decimal,
    },

    // ========== Referential ==========
    /// Account could not be resolved.
    #[error("Line {line}: unknown account {account}")]
    UnknownAccount {
        /// Offending line.
        line: u32,
        /// The reference as supplied.
        account: String,
    },

    /// Account exists but cannot take postings.
    #[error("Line {line}: account {account} is inactive or does not allow direct posting")]
    InactiveAccount {
        /// Offending line.
        line: u32,
        /// Account code.
        account: String,
    },

    /// Period is not open for posting on the entry date.
    #[error("Fiscal period {period} is closed for posting on {date}")]
    ClosedPeriod {
        /// The period.
        period: FiscalPeriodId,
        /// The entry date.
        date: NaiveDate,
    },

    // ========== Arithmetic ==========
    /// An amount has more than four decimal places or is at least 10^15,
    /// or a computed base amount or total left that range.
    #[error("Amount out of range")]
    AmountOutOfRange {
        /// Offending line; `None` when a total overflowed.
        line: Option<u32>,
    },

    /// Document-currency totals differ.
    #[error(
        "Total debits ({}) must equal total credits ({})",
        amount(.debit, .currency),
        amount(.credit, .currency)
    )]
    Unbalanced {
        /// Total debit.
        debit: Decimal,
        /// Total credit.
        credit: Decimal,
        /// Document currency.
        currency: CurrencyCode,
    },

    /// Base-currency totals differ after conversion.
    #[error(
        "Base currency total debits ({}) must equal total credits ({})",
        amount(.debit, .currency),
        amount(.credit, .currency)
    )]
    UnbalancedBase {
        /// Total base debit.
        debit: Decimal,
        /// Total base credit.
        credit: Decimal,
        /// Base currency.
        currency: CurrencyCode,
    },

    // ========== Semantic ==========
    /// Intercompany line without a counter-party.
    #[error("Line {line} is intercompany but has no counter-party sub-scope")]
    MissingCounterparty {
        /// Offending line.
        line: u32,
    },

    /// Subledger reference does not exist.
    #[error("Line {line}: subledger reference {reference} not found")]
    UnknownSubledgerReference {
        /// Offending line.
        line: u32,
        /// The reference as supplied.
        reference: String,
    },
}

impl JournalValidationError {
    /// Returns the reason code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::TooFewLines { .. } => "TOO_FEW_LINES",
            Self::TooManyLines { .. } => "TOO_MANY_LINES",
            Self::BothSidesNonZero { .. } => "BOTH_SIDES_NONZERO",
            Self::NoAmount { .. } => "NO_AMOUNT",
            Self::NegativeAmount { .. } => "NEGATIVE_AMOUNT",
            Self::TooManyDimensions { .. } => "TOO_MANY_DIMENSIONS",
            Self::InvalidExchangeRate { .. } => "INVALID_EXCHANGE_RATE",
            Self::UnknownAccount { .. } => "UNKNOWN_ACCOUNT",
            Self::InactiveAccount { .. } => "INACTIVE_ACCOUNT",
            Self::ClosedPeriod { .. } => "CLOSED_PERIOD",
            Self::AmountOutOfRange { .. } => "AMOUNT_OUT_OF_RANGE",
            Self::Unbalanced { .. } => "UNBALANCED",
            Self::UnbalancedBase { .. } => "UNBALANCED_BASE",
            Self::MissingCounterparty { .. } => "MISSING_COUNTERPARTY",
            Self::UnknownSubledgerReference { .. } => "UNKNOWN_SUBLEDGER_REFERENCE",
        }
    }

    /// Returns the offending line number, if the error concerns one line.
    #[must_use]
    pub const fn line(&self) -> Option<u32> {
        match self {
            Self::BothSidesNonZero { line }
            | Self::NoAmount { line }
            | Self::NegativeAmount { line }
            | Self::TooManyDimensions { line, .. }
            | Self::UnknownAccount { line, .. }
            | Self::InactiveAccount { line, .. }
            | Self::MissingCounterparty { line }
            | Self::UnknownSubledgerReference { line, .. } => Some(*line),
            Self::InvalidExchangeRate { line, .. } | Self::AmountOutOfRange { line } => *line,
            Self::TooFewLines { .. }
            | Self::TooManyLines { .. }
            | Self::ClosedPeriod { .. }
            | Self::Unbalanced { .. }
            | Self::UnbalancedBase { .. } => None,
        }
    }
}
