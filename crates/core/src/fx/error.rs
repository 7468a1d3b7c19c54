//! FX revaluation errors.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use ledgerline_shared::types::{CurrencyCode, OpenItemId};

use super::types::BatchKey;

/// Errors raised by revaluation and settlement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FxError {
    /// No period is open for posting on the revaluation date.
    #[error("No fiscal period is open for posting on {date}")]
    ClosedPeriod {
        /// Revaluation date.
        date: NaiveDate,
    },

    /// No published rate for a currency in scope.
    #[error("No {currency} exchange rate available for {date}")]
    MissingRate {
        /// Currency without a rate.
        currency: CurrencyCode,
        /// Revaluation date.
        date: NaiveDate,
    },

    /// A non-positive rate was supplied.
    #[error("Invalid exchange rate {rate}")]
    InvalidRate {
        /// The rate.
        rate: Decimal,
    },

    /// The (scope, date, method) run has already been posted.
    #[error("FX batch {key} has already been posted")]
    BatchAlreadyPosted {
        /// The batch key.
        key: BatchKey,
    },

    /// The open item was already settled.
    #[error("Open item {item} is already settled")]
    ItemSettled {
        /// The item.
        item: OpenItemId,
    },
}

impl FxError {
    /// Returns the reason code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::ClosedPeriod { .. } => "CLOSED_PERIOD",
            Self::MissingRate { .. } => "MISSING_RATE",
            Self::InvalidRate { .. } => "INVALID_EXCHANGE_RATE",
            Self::BatchAlreadyPosted { .. } => "BATCH_ALREADY_POSTED",
            Self::ItemSettled { .. } => "OPEN_ITEM_SETTLED",
        }
    }
}
