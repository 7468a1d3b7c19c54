//! Exchange rate types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ledgerline_shared::types::CurrencyCode;

use super::service::CurrencyService;

/// Which published rate to use for a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateType {
    /// Spot rate on the transaction date.
    Spot,
    /// Period average rate (income statement items).
    Average,
    /// Period closing rate (balance sheet items).
    Closing,
}

impl RateType {
    /// Returns the string representation of the rate type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Spot => "spot",
            Self::Average => "average",
            Self::Closing => "closing",
        }
    }

    /// Parses a rate type from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "spot" => Some(Self::Spot),
            "average" => Some(Self::Average),
            "closing" => Some(Self::Closing),
            _ => None,
        }
    }
}

impl std::fmt::Display for RateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exchange rate between two currencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
    /// Source currency code.
    pub from_currency: CurrencyCode,
    /// Target currency code.
    pub to_currency: CurrencyCode,
    /// Exchange rate (1 from_currency = rate to_currency).
    pub rate: Decimal,
    /// Kind of rate.
    pub rate_type: RateType,
    /// Date this rate is effective.
    pub effective_date: NaiveDate,
}

impl ExchangeRate {
    /// Creates a new exchange rate.
    #[must_use]
    pub const fn new(
        from_currency: CurrencyCode,
        to_currency: CurrencyCode,
        rate: Decimal,
        rate_type: RateType,
        effective_date: NaiveDate,
    ) -> Self {
        Self {
            from_currency,
            to_currency,
            rate,
            rate_type,
            effective_date,
        }
    }

    /// Returns the inverse rate, or `None` for a zero rate.
    #[must_use]
    pub fn inverse(&self) -> Option<Self> {
        let rate = Decimal::ONE.checked_div(self.rate)?;
        Some(Self {
            from_currency: self.to_currency,
            to_currency: self.from_currency,
            rate,
            rate_type: self.rate_type,
            effective_date: self.effective_date,
        })
    }

    /// Converts an amount of `from_currency` into `to_currency`.
    #[must_use]
    pub fn apply(&self, amount: Decimal) -> Decimal {
        CurrencyService::convert(amount, self.rate)
    }
}
