//! Multi-currency handling and exchange rates.

pub mod exchange;
pub mod service;
pub mod tolerance;

#[cfg(test)]
mod props;

pub use exchange::{ExchangeRate, RateType};
pub use service::{BASE_AMOUNT_SCALE, CurrencyService};
pub use tolerance::BalanceTolerance;
