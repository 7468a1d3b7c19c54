//! Currency conversion with Banker's Rounding.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use ledgerline_shared::types::CurrencyCode;

/// Number of decimal places kept on computed base-currency equivalents.
pub const BASE_AMOUNT_SCALE: u32 = 4;

/// Currency service for conversion operations.
///
/// Every conversion rounds with `RoundingStrategy::MidpointNearestEven`
/// so that repeated conversions do not drift in one direction.
pub struct CurrencyService;

impl CurrencyService {
    /// Convert amount using exchange rate, keeping four decimal places.
    ///
    /// Base-currency equivalents on journal lines are stored at this scale;
    /// rounding each leg to whole cents would let multi-line entries drift
    /// out of balance.
    ///
    /// # Example
    ///
    /// ```
    /// use rust_decimal_macros::dec;
    /// use ledgerline_core::currency::CurrencyService;
    ///
    /// let result = CurrencyService::convert(dec!(1000), dec!(1.05));
    /// assert_eq!(result, dec!(1050.0000));
    /// ```
    #[must_use]
    pub fn convert(amount: Decimal, rate: Decimal) -> Decimal {
        (amount * rate).round_dp_with_strategy(BASE_AMOUNT_SCALE, RoundingStrategy::MidpointNearestEven)
    }

    /// [`CurrencyService::convert`] that returns `None` instead of
    /// overflowing.
    #[must_use]
    pub fn checked_convert(amount: Decimal, rate: Decimal) -> Option<Decimal> {
        amount
            .checked_mul(rate)
            .map(|v| v.round_dp_with_strategy(BASE_AMOUNT_SCALE, RoundingStrategy::MidpointNearestEven))
    }

    /// Convert amount and round to the target currency's minor unit.
    #[must_use]
    pub fn convert_to(amount: Decimal, rate: Decimal, target: CurrencyCode) -> Decimal {
        Self::round(amount * rate, target.minor_units())
    }

    /// Round a decimal value using Banker's Rounding.
    #[must_use]
    pub fn round(value: Decimal, decimal_places: u32) -> Decimal {
        value.round_dp_with_strategy(decimal_places, RoundingStrategy::MidpointNearestEven)
    }

    /// Formats an amount for user-facing messages at the currency's precision.
    #[must_use]
    pub fn display(value: Decimal, currency: CurrencyCode) -> String {
        let places = currency.minor_units();
        let mut rounded = Self::round(value, places);
        rounded.rescale(places);
        rounded.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_checked_convert_reports_overflow() {
        assert_eq!(CurrencyService::checked_convert(dec!(100), dec!(1.5)), Some(dec!(150.0000)));
        assert_eq!(CurrencyService::checked_convert(Decimal::MAX, dec!(2)), None);
    }

    #[test]
    fn test_convert_keeps_four_places() {
        assert_eq!(CurrencyService::convert(dec!(100), dec!(1.23456789)), dec!(123.4568));
        assert_eq!(CurrencyService::convert(dec!(100.50), Decimal::ONE), dec!(100.5000));
    }

    #[test]
    fn test_convert_to_target_precision() {
        assert_eq!(
            CurrencyService::convert_to(dec!(100), dec!(151.237), CurrencyCode::JPY),
            dec!(15124)
        );
        assert_eq!(
            CurrencyService::convert_to(dec!(1000), dec!(1.10125), CurrencyCode::USD),
            dec!(1101.25)
        );
    }

    #[test]
    fn test_bankers_rounding_midpoint_to_even() {
        assert_eq!(CurrencyService::round(dec!(2.5), 0), dec!(2));
        assert_eq!(CurrencyService::round(dec!(3.5), 0), dec!(4));
        assert_eq!(CurrencyService::round(dec!(2.25), 1), dec!(2.2));
        assert_eq!(CurrencyService::round(dec!(2.35), 1), dec!(2.4));
    }

    #[test]
    fn test_display_pads_to_minor_units() {
        assert_eq!(CurrencyService::display(dec!(1000), CurrencyCode::USD), "1000.00");
        assert_eq!(CurrencyService::display(dec!(950.5), CurrencyCode::USD), "950.50");
        assert_eq!(CurrencyService::display(dec!(1200.4), CurrencyCode::JPY), "1200");
    }
}
