//! Property-based tests for currency conversion and the balance tolerance.

use proptest::prelude::*;
use rust_decimal::Decimal;

use super::service::CurrencyService;
use super::tolerance::BalanceTolerance;

/// Strategy to generate positive decimal amounts (0.01 to 1,000,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate positive exchange rates (0.0001 to 10000.0000).
fn positive_rate() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|v| Decimal::new(v, 4))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Converted amounts never carry more than four decimal places.
    #[test]
    fn prop_convert_rounds_to_4_decimals(
        amount in positive_amount(),
        rate in positive_rate(),
    ) {
        let result = CurrencyService::convert(amount, rate);
        prop_assert!(result.scale() <= 4, "{} has scale {}", result, result.scale());
    }

    /// Rounding error of a conversion is at most half of the last kept place.
    #[test]
    fn prop_convert_error_bounded(
        amount in positive_amount(),
        rate in positive_rate(),
    ) {
        let exact = amount * rate;
        let rounded = CurrencyService::convert(amount, rate);
        prop_assert!((exact - rounded).abs() <= Decimal::new(5, 5));
    }

    /// Conversion preserves sign symmetry, so swapping debit and credit
    /// produces mirrored base amounts.
    #[test]
    fn prop_convert_is_odd(
        amount in positive_amount(),
        rate in positive_rate(),
    ) {
        prop_assert_eq!(
            CurrencyService::convert(-amount, rate),
            -CurrencyService::convert(amount, rate)
        );
    }

    /// Balance checks do not depend on argument order.
    #[test]
    fn prop_tolerance_symmetric(
        left in positive_amount(),
        right in positive_amount(),
    ) {
        let tolerance = BalanceTolerance::DEFAULT;
        prop_assert_eq!(
            tolerance.is_balanced(left, right),
            tolerance.is_balanced(right, left)
        );
    }

    /// Equal totals always balance.
    #[test]
    fn prop_tolerance_reflexive(amount in positive_amount()) {
        prop_assert!(BalanceTolerance::DEFAULT.is_balanced(amount, amount));
    }
}
