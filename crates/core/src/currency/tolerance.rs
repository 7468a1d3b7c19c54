//! The single policy deciding when two amounts are "balanced enough".
//!
//! Journal validation and FX revaluation both take a `BalanceTolerance`
//! rather than embedding their own constant.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Absolute rounding tolerance for debit/credit comparisons.
///
/// Two totals balance when `|a - b| < tolerance` (strict).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BalanceTolerance(Decimal);

impl BalanceTolerance {
    /// One cent.
    pub const DEFAULT: Self = Self(Decimal::from_parts(1, 0, 0, false, 2));

    /// Creates a tolerance; negative values are taken as their magnitude.
    #[must_use]
    pub fn new(value: Decimal) -> Self {
        Self(value.abs())
    }

    /// Returns the tolerance amount.
    #[must_use]
    pub const fn value(&self) -> Decimal {
        self.0
    }

    /// Returns true if the two totals are within tolerance.
    #[must_use]
    pub fn is_balanced(&self, left: Decimal, right: Decimal) -> bool {
        self.within(left - right)
    }

    /// Returns true if the difference is strictly smaller than the tolerance.
    #[must_use]
    pub fn within(&self, difference: Decimal) -> bool {
        difference.abs() < self.0
    }
}

impl Default for BalanceTolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_is_one_cent() {
        assert_eq!(BalanceTolerance::default().value(), dec!(0.01));
    }

    #[test]
    fn test_comparison_is_strict() {
        let tolerance = BalanceTolerance::DEFAULT;
        assert!(tolerance.is_balanced(dec!(1000.00), dec!(1000.00)));
        assert!(tolerance.is_balanced(dec!(1000.00), dec!(1000.0099)));
        assert!(!tolerance.is_balanced(dec!(1000.00), dec!(1000.01)));
        assert!(!tolerance.is_balanced(dec!(700), dec!(650)));
    }

    #[test]
    fn test_negative_tolerance_uses_magnitude() {
        assert_eq!(BalanceTolerance::new(dec!(-0.5)).value(), dec!(0.5));
    }
}
