//! # Money Module
//!
//! Integer-cent money for every price, total, discount and debt balance.
//!
//! ## Where Money Flows
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Money in Mercato                                │
//! │                                                                         │
//! │  Product.selling_price_cents ──┐                                        │
//! │                                ▼                                        │
//! │  Pricing engine ──► per-line discount (percent_of / multiply_quantity) │
//! │                                │                                        │
//! │                                ▼                                        │
//! │  Sale engine ──► subtotal ──► calculate_tax ──► total                  │
//! │                                                  │                      │
//! │                                                  ▼                      │
//! │  Customer debt ledger ◄── credit sale posts `total` as debt            │
//! │                                                                         │
//! │  Every step is i64 cents. Rates are basis points (1 bps = 0.01%).      │
//! │  Nothing is ever converted to floating point. Arithmetic saturates     │
//! │  at the i64 bounds instead of panicking on overflow.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use mercato_core::money::Money;
//!
//! let price = Money::from_cents(2_500); // $25.00
//! let line = price.multiply_quantity(3);
//! assert_eq!(line.cents(), 7_500);
//!
//! // 20% of $25.00
//! assert_eq!(price.percent_of(2_000).cents(), 500);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::types::TaxRate;

/// Basis points in 100%.
pub const BPS_SCALE: i64 = 10_000;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// Signed so that debt payments and reversals can be represented as
/// negative balance changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use mercato_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from whole units and cents.
    ///
    /// For negative amounts only the major unit carries the sign:
    /// `from_major_minor(-5, 50)` is -$5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Whole currency units, truncated toward zero.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// The cents portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.saturating_abs())
    }

    /// Multiplies a unit price by a quantity, saturating on overflow.
    ///
    /// ## Example
    /// ```rust
    /// use mercato_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(299);
    /// assert_eq!(unit_price.multiply_quantity(3).cents(), 897);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }

    /// Returns `bps` basis points of this amount, rounded half-up.
    ///
    /// Used for percentage promotions: `percent_of(2_000)` is 20%.
    ///
    /// ## Example
    /// ```rust
    /// use mercato_core::money::Money;
    ///
    /// let price = Money::from_cents(999);
    /// // 12.5% of $9.99 = 124.875 cents → 125
    /// assert_eq!(price.percent_of(1_250).cents(), 125);
    /// ```
    pub fn percent_of(&self, bps: u32) -> Money {
        // i128 so large totals times 10_000 cannot overflow
        let raw = (self.0 as i128 * bps as i128 + (BPS_SCALE as i128 / 2)) / BPS_SCALE as i128;
        Money(raw.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
    }

    /// Calculates tax on this amount.
    ///
    /// `(amount * bps + 5000) / 10000`, so half a cent rounds up.
    ///
    /// ## Example
    /// ```rust
    /// use mercato_core::money::Money;
    /// use mercato_core::types::TaxRate;
    ///
    /// let subtotal = Money::from_cents(1000);
    /// let tax = subtotal.calculate_tax(TaxRate::from_bps(825));
    /// assert_eq!(tax.cents(), 83);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        self.percent_of(rate.bps())
    }

    /// Splits this amount evenly across `parts`, rounding down.
    ///
    /// Returns zero when `parts` is zero.
    #[inline]
    pub const fn split_even(&self, parts: usize) -> Money {
        if parts == 0 {
            return Money(0);
        }
        Money(self.0 / parts as i64)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-friendly display. Localized formatting belongs to the UI.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_sub(other.0);
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(self.0.saturating_neg())
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        self.multiply_quantity(qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_major_minor() {
        assert_eq!(Money::from_major_minor(10, 99).cents(), 1099);
        assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    }

    #[test]
    fn test_arithmetic_saturates() {
        let huge = Money::from_cents(i64::MAX - 10);

        assert_eq!(huge.multiply_quantity(3).cents(), i64::MAX);
        assert_eq!((huge * -3).cents(), i64::MIN);
        assert_eq!((huge + Money::from_cents(100)).cents(), i64::MAX);
        assert_eq!((-huge - Money::from_cents(100)).cents(), i64::MIN);
        assert_eq!(Money::from_cents(i64::MIN).abs().cents(), i64::MAX);

        let mut total = huge;
        total += Money::from_cents(50);
        assert_eq!(total.cents(), i64::MAX);

        let total: Money = [huge, huge, huge].iter().sum();
        assert_eq!(total.cents(), i64::MAX);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1099).to_string(), "10.99");
        assert_eq!(Money::from_cents(500).to_string(), "5.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(250);

        assert_eq!((a + b).cents(), 1250);
        assert_eq!((a - b).cents(), 750);
        assert_eq!((-b).cents(), -250);
        assert_eq!((b * 4).cents(), 1000);

        let mut c = a;
        c += b;
        c -= Money::from_cents(50);
        assert_eq!(c.cents(), 1200);
    }

    #[test]
    fn test_percent_of_rounds_half_up() {
        // 30% of $100.00
        assert_eq!(Money::from_cents(10_000).percent_of(3_000).cents(), 3_000);
        // 15% of $0.10 = 1.5 cents → 2
        assert_eq!(Money::from_cents(10).percent_of(1_500).cents(), 2);
        assert_eq!(Money::from_cents(10_000).percent_of(0).cents(), 0);
    }

    #[test]
    fn test_calculate_tax() {
        let tax = Money::from_cents(1000).calculate_tax(TaxRate::from_bps(825));
        assert_eq!(tax.cents(), 83);

        let none = Money::from_cents(1000).calculate_tax(TaxRate::zero());
        assert!(none.is_zero());
    }

    #[test]
    fn test_split_even() {
        assert_eq!(Money::from_cents(1000).split_even(3).cents(), 333);
        assert_eq!(Money::from_cents(1000).split_even(0).cents(), 0);
    }

    #[test]
    fn test_sum() {
        let lines = [Money::from_cents(100), Money::from_cents(250)];
        let total: Money = lines.iter().sum();
        assert_eq!(total.cents(), 350);
    }

    #[test]
    fn test_large_values_do_not_overflow() {
        let big = Money::from_cents(i64::MAX / 2);
        let portion = big.percent_of(5_000);
        assert!(portion.is_positive());
    }
}
