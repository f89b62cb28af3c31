//! # Money Module
//!
//! Provides the `Money` type for document amounts, line totals and account
//! balances.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Saving an invoice twice with float totals:                             │
//! │    subTotal = 0.1 + 0.2 = 0.30000000000000004                           │
//! │    re-save → VAT recomputed from a drifted subtotal                    │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    10 + 20 = 30 cents, every time, on every save                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use orbit_core::money::Money;
//!
//! let unit_price = Money::from_cents(1000); // 10.00
//! let line_total = unit_price.multiply_quantity(2).unwrap();
//! assert_eq!(line_total.cents(), 2000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use ts_rs::TS;

use crate::types::TaxRate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// Currency is carried by the owning document, not by the amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ```rust
    /// use orbit_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole-unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the cents portion (always 0-99).
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
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Applies a rate in basis points, rounding half away from zero.
    ///
    /// ## Implementation
    /// Integer math in i128: `(amount * bps ± 5000) / 10000`.
    ///
    /// ```rust
    /// use orbit_core::money::Money;
    ///
    /// // 25.00 at 10% = 2.50
    /// assert_eq!(Money::from_cents(2500).apply_bps(1000).cents(), 250);
    /// // 10.00 at 8.25% = 0.825 → 0.83
    /// assert_eq!(Money::from_cents(1000).apply_bps(825).cents(), 83);
    /// ```
    pub fn apply_bps(&self, bps: u32) -> Money {
        let product = self.0 as i128 * bps as i128;
        let rounded = if product >= 0 {
            (product + 5000) / 10000
        } else {
            (product - 5000) / 10000
        };
        Money(rounded as i64)
    }

    /// Calculates tax on this amount.
    ///
    /// ```text
    /// Subtotal: 25.00
    ///      │
    ///      ▼
    /// calculate_tax(10%) ← THIS FUNCTION
    ///      │
    ///      ▼
    /// VAT: 2.50
    /// ```
    #[inline]
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        self.apply_bps(rate.bps())
    }

    /// Multiplies by a quantity, returning `None` on overflow.
    ///
    /// ```rust
    /// use orbit_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(299);
    /// assert_eq!(unit_price.multiply_quantity(3), Some(Money::from_cents(897)));
    /// assert_eq!(Money::from_cents(i64::MAX).multiply_quantity(2), None);
    /// ```
    #[inline]
    pub fn multiply_quantity(&self, qty: i64) -> Option<Money> {
        self.0.checked_mul(qty).map(Money)
    }

    /// Returns the smaller of two amounts.
    #[inline]
    pub fn min(self, other: Money) -> Money {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain decimal rendering without a currency symbol; the document's
/// currency code is printed separately.
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
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.major(), 10);
        assert_eq!(money.minor(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(2450).to_string(), "24.50");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_tax_rounding() {
        let rate = TaxRate::from_bps(825);
        assert_eq!(Money::from_cents(1000).calculate_tax(rate).cents(), 83);
        // Negative amounts round away from zero too
        assert_eq!(Money::from_cents(-1000).apply_bps(825).cents(), -83);
    }

    #[test]
    fn test_sum_and_min() {
        let total: Money = [100, 250, 5].iter().map(|c| Money::from_cents(*c)).sum();
        assert_eq!(total.cents(), 355);
        assert_eq!(Money::from_cents(3).min(Money::from_cents(2)).cents(), 2);
    }

    #[test]
    fn test_multiply_overflow() {
        assert!(Money::from_cents(i64::MAX / 2 + 1).multiply_quantity(2).is_none());
        assert_eq!(
            Money::from_cents(1000).multiply_quantity(0),
            Some(Money::zero())
        );
    }
}
