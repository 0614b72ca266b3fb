//! # Money Module
//!
//! Provides the `Money` type for monetary values.
//!
//! ## Why Decimal Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  QUANTITIES ARE RATIONAL                                                │
//! │                                                                         │
//! │  0.25 kg × 180.00/kg = 45.00                                           │
//! │  1.5 L × 64.99/L    = 97.485  → persisted as 97.49                     │
//! │                                                                         │
//! │  Integer cents cannot carry the unrounded intermediate, so money is    │
//! │  an exact decimal. Arithmetic stays unrounded; rounding to 2 places    │
//! │  (midpoint away from zero) happens once, when a value is persisted.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use rust_decimal::Decimal;
//! use tally_core::money::Money;
//!
//! let price = Money::from_decimal(Decimal::new(6499, 2)); // 64.99
//! let line = price.multiply_quantity(Decimal::new(15, 1)); // × 1.5
//! assert_eq!(line.amount(), Decimal::new(97485, 3));
//! assert_eq!(line.round_currency().amount(), Decimal::new(9749, 2));
//! ```

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

use crate::types::TaxRate;
use crate::CURRENCY_SCALE;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in major currency units, held as an exact decimal.
///
/// ## Design Decisions
/// - **Decimal**: quantities can be fractional, so line totals can be too
/// - **Single field tuple struct**: zero-cost wrapper, serializes as the
///   bare number
/// - **No implicit rounding**: only [`Money::round_currency`] rounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Creates a Money value from a decimal amount.
    #[inline]
    pub const fn from_decimal(amount: Decimal) -> Self {
        Money(amount)
    }

    /// Returns the unrounded amount.
    #[inline]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    /// Checks if the value is zero.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Returns the absolute value.
    #[inline]
    pub fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Rounds to the persisted currency scale (2 places, half away from zero).
    ///
    /// ## Example
    /// ```rust
    /// use rust_decimal::Decimal;
    /// use tally_core::money::Money;
    ///
    /// let m = Money::from_decimal(Decimal::new(10125, 3)); // 10.125
    /// assert_eq!(m.round_currency().amount(), Decimal::new(1013, 2));
    ///
    /// let neg = Money::from_decimal(Decimal::new(-10125, 3));
    /// assert_eq!(neg.round_currency().amount(), Decimal::new(-1013, 2));
    /// ```
    pub fn round_currency(&self) -> Money {
        Money(
            self.0
                .round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Calculates tax at a percentage rate, unrounded.
    ///
    /// ## Example
    /// ```rust
    /// use rust_decimal::Decimal;
    /// use tally_core::money::Money;
    /// use tally_core::types::TaxRate;
    ///
    /// let price = Money::from_decimal(Decimal::new(1000, 2)); // 10.00
    /// let tax = price.calculate_tax(TaxRate::from_percent(Decimal::new(825, 2)));
    /// assert_eq!(tax.amount(), Decimal::new(825, 3)); // 0.825
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        Money(self.0 * rate.percent() / Decimal::ONE_HUNDRED)
    }

    /// Multiplies money by a (possibly fractional) quantity.
    #[inline]
    pub fn multiply_quantity(&self, qty: Decimal) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display shows the amount at currency scale. For logs, not for receipts.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rounded = self.round_currency().0;
        rounded.rescale(CURRENCY_SCALE);
        write!(f, "{}", rounded)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Money(amount)
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

/// Multiplication by a decimal quantity.
impl Mul<Decimal> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: Decimal) -> Self {
        Money(self.0 * qty)
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
