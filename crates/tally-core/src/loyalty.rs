//! # Loyalty Points
//!
//! One point per 100 currency units of grand total, truncating. Spending
//! is clamped to the customer's balance so the balance never goes
//! negative.
//!
//! ```text
//! grand total 250.50 ──► awarded 2
//! requested 10.7     ──► requested 10 ──► balance 4 ──► spent 4
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::money::Money;
use crate::CURRENCY_UNITS_PER_POINT;

/// Points earned for a sale.
///
/// Uses the persisted (rounded) grand total, so a sale recorded as
/// `100.00` always earns exactly one point.
///
/// ## Example
/// ```rust
/// use rust_decimal::Decimal;
/// use tally_core::loyalty::points_awarded;
/// use tally_core::money::Money;
///
/// assert_eq!(points_awarded(Money::from_decimal(Decimal::from(100))), 1);
/// assert_eq!(points_awarded(Money::from_decimal(Decimal::from(99))), 0);
/// ```
pub fn points_awarded(grand_total: Money) -> i64 {
    let grand = grand_total.round_currency().amount();
    if grand <= Decimal::ZERO {
        return 0;
    }
    (grand / Decimal::from(CURRENCY_UNITS_PER_POINT))
        .floor()
        .to_i64()
        .unwrap_or(0)
}

/// Points the caller asked to spend: `max(0, floor(requested))`.
pub fn points_requested(requested: Option<Decimal>) -> i64 {
    match requested {
        Some(r) if r > Decimal::ZERO => r.floor().to_i64().unwrap_or(0),
        _ => 0,
    }
}

/// Applied spend: never more than the balance, never negative.
#[inline]
pub fn clamp_spend(requested: i64, balance: i64) -> i64 {
    requested.min(balance.max(0)).max(0)
}

/// Loyalty result of one sale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoyaltyOutcome {
    pub awarded: i64,
    pub requested: i64,
    pub spent: i64,
}

/// Settles loyalty for a sale.
///
/// `balance` is the customer's locked balance, or `None` when the sale has
/// no customer (or the store's database has no loyalty column). Points are
/// awarded on every sale; without a balance nothing can be spent.
pub fn settle(
    grand_total: Money,
    requested: Option<Decimal>,
    balance: Option<i64>,
) -> LoyaltyOutcome {
    let requested = points_requested(requested);
    LoyaltyOutcome {
        awarded: points_awarded(grand_total),
        requested,
        spent: balance.map_or(0, |balance| clamp_spend(requested, balance)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn money(s: &str) -> Money {
        Money::from_decimal(s.parse().unwrap())
    }

    #[test]
    fn test_award_thresholds() {
        assert_eq!(points_awarded(money("100")), 1);
        assert_eq!(points_awarded(money("99")), 0);
        assert_eq!(points_awarded(money("99.99")), 0);
        assert_eq!(points_awarded(money("199.99")), 1);
        assert_eq!(points_awarded(money("250.50")), 2);
        assert_eq!(points_awarded(money("0")), 0);
    }

    #[test]
    fn test_award_uses_persisted_total() {
        // 99.995 is persisted as 100.00
        assert_eq!(points_awarded(money("99.995")), 1);
        assert_eq!(points_awarded(money("99.994")), 0);
    }

    #[test]
    fn test_requested_floors_and_clamps_at_zero() {
        assert_eq!(points_requested(None), 0);
        assert_eq!(points_requested(Some("10.7".parse().unwrap())), 10);
        assert_eq!(points_requested(Some("-3".parse().unwrap())), 0);
        assert_eq!(points_requested(Some("0.9".parse().unwrap())), 0);
    }

    #[test]
    fn test_spend_clamped_to_balance() {
        assert_eq!(clamp_spend(10, 4), 4);
        assert_eq!(clamp_spend(3, 4), 3);
        assert_eq!(clamp_spend(3, -2), 0);
    }

    #[test]
    fn test_settle_still_awards_when_overspending() {
        let out = settle(money("300"), Some("50".parse().unwrap()), Some(20));
        assert_eq!(out, LoyaltyOutcome { awarded: 3, requested: 50, spent: 20 });
    }

    #[test]
    fn test_settle_without_customer_awards_but_spends_nothing() {
        let out = settle(money("300"), Some("5".parse().unwrap()), None);
        assert_eq!(out, LoyaltyOutcome { awarded: 3, requested: 5, spent: 0 });

        let out = settle(money("100"), None, None);
        assert_eq!(out.awarded, 1);
    }
}
