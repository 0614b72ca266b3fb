//! # Stock Consumption Plans
//!
//! Given the rows a sale line has locked, decide how much to take from
//! each. The database layer locks the rows, calls into this module, and
//! applies the resulting [`StockDraw`]s.
//!
//! ## Greedy Consumption
//! ```text
//! requested: 5
//!
//!   tier      stock   take   remaining
//!   ───────   ─────   ────   ─────────
//!   no MRP      2      2        3
//!   MRP 20      0      0        3
//!   MRP 25      1      1        2
//!   MRP 30      9      2        0   ◄── stop
//!   MRP 40      4      -
//! ```
//! Rows are visited in tier order (no-MRP first, then ascending MRP, ties
//! broken by id), which matches the `FOR UPDATE` lock order.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::types::PriceTier;

/// Where a sale line draws its stock from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockSource {
    /// Variants when the product has any, else the master row.
    Auto,
    /// Exactly this variant.
    Variant(Uuid),
    /// The master row, even if variants exist.
    Master,
}

/// A variant row as seen under its row lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockedStock {
    pub variant_id: Uuid,
    pub tier: PriceTier,
    pub available: Decimal,
}

/// Which row a draw decrements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrawTarget {
    Variant(Uuid),
    Master,
}

/// One decrement to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDraw {
    pub target: DrawTarget,
    pub quantity: Decimal,
}

/// Plans a greedy draw of `requested` across locked variant rows.
///
/// Negative stock counts as zero. Rows that contribute nothing are left
/// out of the plan.
///
/// ## Errors
/// [`CoreError::InsufficientStock`] naming `product` when the rows hold
/// less than `requested` in total.
///
/// ## Example
/// ```rust
/// use rust_decimal::Decimal;
/// use tally_core::stock::{plan_consumption, LockedStock, DrawTarget};
/// use tally_core::types::PriceTier;
/// use uuid::Uuid;
///
/// let a = LockedStock { variant_id: Uuid::new_v4(), tier: PriceTier::NONE, available: Decimal::from(2) };
/// let b = LockedStock { variant_id: Uuid::new_v4(), tier: PriceTier::stated(Decimal::from(30)), available: Decimal::from(9) };
///
/// let plan = plan_consumption("Rice", &[b, a], Decimal::from(5)).unwrap();
/// assert_eq!(plan.len(), 2);
/// assert_eq!(plan[0].target, DrawTarget::Variant(a.variant_id));
/// assert_eq!(plan[1].quantity, Decimal::from(3));
/// ```
pub fn plan_consumption(
    product: &str,
    rows: &[LockedStock],
    requested: Decimal,
) -> CoreResult<Vec<StockDraw>> {
    let mut ordered: Vec<&LockedStock> = rows.iter().collect();
    ordered.sort_by(|a, b| a.tier.cmp(&b.tier).then(a.variant_id.cmp(&b.variant_id)));

    let total: Decimal = ordered.iter().map(|r| r.available.max(Decimal::ZERO)).sum();
    if total < requested {
        return Err(CoreError::InsufficientStock {
            product: product.to_string(),
            available: total,
            requested,
        });
    }

    let mut remaining = requested;
    let mut draws = Vec::new();
    for row in ordered {
        if remaining <= Decimal::ZERO {
            break;
        }
        let take = row.available.max(Decimal::ZERO).min(remaining);
        if take > Decimal::ZERO {
            draws.push(StockDraw {
                target: DrawTarget::Variant(row.variant_id),
                quantity: take,
            });
            remaining -= take;
        }
    }

    Ok(draws)
}

/// Plans a draw from a single row (the master, or one designated variant).
pub fn plan_single(
    product: &str,
    target: DrawTarget,
    available: Decimal,
    requested: Decimal,
) -> CoreResult<Vec<StockDraw>> {
    let available = available.max(Decimal::ZERO);
    if available < requested {
        return Err(CoreError::InsufficientStock {
            product: product.to_string(),
            available,
            requested,
        });
    }
    Ok(vec![StockDraw {
        target,
        quantity: requested,
    }])
}

/// The variant a sale line should reference: set only when every unit
/// came from one variant.
pub fn single_variant(draws: &[StockDraw]) -> Option<Uuid> {
    match draws {
        [StockDraw {
            target: DrawTarget::Variant(id),
            ..
        }] => Some(*id),
        _ => None,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
