//! # Purchase Edit Reconciliation
//!
//! Editing a purchase must leave stock as if the purchase had been
//! entered with its new contents from the start. Each recorded line is
//! matched against the update and classified:
//!
//! ```text
//! recorded line            update line              plan
//! ─────────────────────    ─────────────────────    ─────────────────────────────
//! rice @ MRP 50 × 10       rice @ MRP 50 × 10       Keep(Unchanged)
//! rice @ MRP 50 × 10       rice @ MRP 50 × 12       Keep(QuantityChanged +2)
//! rice @ MRP 50 × 10       rice @ MRP 55 × 10       Keep(MovedTier -10 / +10)
//! rice @ MRP 50 × 10       (not mentioned)          Remove  (-10)
//! (none)                   oil  @ no MRP × 4        Add     (+4)
//! ```
//!
//! The plan is pure; the purchase composer applies it under row locks.

use std::collections::HashMap;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::PriceTier;

/// The stock bucket a purchase line feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StockKey {
    pub product_id: Uuid,
    pub tier: PriceTier,
}

/// What an edit does to one line's stock contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    Unchanged,
    /// Same bucket; stock moves by `delta` (may be negative).
    QuantityChanged { delta: Decimal },
    /// Different bucket; take `remove` out of `from`, put `add` into `to`.
    MovedTier {
        from: StockKey,
        to: StockKey,
        remove: Decimal,
        add: Decimal,
    },
}

/// Classifies the change from a recorded line to its edited form.
///
/// ## Example
/// ```rust
/// use rust_decimal::Decimal;
/// use tally_core::reconcile::{reconcile, Reconciliation, StockKey};
/// use tally_core::types::PriceTier;
/// use uuid::Uuid;
///
/// let key = StockKey { product_id: Uuid::new_v4(), tier: PriceTier::NONE };
/// let r = reconcile(key, Decimal::from(10), key, Decimal::from(7));
/// assert_eq!(r, Reconciliation::QuantityChanged { delta: Decimal::from(-3) });
/// ```
pub fn reconcile(
    old_key: StockKey,
    old_qty: Decimal,
    new_key: StockKey,
    new_qty: Decimal,
) -> Reconciliation {
    if old_key != new_key {
        return Reconciliation::MovedTier {
            from: old_key,
            to: new_key,
            remove: old_qty,
            add: new_qty,
        };
    }
    if old_qty == new_qty {
        Reconciliation::Unchanged
    } else {
        Reconciliation::QuantityChanged {
            delta: new_qty - old_qty,
        }
    }
}

/// A purchase line as currently stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedLine {
    pub line_id: Uuid,
    pub key: StockKey,
    pub quantity: Decimal,
    /// Variant the line's stock went into; `None` for repacking masters.
    pub variant_id: Option<Uuid>,
}

/// A line of the update, with its product already resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncomingLine {
    /// Position in the update's `items`.
    pub index: usize,
    pub line_id: Option<Uuid>,
    pub key: StockKey,
    pub quantity: Decimal,
}

/// Per-line action for a purchase update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinePlan {
    Keep {
        recorded: RecordedLine,
        incoming: IncomingLine,
        change: Reconciliation,
    },
    Add {
        incoming: IncomingLine,
    },
    Remove {
        recorded: RecordedLine,
    },
}

/// Matches an update against the recorded lines.
///
/// Keeps and adds come first, in update order; removals follow in
/// recorded order.
///
/// ## Errors
/// - [`CoreError::PurchaseLineNotFound`] when a `line_id` is not one of
///   the purchase's lines
/// - [`ValidationError::Duplicate`] when a `line_id` appears twice
pub fn plan_update(
    recorded: &[RecordedLine],
    incoming: &[IncomingLine],
) -> CoreResult<Vec<LinePlan>> {
    let by_id: HashMap<Uuid, &RecordedLine> = recorded.iter().map(|r| (r.line_id, r)).collect();
    let mut claimed: HashMap<Uuid, usize> = HashMap::new();
    let mut plans = Vec::with_capacity(recorded.len().max(incoming.len()));

    for line in incoming {
        match line.line_id {
            Some(id) => {
                let rec = by_id
                    .get(&id)
                    .ok_or_else(|| CoreError::PurchaseLineNotFound(id.to_string()))?;
                if claimed.insert(id, line.index).is_some() {
                    return Err(ValidationError::Duplicate {
                        field: "line_id".to_string(),
                        value: id.to_string(),
                    }
                    .into());
                }
                plans.push(LinePlan::Keep {
                    recorded: **rec,
                    incoming: *line,
                    change: reconcile(rec.key, rec.quantity, line.key, line.quantity),
                });
            }
            None => plans.push(LinePlan::Add { incoming: *line }),
        }
    }

    for rec in recorded {
        if !claimed.contains_key(&rec.line_id) {
            plans.push(LinePlan::Remove { recorded: *rec });
        }
    }

    Ok(plans)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn key(product: Uuid, mrp: Option<&str>) -> StockKey {
        StockKey {
            product_id: product,
            tier: PriceTier::from_mrp(mrp.map(dec)),
        }
    }

    fn recorded(k: StockKey, qty: &str) -> RecordedLine {
        RecordedLine {
            line_id: Uuid::new_v4(),
            key: k,
            quantity: dec(qty),
            variant_id: Some(Uuid::new_v4()),
        }
    }

    fn incoming(index: usize, line_id: Option<Uuid>, k: StockKey, qty: &str) -> IncomingLine {
        IncomingLine {
            index,
            line_id,
            key: k,
            quantity: dec(qty),
        }
    }

    #[test]
    fn test_reconcile_variants() {
        let p = Uuid::new_v4();
        let a = key(p, Some("50"));
        let b = key(p, Some("55"));

        assert_eq!(reconcile(a, dec("10"), a, dec("10")), Reconciliation::Unchanged);
        assert_eq!(
            reconcile(a, dec("10"), a, dec("12.5")),
            Reconciliation::QuantityChanged { delta: dec("2.5") }
        );
        assert_eq!(
            reconcile(a, dec("10"), b, dec("8")),
            Reconciliation::MovedTier { from: a, to: b, remove: dec("10"), add: dec("8") }
        );
    }

    #[test]
    fn test_null_and_zero_tiers_are_different_buckets() {
        let p = Uuid::new_v4();
        let none = key(p, None);
        let zero = key(p, Some("0"));
        assert!(matches!(
            reconcile(none, dec("1"), zero, dec("1")),
            Reconciliation::MovedTier { .. }
        ));
    }

    #[test]
    fn test_plan_update_keep_add_remove() {
        let p = Uuid::new_v4();
        let kept = recorded(key(p, Some("50")), "10");
        let dropped = recorded(key(p, None), "3");
        let update = [
            incoming(0, Some(kept.line_id), key(p, Some("55")), "10"),
            incoming(1, None, key(Uuid::new_v4(), None), "4"),
        ];

        let plans = plan_update(&[kept, dropped], &update).unwrap();
        assert_eq!(plans.len(), 3);
        assert!(matches!(
            plans[0],
            LinePlan::Keep { change: Reconciliation::MovedTier { .. }, .. }
        ));
        assert!(matches!(plans[1], LinePlan::Add { incoming } if incoming.index == 1));
        assert_eq!(plans[2], LinePlan::Remove { recorded: dropped });
    }

    #[test]
    fn test_plan_update_unknown_line() {
        let p = Uuid::new_v4();
        let update = [incoming(0, Some(Uuid::new_v4()), key(p, None), "1")];
        let err = plan_update(&[], &update).unwrap_err();
        assert!(matches!(err, CoreError::PurchaseLineNotFound(_)));
    }

    #[test]
    fn test_plan_update_duplicate_line() {
        let p = Uuid::new_v4();
        let rec = recorded(key(p, None), "1");
        let update = [
            incoming(0, Some(rec.line_id), rec.key, "1"),
            incoming(1, Some(rec.line_id), rec.key, "2"),
        ];
        let err = plan_update(&[rec], &update).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::Duplicate { .. })));
    }

    #[test]
    fn test_plan_update_empty_removes_all() {
        let p = Uuid::new_v4();
        let a = recorded(key(p, None), "1");
        let b = recorded(key(p, Some("9")), "2");
        let plans = plan_update(&[a, b], &[]).unwrap();
        assert_eq!(plans, vec![LinePlan::Remove { recorded: a }, LinePlan::Remove { recorded: b }]);
    }
}
