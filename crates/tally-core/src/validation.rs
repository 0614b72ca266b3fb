//! # Validation Module
//!
//! Input validation for the engine's operations.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Transport (outside this workspace)                           │
//! │  └── Deserialization / type checks                                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (before any transaction is opened)               │
//! │  ├── Quantities > 0, prices and tax rates ≥ 0                          │
//! │  └── Contradictory references (variant without product, ...)           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database                                                     │
//! │  ├── Row locks + stock checks (InsufficientStock)                      │
//! │  └── UNIQUE constraints (variant per tier, SKU per store)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;

use rust_decimal::Decimal;

use crate::error::ValidationError;
use crate::request::{
    NewProduct, ProductUpdate, PurchaseItemInput, PurchaseRequest, PurchaseUpdate, SaleRequest,
};
use crate::{MAX_LINE_ITEMS, QUANTITY_SCALE};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU.
///
/// ## Rules
/// - Must not be empty
/// - At most 64 characters
/// - Letters, digits, `-`, `_`, `.` and `/` only
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_sku;
///
/// assert!(validate_sku("RICE-1KG").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("has space").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.chars().count() > 64 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 64,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, '-', '_', '.' and '/'".to_string(),
        });
    }

    Ok(())
}

/// Validates a product name.
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_product_name;
///
/// assert!(validate_product_name("Basmati Rice 1kg").is_ok());
/// assert!(validate_product_name("   ").is_err());
/// ```
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Quantities must be strictly positive. Fractions are allowed down to
/// [`QUANTITY_SCALE`] places.
pub fn validate_quantity(field: &str, qty: Decimal) -> ValidationResult<()> {
    if qty <= Decimal::ZERO {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    validate_quantity_scale(field, qty)
}

/// Stock columns hold [`QUANTITY_SCALE`] places; anything finer would be
/// rounded away by the database after the stock check passed.
pub fn validate_quantity_scale(field: &str, qty: Decimal) -> ValidationResult<()> {
    if qty.normalize().scale() > QUANTITY_SCALE {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: format!("at most {} decimal places", QUANTITY_SCALE),
        });
    }
    Ok(())
}

/// Prices and costs must be zero or greater.
pub fn validate_price(field: &str, price: Decimal) -> ValidationResult<()> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Tax rates are percentages, zero or greater.
pub fn validate_tax_rate(field: &str, rate: Decimal) -> ValidationResult<()> {
    validate_price(field, rate)
}

fn validate_item_count(count: usize) -> ValidationResult<()> {
    if count == 0 {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }
    if count > MAX_LINE_ITEMS {
        return Err(ValidationError::InvalidFormat {
            field: "items".to_string(),
            reason: format!("at most {} line items are allowed", MAX_LINE_ITEMS),
        });
    }
    Ok(())
}

// =============================================================================
// Request Validators
// =============================================================================

/// Validates a sale request.
///
/// ## Rules
/// - 1 to `MAX_LINE_ITEMS` lines
/// - quantity > 0, unit price ≥ 0, tax rate ≥ 0 on every line
/// - `variant_id` requires `product_id`
/// - `variant_id` and `use_master_stock` are mutually exclusive
/// - free-text lines (no product) need a name
/// - breakdown amounts ≥ 0 (a negative points request is tolerated and
///   spends nothing)
pub fn validate_sale_request(req: &SaleRequest) -> ValidationResult<()> {
    validate_item_count(req.items.len())?;

    for (i, item) in req.items.iter().enumerate() {
        validate_quantity(&format!("items[{}].quantity", i), item.quantity)?;
        validate_price(&format!("items[{}].unit_price", i), item.unit_price)?;
        if let Some(rate) = item.tax_rate {
            validate_tax_rate(&format!("items[{}].tax_rate", i), rate)?;
        }

        if item.variant_id.is_some() && item.product_id.is_none() {
            return Err(ValidationError::InvalidFormat {
                field: format!("items[{}].variant_id", i),
                reason: "a variant requires its product_id".to_string(),
            });
        }
        if item.variant_id.is_some() && item.use_master_stock {
            return Err(ValidationError::InvalidFormat {
                field: format!("items[{}].use_master_stock", i),
                reason: "cannot draw from master stock and a specific variant".to_string(),
            });
        }
        if item.product_id.is_none() {
            let named = item.name.as_deref().map(str::trim).unwrap_or_default();
            if named.is_empty() {
                return Err(ValidationError::Required {
                    field: format!("items[{}].name", i),
                });
            }
        }
    }

    if let Some(payment) = &req.payment {
        validate_price("payment.cash", payment.cash)?;
        validate_price("payment.card", payment.card)?;
        validate_price("payment.upi", payment.upi)?;
        validate_price("payment.credit", payment.credit)?;
        if payment.credit > Decimal::ZERO && req.customer_id.is_none() {
            return Err(ValidationError::Required {
                field: "customer_id".to_string(),
            });
        }
    }

    Ok(())
}

fn validate_purchase_item(i: usize, item: &PurchaseItemInput) -> ValidationResult<()> {
    validate_quantity(&format!("items[{}].quantity", i), item.quantity)?;
    validate_price(&format!("items[{}].unit_cost", i), item.unit_cost)?;
    if let Some(price) = item.price {
        validate_price(&format!("items[{}].price", i), price)?;
    }
    if let Some(mrp) = item.mrp {
        validate_price(&format!("items[{}].mrp", i), mrp)?;
    }
    if let Some(rate) = item.tax_rate {
        validate_tax_rate(&format!("items[{}].tax_rate", i), rate)?;
    }

    match (&item.product_id, &item.sku) {
        (Some(_), _) => {}
        (None, Some(sku)) => validate_sku(sku)?,
        (None, None) => {
            return Err(ValidationError::Required {
                field: format!("items[{}].product_id", i),
            })
        }
    }

    if item.variant_id.is_some() && item.product_id.is_none() {
        return Err(ValidationError::InvalidFormat {
            field: format!("items[{}].variant_id", i),
            reason: "a variant requires its product_id".to_string(),
        });
    }

    Ok(())
}

/// Validates a new purchase.
///
/// Each line needs a `product_id`, or a valid `sku`. A line with only a
/// SKU creates the master when the SKU is unknown, and then also needs a
/// name; that part is checked against stored data during the transaction.
pub fn validate_purchase_request(req: &PurchaseRequest) -> ValidationResult<()> {
    validate_price("total", req.total)?;
    validate_item_count(req.items.len())?;
    for (i, item) in req.items.iter().enumerate() {
        if item.line_id.is_some() {
            return Err(ValidationError::InvalidFormat {
                field: format!("items[{}].line_id", i),
                reason: "new purchases cannot reference existing lines".to_string(),
            });
        }
        validate_purchase_item(i, item)?;
    }
    Ok(())
}

/// Validates a purchase update.
///
/// Same line rules as create, plus: a `line_id` may appear at most once.
/// An update may remove every line (empty `items`).
pub fn validate_purchase_update(update: &PurchaseUpdate) -> ValidationResult<()> {
    validate_price("total", update.total)?;
    if update.items.len() > MAX_LINE_ITEMS {
        validate_item_count(update.items.len())?;
    }

    let mut seen = HashSet::new();
    for (i, item) in update.items.iter().enumerate() {
        validate_purchase_item(i, item)?;
        if let Some(line_id) = item.line_id {
            if !seen.insert(line_id) {
                return Err(ValidationError::Duplicate {
                    field: "line_id".to_string(),
                    value: line_id.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Validates a new product master.
pub fn validate_new_product(p: &NewProduct) -> ValidationResult<()> {
    validate_product_name(&p.name)?;
    if let Some(sku) = &p.sku {
        validate_sku(sku)?;
    }
    validate_price("price", p.price)?;
    if let Some(mrp) = p.mrp {
        validate_price("mrp", mrp)?;
    }
    validate_tax_rate("tax_rate", p.tax_rate)?;
    validate_price("opening_stock", p.opening_stock)?;
    validate_quantity_scale("opening_stock", p.opening_stock)?;
    Ok(())
}

/// Validates a product update (field shapes only).
pub fn validate_product_update(u: &ProductUpdate) -> ValidationResult<()> {
    if let Some(name) = &u.name {
        validate_product_name(name)?;
    }
    if let Some(price) = u.price {
        validate_price("price", price)?;
    }
    if let Some(mrp) = u.mrp {
        validate_price("mrp", mrp)?;
    }
    if let Some(rate) = u.tax_rate {
        validate_tax_rate("tax_rate", rate)?;
    }
    Ok(())
}

/// The repacking flag may be set, but never unset.
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_repacking_change;
///
/// assert!(validate_repacking_change(false, Some(true)).is_ok());
/// assert!(validate_repacking_change(true, Some(true)).is_ok());
/// assert!(validate_repacking_change(true, None).is_ok());
/// assert!(validate_repacking_change(true, Some(false)).is_err());
/// ```
pub fn validate_repacking_change(current: bool, requested: Option<bool>) -> ValidationResult<()> {
    if current && requested == Some(false) {
        return Err(ValidationError::Immutable {
            field: "is_repacking".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{PaymentBreakdown, SaleItemInput};
    use crate::types::PaymentMethod;
    use uuid::Uuid;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn sale_item() -> SaleItemInput {
        SaleItemInput {
            product_id: Some(Uuid::new_v4()),
            variant_id: None,
            use_master_stock: false,
            name: None,
            quantity: dec("1"),
            unit_price: dec("10"),
            tax_rate: None,
        }
    }

    fn sale(items: Vec<SaleItemInput>) -> SaleRequest {
        SaleRequest {
            store_id: None,
            items,
            payment_method: PaymentMethod::Cash,
            customer_id: None,
            payment: None,
        }
    }

    fn purchase_item() -> PurchaseItemInput {
        PurchaseItemInput {
            product_id: Some(Uuid::new_v4()),
            quantity: dec("5"),
            unit_cost: dec("8"),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("ABC-123").is_ok());
        assert!(validate_sku("oil/1l").is_ok());
        assert!(validate_sku("").is_err());
        assert!(validate_sku(&"A".repeat(65)).is_err());
        assert!(validate_sku("bad sku").is_err());
    }

    #[test]
    fn test_quantity_must_be_positive() {
        assert!(validate_quantity("q", dec("0.25")).is_ok());
        assert!(validate_quantity("q", dec("0")).is_err());
        assert!(validate_quantity("q", dec("-1")).is_err());
    }

    #[test]
    fn test_quantity_finer_than_stock_scale_is_rejected() {
        assert!(validate_quantity("q", dec("0.001")).is_ok());
        assert!(validate_quantity("q", dec("1.5000")).is_ok());
        assert!(matches!(
            validate_quantity("q", dec("0.0004")),
            Err(ValidationError::InvalidFormat { .. })
        ));

        let mut item = sale_item();
        item.quantity = dec("2.0005");
        assert!(validate_sale_request(&sale(vec![item])).is_err());

        let mut line = purchase_item();
        line.quantity = dec("0.0004");
        let req = PurchaseRequest {
            store_id: None,
            supplier_id: None,
            total: Decimal::ZERO,
            items: vec![line],
        };
        assert!(validate_purchase_request(&req).is_err());
    }

    #[test]
    fn test_price_zero_is_allowed() {
        assert!(validate_price("p", dec("0")).is_ok());
        assert!(validate_price("p", dec("-0.00")).is_ok());
        assert!(validate_price("p", dec("-0.01")).is_err());
    }

    #[test]
    fn test_sale_rejects_empty_items() {
        assert!(matches!(
            validate_sale_request(&sale(vec![])),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_sale_rejects_zero_quantity() {
        let mut item = sale_item();
        item.quantity = dec("0");
        assert!(validate_sale_request(&sale(vec![item])).is_err());
    }

    #[test]
    fn test_sale_rejects_variant_without_product() {
        let mut item = sale_item();
        item.product_id = None;
        item.variant_id = Some(Uuid::new_v4());
        item.name = Some("Loose sugar".into());
        assert!(validate_sale_request(&sale(vec![item])).is_err());
    }

    #[test]
    fn test_sale_rejects_variant_with_master_flag() {
        let mut item = sale_item();
        item.variant_id = Some(Uuid::new_v4());
        item.use_master_stock = true;
        assert!(validate_sale_request(&sale(vec![item])).is_err());
    }

    #[test]
    fn test_free_text_line_needs_name() {
        let mut item = sale_item();
        item.product_id = None;
        assert!(validate_sale_request(&sale(vec![item.clone()])).is_err());
        item.name = Some("Carry bag".into());
        assert!(validate_sale_request(&sale(vec![item])).is_ok());
    }

    #[test]
    fn test_negative_points_request_is_tolerated() {
        let mut req = sale(vec![sale_item()]);
        req.payment = Some(PaymentBreakdown {
            points: Some(dec("-5")),
            ..Default::default()
        });
        assert!(validate_sale_request(&req).is_ok());
    }

    #[test]
    fn test_credit_requires_customer() {
        let mut req = sale(vec![sale_item()]);
        req.payment = Some(PaymentBreakdown {
            credit: dec("20"),
            ..Default::default()
        });
        assert!(validate_sale_request(&req).is_err());
        req.customer_id = Some(Uuid::new_v4());
        assert!(validate_sale_request(&req).is_ok());
    }

    #[test]
    fn test_purchase_item_needs_product_or_sku() {
        let mut item = purchase_item();
        item.product_id = None;
        let req = PurchaseRequest {
            store_id: None,
            supplier_id: None,
            total: dec("40"),
            items: vec![item.clone()],
        };
        assert!(validate_purchase_request(&req).is_err());

        item.sku = Some("SUGAR-1KG".into());
        let req = PurchaseRequest {
            items: vec![item],
            ..req
        };
        assert!(validate_purchase_request(&req).is_ok());
    }

    #[test]
    fn test_purchase_create_rejects_line_ids() {
        let mut item = purchase_item();
        item.line_id = Some(Uuid::new_v4());
        let req = PurchaseRequest {
            store_id: None,
            supplier_id: None,
            total: dec("40"),
            items: vec![item],
        };
        assert!(validate_purchase_request(&req).is_err());
    }

    #[test]
    fn test_purchase_update_rejects_duplicate_line() {
        let line = Uuid::new_v4();
        let mut a = purchase_item();
        a.line_id = Some(line);
        let b = a.clone();
        let update = PurchaseUpdate {
            store_id: None,
            total: dec("80"),
            items: vec![a, b],
        };
        assert!(matches!(
            validate_purchase_update(&update),
            Err(ValidationError::Duplicate { .. })
        ));
    }

    #[test]
    fn test_purchase_update_may_remove_everything() {
        let update = PurchaseUpdate {
            store_id: None,
            total: dec("0"),
            items: vec![],
        };
        assert!(validate_purchase_update(&update).is_ok());
    }

    #[test]
    fn test_repacking_cannot_be_unset() {
        assert!(validate_repacking_change(false, Some(false)).is_ok());
        assert!(matches!(
            validate_repacking_change(true, Some(false)),
            Err(ValidationError::Immutable { .. })
        ));
    }
}
