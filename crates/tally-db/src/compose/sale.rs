//! # Sale Composer
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SaleRequest                                                            │
//! │    │                                                                    │
//! │    ├── 1. decrement stock, items sorted by (product_id, position)      │
//! │    │       first failure aborts the whole sale                          │
//! │    ├── 2. totals (unrounded, then rounded once)                         │
//! │    ├── 3. lock customer, settle loyalty against the locked balance      │
//! │    ├── 4. customer balances (points spent, points awarded, credit)      │
//! │    └── 5. sale row + metadata, sale item rows                           │
//! │                                                                         │
//! │  ──► SaleReceipt { sale_id, loyalty_awarded, loyalty_used }             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgConnection;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::{Repositories, SaleDraw};
use tally_core::loyalty;
use tally_core::schema::columns;
use tally_core::stock::single_variant;
use tally_core::totals::{LineAmount, SaleTotals};
use tally_core::types::{LoyaltyAnnotation, SaleMetadata, TaxRate};
use tally_core::{CoreError, Money, Sale, SaleItem, SaleReceipt, SaleRequest};

/// Records a sale. Must run inside the caller's transaction.
pub async fn create(
    repos: &Repositories,
    conn: &mut PgConnection,
    req: &SaleRequest,
) -> DbResult<SaleReceipt> {
    let sale_id = Uuid::new_v4();
    let store_id = req.store_id;

    // Stock, in lock order.
    let mut order: Vec<(Uuid, usize)> = req
        .items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| item.product_id.map(|id| (id, index)))
        .collect();
    order.sort();

    let mut drawn: Vec<Option<SaleDraw>> = (0..req.items.len()).map(|_| None).collect();
    for (product_id, index) in order {
        let item = &req.items[index];
        let draw = repos
            .stock
            .decrement_for_sale(
                &mut *conn,
                product_id,
                store_id,
                item.quantity,
                item.stock_source(),
            )
            .await
            .map_err(|e| invalid_item(index, e))?;
        drawn[index] = Some(draw);
    }

    // Lines and totals.
    let mut amounts = Vec::with_capacity(req.items.len());
    let mut items = Vec::with_capacity(req.items.len());
    for (index, item) in req.items.iter().enumerate() {
        let draw = drawn[index].as_ref();
        let tax_rate = item
            .tax_rate
            .or_else(|| draw.map(|d| d.product.tax_rate))
            .unwrap_or(Decimal::ZERO);
        let name = item
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .or_else(|| draw.map(|d| d.product.name.clone()))
            .unwrap_or_default();

        let amount = LineAmount {
            quantity: item.quantity,
            unit_price: Money::from_decimal(item.unit_price),
            tax_rate: TaxRate::from_percent(tax_rate),
        };
        items.push(SaleItem {
            id: Uuid::new_v4(),
            sale_id,
            store_id,
            product_id: item.product_id,
            variant_id: draw.and_then(|d| single_variant(&d.draws)),
            name,
            quantity: item.quantity,
            unit_price: item.unit_price,
            tax_rate,
            line_total: amount.net().round_currency().amount(),
            position: index as i32,
        });
        amounts.push(amount);
    }
    let totals = SaleTotals::compute(&amounts).rounded();

    // Customer and loyalty.
    let customer = match req.customer_id {
        Some(id) => Some(repos.customers.lock(&mut *conn, id, store_id).await?),
        None => None,
    };
    let loyalty_enabled = repos.catalog.supports(columns::CUSTOMERS_LOYALTY_POINTS);
    let balance = customer
        .as_ref()
        .filter(|_| loyalty_enabled)
        .map(|c| c.loyalty_points);
    let requested_points = req.payment.as_ref().and_then(|p| p.points);
    let mut outcome = loyalty::settle(totals.grand_total, requested_points, balance);

    let mut credit = req
        .payment
        .as_ref()
        .map(|p| p.credit)
        .unwrap_or(Decimal::ZERO);

    if let Some(customer) = &customer {
        if outcome.spent > 0
            && !repos
                .customers
                .spend_points(&mut *conn, customer.id, outcome.spent)
                .await?
        {
            if repos.catalog.supports(columns::CUSTOMERS_LOYALTY_POINTS) {
                return Err(DbError::Conflict(format!(
                    "loyalty balance of customer {} changed during sale",
                    customer.id
                )));
            }
            warn!(customer_id = %customer.id, "Loyalty column disappeared; nothing spent");
            outcome.spent = 0;
        }
        if outcome.awarded > 0 {
            repos
                .customers
                .award_points(&mut *conn, customer.id, outcome.awarded)
                .await?;
        }
        if credit > Decimal::ZERO
            && !repos.customers.add_credit(&mut *conn, customer.id, credit).await?
        {
            warn!(customer_id = %customer.id, "Credit due not recorded; column absent");
            credit = Decimal::ZERO;
        }
    }

    // Sale rows.
    let metadata = SaleMetadata {
        loyalty: LoyaltyAnnotation {
            awarded: outcome.awarded,
            requested: outcome.requested,
            spent: outcome.spent,
        },
        credit,
        payment: req.payment.clone(),
    };
    let sale = Sale {
        id: sale_id,
        store_id,
        customer_id: req.customer_id,
        subtotal: totals.subtotal.amount(),
        tax_total: totals.tax_total.amount(),
        grand_total: totals.grand_total.amount(),
        payment_method: req.payment_method,
        metadata: serde_json::to_value(&metadata).map_err(|e| DbError::Internal(e.to_string()))?,
        created_at: Utc::now(),
    };
    repos.sales.insert_sale(&mut *conn, &sale).await?;
    repos.sales.insert_items(&mut *conn, &items).await?;

    debug!(
        sale_id = %sale_id,
        lines = items.len(),
        grand_total = %sale.grand_total,
        loyalty_awarded = outcome.awarded,
        loyalty_used = outcome.spent,
        "Sale composed"
    );

    Ok(SaleReceipt {
        sale_id,
        loyalty_awarded: outcome.awarded,
        loyalty_used: outcome.spent,
        grand_total: sale.grand_total,
    })
}

/// A missing product or variant on a line is reported against the line.
fn invalid_item(index: usize, err: DbError) -> DbError {
    match err {
        DbError::Domain(core) if core.is_not_found() => CoreError::InvalidItem {
            index,
            reason: core.to_string(),
        }
        .into(),
        other => other,
    }
}
