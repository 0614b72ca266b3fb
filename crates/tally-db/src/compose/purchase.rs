//! # Purchase Composer
//!
//! ## Update reconciliation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  recorded lines (locked)          update items                          │
//! │        │                               │                                │
//! │        └───────────► plan_update ◄─────┘                                │
//! │                          │                                              │
//! │   Keep / Unchanged       │  rewrite cost + position only                │
//! │   Keep / QuantityChanged │  booked row += delta                         │
//! │   Keep / MovedTier       │  booked row -= old qty, new tier += new qty, │
//! │                          │  line repointed                              │
//! │   Add                    │  increment + insert line                     │
//! │   Remove                 │  booked row -= qty, delete line              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! "Booked row" is the variant the line fed, or the master for repacking
//! products.

use chrono::Utc;
use sqlx::PgConnection;
use tracing::debug;
use uuid::Uuid;

use super::{lock_products, resolve_purchase_product};
use crate::error::DbResult;
use crate::repository::{Repositories, StockPlacement};
use tally_core::reconcile::{
    plan_update, IncomingLine, LinePlan, Reconciliation, RecordedLine, StockKey,
};
use tally_core::schema::columns;
use tally_core::types::PriceTier;
use tally_core::{
    CoreError, Money, Purchase, PurchaseItem, PurchaseItemInput, PurchaseReceipt, PurchaseRequest,
    PurchaseUpdate,
};

/// Records a purchase. Must run inside the caller's transaction.
pub async fn create(
    repos: &Repositories,
    conn: &mut PgConnection,
    req: &PurchaseRequest,
) -> DbResult<PurchaseReceipt> {
    let now = Utc::now();
    let purchase = Purchase {
        id: Uuid::new_v4(),
        store_id: req.store_id,
        supplier_id: req.supplier_id,
        total: Money::from_decimal(req.total).round_currency().amount(),
        created_at: now,
        updated_at: now,
    };
    repos.purchases.insert(&mut *conn, &purchase).await?;

    let mut resolved = Vec::with_capacity(req.items.len());
    for item in &req.items {
        resolved.push(resolve_purchase_product(repos, &mut *conn, req.store_id, item).await?);
    }
    let ids = resolved.iter().map(|p| p.id);
    let locked = lock_products(repos, &mut *conn, req.store_id, ids).await?;
    let products: Vec<_> = resolved.iter().map(|p| locked.get(&p.id).unwrap_or(p)).collect();

    // Stock rows are touched in (product, tier) order.
    let mut order: Vec<usize> = (0..req.items.len()).collect();
    order.sort_by_key(|&i| (products[i].id, req.items[i].tier(), i));

    let mut lines = Vec::with_capacity(req.items.len());
    for index in order {
        let item = &req.items[index];
        let product = products[index];
        let placement = repos
            .stock
            .increment_for_purchase(&mut *conn, product, req.store_id, item)
            .await?;
        lines.push(line_row(purchase.id, Uuid::new_v4(), product.id, index, item, placement));
    }
    lines.sort_by_key(|line| line.position);

    repos.purchases.insert_items(&mut *conn, &lines).await?;

    debug!(purchase_id = %purchase.id, lines = lines.len(), "Purchase composed");
    Ok(PurchaseReceipt {
        purchase_id: purchase.id,
        lines: lines.len(),
    })
}

/// Replaces a purchase's lines, moving stock by the difference.
pub async fn update(
    repos: &Repositories,
    conn: &mut PgConnection,
    purchase_id: Uuid,
    update: &PurchaseUpdate,
) -> DbResult<PurchaseReceipt> {
    let store_id = update.store_id;
    let purchase = repos.purchases.lock(&mut *conn, purchase_id, store_id).await?;
    let stored = repos.purchases.lock_items(&mut *conn, purchase.id).await?;

    let mut recorded = Vec::with_capacity(stored.len());
    for line in &stored {
        let tier = recorded_tier(repos, &mut *conn, line).await?;
        recorded.push(RecordedLine {
            line_id: line.id,
            key: StockKey {
                product_id: line.product_id,
                tier,
            },
            quantity: line.quantity,
            variant_id: line.variant_id,
        });
    }

    let mut resolved = Vec::with_capacity(update.items.len());
    for item in &update.items {
        resolved.push(resolve_purchase_product(repos, &mut *conn, store_id, item).await?);
    }
    let ids = resolved
        .iter()
        .map(|p| p.id)
        .chain(recorded.iter().map(|r| r.key.product_id));
    let locked = lock_products(repos, &mut *conn, store_id, ids).await?;

    let mut products = Vec::with_capacity(update.items.len());
    let mut incoming = Vec::with_capacity(update.items.len());
    for (index, (item, product)) in update.items.iter().zip(&resolved).enumerate() {
        let product = locked.get(&product.id).unwrap_or(product);
        let tier = match item.variant_id {
            Some(variant_id) => repos
                .variants
                .lock_one(&mut *conn, variant_id, product.id)
                .await?
                .tier(),
            None => item.tier(),
        };
        incoming.push(IncomingLine {
            index,
            line_id: item.line_id,
            key: StockKey {
                product_id: product.id,
                tier,
            },
            quantity: item.quantity,
        });
        products.push(product);
    }

    let plans = plan_update(&recorded, &incoming)?;

    let mut added = Vec::new();
    for plan in plans {
        match plan {
            LinePlan::Keep {
                recorded,
                incoming,
                change,
            } => {
                let item = &update.items[incoming.index];
                let product = products[incoming.index];
                let placement = match change {
                    Reconciliation::Unchanged => StockPlacement {
                        variant_id: recorded.variant_id,
                        tier: recorded.key.tier,
                    },
                    Reconciliation::QuantityChanged { delta } => {
                        let booked = booked_variant(repos, &mut *conn, store_id, &recorded).await?;
                        repos
                            .stock
                            .adjust_booked(&mut *conn, recorded.key.product_id, booked, delta)
                            .await?;
                        StockPlacement {
                            variant_id: booked,
                            tier: recorded.key.tier,
                        }
                    }
                    Reconciliation::MovedTier { from, to, remove, .. } => {
                        debug!(
                            line_id = %recorded.line_id,
                            from = %from.tier,
                            to = %to.tier,
                            "Purchase line moved tier"
                        );
                        let booked = booked_variant(repos, &mut *conn, store_id, &recorded).await?;
                        repos
                            .stock
                            .reverse(&mut *conn, recorded.key.product_id, booked, remove)
                            .await?;
                        repos
                            .stock
                            .increment_for_purchase(&mut *conn, product, store_id, item)
                            .await?
                    }
                };
                let row = line_row(
                    purchase.id,
                    recorded.line_id,
                    product.id,
                    incoming.index,
                    item,
                    placement,
                );
                repos.purchases.update_item(&mut *conn, &row).await?;
            }
            LinePlan::Add { incoming } => {
                let item = &update.items[incoming.index];
                let product = products[incoming.index];
                let placement = repos
                    .stock
                    .increment_for_purchase(&mut *conn, product, store_id, item)
                    .await?;
                added.push(line_row(
                    purchase.id,
                    Uuid::new_v4(),
                    product.id,
                    incoming.index,
                    item,
                    placement,
                ));
            }
            LinePlan::Remove { recorded } => {
                let booked = booked_variant(repos, &mut *conn, store_id, &recorded).await?;
                repos
                    .stock
                    .reverse(&mut *conn, recorded.key.product_id, booked, recorded.quantity)
                    .await?;
                repos
                    .purchases
                    .delete_item(&mut *conn, purchase.id, recorded.line_id)
                    .await?;
            }
        }
    }

    repos.purchases.insert_items(&mut *conn, &added).await?;
    let total = Money::from_decimal(update.total).round_currency().amount();
    repos.purchases.update_total(&mut *conn, purchase.id, total).await?;

    debug!(
        purchase_id = %purchase.id,
        lines = update.items.len(),
        added = added.len(),
        "Purchase updated"
    );
    Ok(PurchaseReceipt {
        purchase_id: purchase.id,
        lines: update.items.len(),
    })
}

fn line_row(
    purchase_id: Uuid,
    line_id: Uuid,
    product_id: Uuid,
    index: usize,
    item: &PurchaseItemInput,
    placement: StockPlacement,
) -> PurchaseItem {
    PurchaseItem {
        id: line_id,
        purchase_id,
        product_id,
        variant_id: placement.variant_id,
        mrp: placement.tier.mrp(),
        quantity: item.quantity,
        unit_cost: item.unit_cost,
        position: index as i32,
    }
}

/// Tier a stored line fed. Older databases lack `purchase_items.mrp`; the
/// line's variant then tells, and a line with neither is untiered.
async fn recorded_tier(
    repos: &Repositories,
    conn: &mut PgConnection,
    line: &PurchaseItem,
) -> DbResult<PriceTier> {
    if repos.catalog.supports(columns::PURCHASE_ITEMS_MRP) {
        return Ok(line.tier());
    }
    match line.variant_id {
        Some(id) => Ok(repos
            .variants
            .find(conn, id)
            .await?
            .map(|v| v.tier())
            .unwrap_or(PriceTier::NONE)),
        None => Ok(PriceTier::NONE),
    }
}

/// The row a stored line's stock sits on. `None` is the master.
async fn booked_variant(
    repos: &Repositories,
    conn: &mut PgConnection,
    store_id: Option<Uuid>,
    recorded: &RecordedLine,
) -> DbResult<Option<Uuid>> {
    if let Some(id) = recorded.variant_id {
        return Ok(Some(id));
    }
    let product = repos
        .products
        .require(&mut *conn, recorded.key.product_id, store_id)
        .await?;
    if product.is_repacking {
        return Ok(None);
    }
    match repos
        .variants
        .find_for_tier(conn, product.id, recorded.key.tier)
        .await?
    {
        Some(variant) => Ok(Some(variant.id)),
        None => Err(CoreError::VariantNotFound(format!(
            "{} @ {}",
            product.id, recorded.key.tier
        ))
        .into()),
    }
}
