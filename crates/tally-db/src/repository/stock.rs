//! # Stock Ledger
//!
//! Every stock movement goes through here: sale decrements, purchase
//! increments and purchase-edit reversals.
//!
//! ## Sale decrement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lock product (FOR NO KEY UPDATE, store scoped)                         │
//! │       │                                                                 │
//! │       ├── source = Variant(v) ──► lock v ──► plan_single(v.stock)       │
//! │       ├── source = Master     ──► plan_single(product.stock)            │
//! │       ├── repacking product   ──► plan_single(product.stock)            │
//! │       └── source = Auto                                                 │
//! │              ├── no variants ──► plan_single(product.stock)             │
//! │              └── lock all variants (tier order) ──► plan_consumption    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  apply each StockDraw (rows are still locked, so stock stays >= 0)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rust_decimal::Decimal;
use sqlx::PgConnection;
use tracing::{debug, warn};
use uuid::Uuid;

use super::product::ProductRepository;
use super::variant::{VariantRepository, VariantUpsert};
use crate::error::DbResult;
use tally_core::stock::{plan_consumption, plan_single};
use tally_core::types::PriceTier;
use tally_core::{DrawTarget, LockedStock, Product, PurchaseItemInput, StockDraw, StockSource};

/// Result of decrementing stock for one sale line.
#[derive(Debug, Clone)]
pub struct SaleDraw {
    /// The product as locked for this sale.
    pub product: Product,
    pub draws: Vec<StockDraw>,
}

/// Where a purchase line's stock went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockPlacement {
    /// `None` when the stock went onto a repacking master.
    pub variant_id: Option<Uuid>,
    pub tier: PriceTier,
}

/// Stock movements across masters and variants.
#[derive(Debug, Clone)]
pub struct StockLedger {
    products: ProductRepository,
    variants: VariantRepository,
}

impl StockLedger {
    pub fn new(products: ProductRepository, variants: VariantRepository) -> Self {
        StockLedger { products, variants }
    }

    /// Takes `quantity` of a product out of stock.
    ///
    /// ## Errors
    /// - `ProductNotFound` / `VariantNotFound` for unknown or out-of-scope rows
    /// - `InsufficientStock` when the locked rows hold too little
    pub async fn decrement_for_sale(
        &self,
        conn: &mut PgConnection,
        product_id: Uuid,
        store_id: Option<Uuid>,
        quantity: Decimal,
        source: StockSource,
    ) -> DbResult<SaleDraw> {
        let product = self.products.lock(&mut *conn, product_id, store_id).await?;
        let label = product.label();

        let draws = match source {
            StockSource::Variant(variant_id) => {
                let variant = self.variants.lock_one(&mut *conn, variant_id, product.id).await?;
                plan_single(&label, DrawTarget::Variant(variant.id), variant.stock, quantity)?
            }
            StockSource::Master => {
                plan_single(&label, DrawTarget::Master, product.stock, quantity)?
            }
            StockSource::Auto if product.is_repacking => {
                plan_single(&label, DrawTarget::Master, product.stock, quantity)?
            }
            StockSource::Auto => {
                let rows = self.variants.lock_for_product(&mut *conn, product.id).await?;
                if rows.is_empty() {
                    plan_single(&label, DrawTarget::Master, product.stock, quantity)?
                } else {
                    let locked: Vec<LockedStock> = rows
                        .iter()
                        .map(|v| LockedStock {
                            variant_id: v.id,
                            tier: v.tier(),
                            available: v.stock,
                        })
                        .collect();
                    plan_consumption(&label, &locked, quantity)?
                }
            }
        };

        for draw in &draws {
            match draw.target {
                DrawTarget::Variant(id) => {
                    self.variants.adjust_stock(&mut *conn, id, -draw.quantity).await?;
                }
                DrawTarget::Master => {
                    self.products.adjust_stock(&mut *conn, product.id, -draw.quantity).await?;
                }
            }
        }

        debug!(
            product_id = %product.id,
            quantity = %quantity,
            draws = draws.len(),
            "Stock decremented"
        );
        Ok(SaleDraw { product, draws })
    }

    /// Books a purchase line's quantity into stock.
    ///
    /// Repacking masters take the stock directly. Otherwise the line goes
    /// to its designated variant, or to the variant of its tier (created on
    /// first use, priced from the line or the master).
    pub async fn increment_for_purchase(
        &self,
        conn: &mut PgConnection,
        product: &Product,
        store_id: Option<Uuid>,
        item: &PurchaseItemInput,
    ) -> DbResult<StockPlacement> {
        if product.is_repacking {
            self.products
                .apply_repack_purchase(conn, product.id, item.quantity, item.price, item.mrp)
                .await?;
            return Ok(StockPlacement {
                variant_id: None,
                tier: item.tier(),
            });
        }

        if let Some(variant_id) = item.variant_id {
            let variant = self.variants.lock_one(&mut *conn, variant_id, product.id).await?;
            self.variants.adjust_stock(conn, variant.id, item.quantity).await?;
            return Ok(StockPlacement {
                variant_id: Some(variant.id),
                tier: variant.tier(),
            });
        }

        let variant = self
            .variants
            .upsert(
                conn,
                &VariantUpsert {
                    product_id: product.id,
                    store_id,
                    tier: item.tier(),
                    price: item.price.or(Some(product.price)),
                    unit: item.unit.clone().or_else(|| product.unit.clone()),
                    tax_rate: item.tax_rate.or(Some(product.tax_rate)),
                    barcode: None,
                    stock_delta: item.quantity,
                },
            )
            .await?;

        Ok(StockPlacement {
            variant_id: Some(variant.id),
            tier: variant.tier(),
        })
    }

    /// Moves stock on the row a purchase line fed. `variant_id = None`
    /// means the product master.
    ///
    /// Reversals may leave stock negative when it was sold in between; that
    /// is logged, not refused.
    pub async fn adjust_booked(
        &self,
        conn: &mut PgConnection,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        delta: Decimal,
    ) -> DbResult<Decimal> {
        let stock = match variant_id {
            Some(id) => self.variants.adjust_stock(conn, id, delta).await?,
            None => self.products.adjust_stock(conn, product_id, delta).await?,
        };
        if stock < Decimal::ZERO {
            warn!(
                product_id = %product_id,
                variant_id = ?variant_id,
                stock = %stock,
                "Purchase edit left stock negative"
            );
        }
        Ok(stock)
    }

    /// Takes a purchase line's quantity back out of stock.
    pub async fn reverse(
        &self,
        conn: &mut PgConnection,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        quantity: Decimal,
    ) -> DbResult<Decimal> {
        self.adjust_booked(conn, product_id, variant_id, -quantity).await
    }
}
