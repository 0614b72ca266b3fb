//! Product masters and their opening stock.

use rust_decimal::Decimal;
use sqlx::PgConnection;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::{Repositories, VariantUpsert};
use tally_core::types::PriceTier;
use tally_core::{NewProduct, Product, ProductUpdate};

/// Creates a master. Repacking products keep their opening stock on the
/// master; others get a first variant at the master's tier holding it.
pub async fn create(
    repos: &Repositories,
    conn: &mut PgConnection,
    new: &NewProduct,
) -> DbResult<Product> {
    let master_stock = if new.is_repacking {
        new.opening_stock
    } else {
        Decimal::ZERO
    };
    let product = repos.products.insert(&mut *conn, new, master_stock).await?;

    if !product.is_repacking {
        let variant = repos
            .variants
            .upsert(
                &mut *conn,
                &VariantUpsert {
                    product_id: product.id,
                    store_id: product.store_id,
                    tier: PriceTier::from_mrp(product.mrp),
                    price: Some(product.price),
                    unit: product.unit.clone(),
                    tax_rate: Some(product.tax_rate),
                    barcode: new.barcode.clone(),
                    stock_delta: new.opening_stock,
                },
            )
            .await?;
        debug!(product_id = %product.id, variant_id = %variant.id, "Opening variant created");
    }

    Ok(product)
}

pub async fn update(
    repos: &Repositories,
    conn: &mut PgConnection,
    id: Uuid,
    update: &ProductUpdate,
) -> DbResult<Product> {
    repos.products.update(conn, id, update).await
}
