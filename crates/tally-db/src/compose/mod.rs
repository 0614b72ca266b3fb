//! # Composers
//!
//! Multi-statement operations that run inside one transaction. Each takes
//! the [`Repositories`](crate::repository::Repositories) bundle and the
//! transaction's connection; committing is the runner's job.
//!
//! - [`sale`] - stock decrement, totals, loyalty, sale rows
//! - [`product`] - masters with opening stock
//! - [`purchase`] - product resolution, stock increment, line edits

pub mod product;
pub mod purchase;
pub mod sale;

use std::collections::{BTreeMap, BTreeSet};

use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::Repositories;
use tally_core::{Product, PurchaseItemInput};

/// The product a purchase line refers to: by ID, or by SKU (created when
/// new in the store).
pub(crate) async fn resolve_purchase_product(
    repos: &Repositories,
    conn: &mut PgConnection,
    store_id: Option<Uuid>,
    item: &PurchaseItemInput,
) -> DbResult<Product> {
    match item.product_id {
        Some(id) => repos.products.require(conn, id, store_id).await,
        None => repos.products.resolve_by_sku(conn, store_id, item).await,
    }
}

/// Locks product masters in id order, the same order sales lock them in.
///
/// Purchases take these locks before touching any variant row, so a sale
/// and a purchase on the same product queue on the master instead of
/// crossing over variant locks.
pub(crate) async fn lock_products(
    repos: &Repositories,
    conn: &mut PgConnection,
    store_id: Option<Uuid>,
    ids: impl IntoIterator<Item = Uuid>,
) -> DbResult<BTreeMap<Uuid, Product>> {
    let mut locked = BTreeMap::new();
    let ids: BTreeSet<Uuid> = ids.into_iter().collect();
    for id in ids {
        let product = repos.products.lock(&mut *conn, id, store_id).await?;
        locked.insert(id, product);
    }
    Ok(locked)
}
