//! # Repository Module
//!
//! SQL for each table of the engine.
//!
//! ## Connection Passing
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Composer (inside TransactionRunner::run)                               │
//! │       │                                                                 │
//! │       │  repos.variants.lock_for_product(conn, product_id)              │
//! │       ▼                                                                 │
//! │  VariantRepository                                                      │
//! │  ├── methods taking `conn: &mut PgConnection` join the caller's tx     │
//! │  └── methods without `conn` open a short read tx on the pool           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SchemaCatalog::fetch_all_adaptive  (when optional columns are used)    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`] - Product masters, SKU resolution
//! - [`VariantRepository`] - Per-tier stock rows and the upsert
//! - [`StockLedger`] - Decrement / increment / reverse across both
//! - [`SaleRepository`] - Sales and sale lines
//! - [`PurchaseRepository`] - Purchases and purchase lines
//! - [`CustomerRepository`] - Loyalty and credit balances

pub mod customer;
pub mod product;
pub mod purchase;
pub mod sale;
pub mod stock;
pub mod variant;

use std::sync::Arc;

use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::DbResult;
use crate::schema::SchemaCatalog;
use tally_core::SchemaCapabilities;

pub use customer::CustomerRepository;
pub use product::ProductRepository;
pub use purchase::PurchaseRepository;
pub use sale::SaleRepository;
pub use stock::{SaleDraw, StockLedger, StockPlacement};
pub use variant::{VariantRepository, VariantUpsert};

/// Every repository, sharing one pool and one schema catalog.
#[derive(Debug, Clone)]
pub struct Repositories {
    pub catalog: Arc<SchemaCatalog>,
    pub products: ProductRepository,
    pub variants: VariantRepository,
    pub stock: StockLedger,
    pub sales: SaleRepository,
    pub purchases: PurchaseRepository,
    pub customers: CustomerRepository,
}

impl Repositories {
    pub fn new(pool: PgPool, catalog: Arc<SchemaCatalog>) -> Self {
        let products = ProductRepository::new(pool.clone(), Arc::clone(&catalog));
        let variants = VariantRepository::new(pool.clone(), Arc::clone(&catalog));
        Repositories {
            stock: StockLedger::new(products.clone(), variants.clone()),
            sales: SaleRepository::new(pool.clone(), Arc::clone(&catalog)),
            purchases: PurchaseRepository::new(pool.clone(), Arc::clone(&catalog)),
            customers: CustomerRepository::new(pool, Arc::clone(&catalog)),
            products,
            variants,
            catalog,
        }
    }
}

/// Runs an adaptive read in its own short transaction.
pub(crate) async fn read_adaptive<T, F>(
    pool: &PgPool,
    catalog: &SchemaCatalog,
    what: &'static str,
    build: F,
) -> DbResult<Vec<T>>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    F: FnMut(&SchemaCapabilities) -> Option<QueryBuilder<'static, Postgres>>,
{
    let mut tx = pool.begin().await?;
    let rows = catalog.fetch_all_adaptive(&mut *tx, what, build).await?;
    tx.commit().await?;
    Ok(rows)
}

/// `store_id IS NOT DISTINCT FROM $n`: global rows match a `None` store.
pub(crate) fn push_store_scope(
    qb: &mut QueryBuilder<'static, Postgres>,
    column: &'static str,
    store_id: Option<Uuid>,
) {
    qb.push(column);
    qb.push(" IS NOT DISTINCT FROM ");
    qb.push_bind(store_id);
}
