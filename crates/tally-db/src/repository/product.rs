//! # Product Repository
//!
//! Product masters: lookup, row locks, SKU resolution and edits.
//!
//! ## SKU Resolution
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  purchase line { sku: "rice-1kg", name: "Rice" }                        │
//! │       │                                                                 │
//! │       ├── find_by_sku (case-insensitive, store scoped) ── hit ──► use   │
//! │       │                                                                 │
//! │       └── miss ──► INSERT ... ON CONFLICT (store_id, lower(sku))        │
//! │                    DO UPDATE SET sku = products.sku RETURNING *         │
//! │                    (a concurrent creator's row comes back instead)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use super::{push_store_scope, read_adaptive};
use crate::error::DbResult;
use crate::schema::SchemaCatalog;
use tally_core::schema::columns;
use tally_core::validation::validate_repacking_change;
use tally_core::{
    CoreError, NewProduct, Product, ProductUpdate, PurchaseItemInput, SchemaCapabilities,
    ValidationError,
};

/// Column list for `products`, including optional columns present in `caps`.
pub(crate) fn product_columns(caps: &SchemaCapabilities) -> String {
    let mut cols = String::from(
        "id, store_id, sku, name, price, mrp, unit, tax_rate, stock, created_at, updated_at",
    );
    if caps.supports(columns::PRODUCTS_IS_REPACKING) {
        cols.push_str(", is_repacking");
    }
    cols
}

fn select_by_id(
    caps: &SchemaCapabilities,
    id: Uuid,
    store_id: Option<Uuid>,
    lock: bool,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT ");
    qb.push(product_columns(caps));
    qb.push(" FROM products WHERE id = ");
    qb.push_bind(id);
    qb.push(" AND ");
    push_store_scope(&mut qb, "store_id", store_id);
    // Stock edits never change key columns. NO KEY UPDATE stays compatible
    // with the KEY SHARE that foreign-key checks on line rows take.
    if lock {
        qb.push(" FOR NO KEY UPDATE");
    }
    qb
}

/// Repository for product masters.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: PgPool,
    catalog: Arc<SchemaCatalog>,
}

impl ProductRepository {
    pub fn new(pool: PgPool, catalog: Arc<SchemaCatalog>) -> Self {
        ProductRepository { pool, catalog }
    }

    /// Gets a product by ID, scoped to `store_id`.
    pub async fn get_by_id(&self, id: Uuid, store_id: Option<Uuid>) -> DbResult<Option<Product>> {
        let rows: Vec<Product> = read_adaptive(&self.pool, &self.catalog, "get_product", |caps| {
            Some(select_by_id(caps, id, store_id, false))
        })
        .await?;
        Ok(rows.into_iter().next())
    }

    /// Reads a product without locking it.
    pub async fn find(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        store_id: Option<Uuid>,
    ) -> DbResult<Option<Product>> {
        let rows: Vec<Product> = self
            .catalog
            .fetch_all_adaptive(conn, "find_product", |caps| {
                Some(select_by_id(caps, id, store_id, false))
            })
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Reads a product, failing with `ProductNotFound` when absent.
    pub async fn require(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        store_id: Option<Uuid>,
    ) -> DbResult<Product> {
        self.find(conn, id, store_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(id.to_string()).into())
    }

    /// Locks a product row for the rest of the transaction.
    pub async fn lock(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        store_id: Option<Uuid>,
    ) -> DbResult<Product> {
        let rows: Vec<Product> = self
            .catalog
            .fetch_all_adaptive(conn, "lock_product", |caps| {
                Some(select_by_id(caps, id, store_id, true))
            })
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| CoreError::ProductNotFound(id.to_string()).into())
    }

    /// Case-insensitive SKU lookup within a store.
    pub async fn find_by_sku(
        &self,
        conn: &mut PgConnection,
        sku: &str,
        store_id: Option<Uuid>,
    ) -> DbResult<Option<Product>> {
        let sku = sku.trim().to_string();
        let rows: Vec<Product> = self
            .catalog
            .fetch_all_adaptive(conn, "find_product_by_sku", |caps| {
                let mut qb = QueryBuilder::new("SELECT ");
                qb.push(product_columns(caps));
                qb.push(" FROM products WHERE sku IS NOT NULL AND lower(sku) = lower(");
                qb.push_bind(sku.clone());
                qb.push(") AND ");
                push_store_scope(&mut qb, "store_id", store_id);
                Some(qb)
            })
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Finds the master for a purchase line's SKU, creating it when new.
    ///
    /// Creation needs a name. Concurrent creators of the same SKU converge
    /// on one row.
    pub async fn resolve_by_sku(
        &self,
        conn: &mut PgConnection,
        store_id: Option<Uuid>,
        item: &PurchaseItemInput,
    ) -> DbResult<Product> {
        let sku = item
            .sku
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ValidationError::Required {
                field: "sku".to_string(),
            })?
            .to_string();

        if let Some(found) = self.find_by_sku(&mut *conn, &sku, store_id).await? {
            return Ok(found);
        }

        let name = item
            .name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CoreError::ProductNotFound(format!("sku {}", sku)))?
            .to_string();

        debug!(sku = %sku, store_id = ?store_id, "Creating product master from purchase line");

        let id = Uuid::new_v4();
        let price = item.price.or(item.mrp).unwrap_or(Decimal::ZERO);
        let mrp = item.mrp;
        let unit = item.unit.clone();
        let tax_rate = item.tax_rate.unwrap_or(Decimal::ZERO);

        let rows: Vec<Product> = self
            .catalog
            .fetch_all_adaptive(conn, "resolve_product_by_sku", |caps| {
                let mut qb = QueryBuilder::new(
                    "INSERT INTO products (id, store_id, sku, name, price, mrp, unit, tax_rate, stock) VALUES (",
                );
                let mut values = qb.separated(", ");
                values.push_bind(id);
                values.push_bind(store_id);
                values.push_bind(sku.clone());
                values.push_bind(name.clone());
                values.push_bind(price);
                values.push_bind(mrp);
                values.push_bind(unit.clone());
                values.push_bind(tax_rate);
                values.push_bind(Decimal::ZERO);
                qb.push(
                    ") ON CONFLICT (store_id, lower(sku)) WHERE sku IS NOT NULL \
                     DO UPDATE SET sku = products.sku RETURNING ",
                );
                qb.push(product_columns(caps));
                Some(qb)
            })
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| CoreError::ProductNotFound(format!("sku {}", sku)).into())
    }

    /// Inserts a product master row.
    ///
    /// Opening stock is the caller's concern; the master is created with
    /// `stock` as given.
    pub async fn insert(
        &self,
        conn: &mut PgConnection,
        new: &NewProduct,
        stock: Decimal,
    ) -> DbResult<Product> {
        if new.is_repacking && !self.catalog.supports(columns::PRODUCTS_IS_REPACKING) {
            return Err(ValidationError::InvalidFormat {
                field: "is_repacking".to_string(),
                reason: "repacking products are not supported by this database".to_string(),
            }
            .into());
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        let new = new.clone();
        debug!(id = %id, name = %new.name, "Inserting product");

        let rows: Vec<Product> = self
            .catalog
            .fetch_all_adaptive(conn, "insert_product", |caps| {
                let repacking = caps.supports(columns::PRODUCTS_IS_REPACKING);
                let mut qb = QueryBuilder::new(
                    "INSERT INTO products (id, store_id, sku, name, price, mrp, unit, tax_rate, stock, created_at, updated_at",
                );
                if repacking {
                    qb.push(", is_repacking");
                }
                qb.push(") VALUES (");
                let mut values = qb.separated(", ");
                values.push_bind(id);
                values.push_bind(new.store_id);
                values.push_bind(new.sku.as_ref().map(|s| s.trim().to_string()));
                values.push_bind(new.name.trim().to_string());
                values.push_bind(new.price);
                values.push_bind(new.mrp);
                values.push_bind(new.unit.clone());
                values.push_bind(new.tax_rate);
                values.push_bind(stock);
                values.push_bind(now);
                values.push_bind(now);
                if repacking {
                    values.push_bind(new.is_repacking);
                }
                qb.push(") RETURNING ");
                qb.push(product_columns(caps));
                Some(qb)
            })
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| CoreError::ProductNotFound(id.to_string()).into())
    }

    /// Applies a partial update to a locked master.
    ///
    /// `is_repacking` may go from false to true, never back.
    pub async fn update(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        update: &ProductUpdate,
    ) -> DbResult<Product> {
        let current = self.lock(&mut *conn, id, update.store_id).await?;
        validate_repacking_change(current.is_repacking, update.is_repacking)?;
        let becomes_repacking = !current.is_repacking && update.is_repacking == Some(true);
        if becomes_repacking && !self.catalog.supports(columns::PRODUCTS_IS_REPACKING) {
            return Err(ValidationError::InvalidFormat {
                field: "is_repacking".to_string(),
                reason: "repacking products are not supported by this database".to_string(),
            }
            .into());
        }

        let update = update.clone();
        let rows: Vec<Product> = self
            .catalog
            .fetch_all_adaptive(conn, "update_product", |caps| {
                let mut qb = QueryBuilder::new("UPDATE products SET name = COALESCE(");
                qb.push_bind(update.name.as_ref().map(|n| n.trim().to_string()));
                qb.push(", name), price = COALESCE(");
                qb.push_bind(update.price);
                qb.push(", price), mrp = COALESCE(");
                qb.push_bind(update.mrp);
                qb.push(", mrp), unit = COALESCE(");
                qb.push_bind(update.unit.clone());
                qb.push(", unit), tax_rate = COALESCE(");
                qb.push_bind(update.tax_rate);
                qb.push(", tax_rate), updated_at = NOW()");
                if becomes_repacking && caps.supports(columns::PRODUCTS_IS_REPACKING) {
                    qb.push(", is_repacking = TRUE");
                }
                qb.push(" WHERE id = ");
                qb.push_bind(id);
                qb.push(" RETURNING ");
                qb.push(product_columns(caps));
                Some(qb)
            })
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| CoreError::ProductNotFound(id.to_string()).into())
    }

    /// Moves master stock by `delta`. Returns the new stock.
    pub async fn adjust_stock(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        delta: Decimal,
    ) -> DbResult<Decimal> {
        let stock: Option<Decimal> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock = stock + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING stock
            "#,
        )
        .bind(id)
        .bind(delta)
        .fetch_optional(conn)
        .await?;

        stock.ok_or_else(|| CoreError::ProductNotFound(id.to_string()).into())
    }

    /// Books a purchase line onto a repacking master: stock goes up and the
    /// line's price and MRP, when given, replace the master's.
    pub async fn apply_repack_purchase(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        quantity: Decimal,
        price: Option<Decimal>,
        mrp: Option<Decimal>,
    ) -> DbResult<Decimal> {
        let stock: Option<Decimal> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock = stock + $2,
                price = COALESCE($3, price),
                mrp = COALESCE($4, mrp),
                updated_at = NOW()
            WHERE id = $1
            RETURNING stock
            "#,
        )
        .bind(id)
        .bind(quantity)
        .bind(price)
        .bind(mrp)
        .fetch_optional(conn)
        .await?;

        stock.ok_or_else(|| CoreError::ProductNotFound(id.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_columns_follow_capabilities() {
        let bare = SchemaCapabilities::from_columns(1, [("products", "id")]);
        assert!(!product_columns(&bare).contains("is_repacking"));

        let full = SchemaCapabilities::from_columns(1, [("products", "is_repacking")]);
        assert!(product_columns(&full).ends_with(", is_repacking"));
    }

    #[test]
    fn test_select_by_id_scopes_and_locks() {
        let caps = SchemaCapabilities::empty();
        let sql = select_by_id(&caps, Uuid::new_v4(), None, true).into_sql();
        assert!(sql.contains("store_id IS NOT DISTINCT FROM $2"));
        assert!(sql.ends_with("FOR NO KEY UPDATE"));

        let sql = select_by_id(&caps, Uuid::new_v4(), None, false).into_sql();
        assert!(!sql.contains(" FOR "));
    }
}
