//! # Sale Repository
//!
//! Sales are written once, inside the sale transaction, and never edited.
//!
//! ## Snapshot Pattern
//! Line name, unit price and tax rate are copied onto each sale item, so
//! the sale reads the same after the product changes.

use std::sync::Arc;

use sqlx::{PgConnection, PgPool, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use super::read_adaptive;
use crate::error::DbResult;
use crate::schema::SchemaCatalog;
use tally_core::schema::columns;
use tally_core::{Sale, SaleItem, SchemaCapabilities};

fn sale_columns(caps: &SchemaCapabilities) -> String {
    let mut cols = String::from(
        "id, customer_id, subtotal, tax_total, grand_total, payment_method, metadata, created_at",
    );
    if caps.supports(columns::SALES_STORE_ID) {
        cols.push_str(", store_id");
    }
    cols
}

fn sale_item_columns(caps: &SchemaCapabilities) -> String {
    let mut cols = String::from(
        "id, sale_id, product_id, name, quantity, unit_price, tax_rate, line_total, position",
    );
    if caps.supports(columns::SALE_ITEMS_STORE_ID) {
        cols.push_str(", store_id");
    }
    if caps.supports(columns::SALE_ITEMS_VARIANT_ID) {
        cols.push_str(", variant_id");
    }
    cols
}

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: PgPool,
    catalog: Arc<SchemaCatalog>,
}

impl SaleRepository {
    pub fn new(pool: PgPool, catalog: Arc<SchemaCatalog>) -> Self {
        SaleRepository { pool, catalog }
    }

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: Uuid) -> DbResult<Option<Sale>> {
        let rows: Vec<Sale> = read_adaptive(&self.pool, &self.catalog, "get_sale", |caps| {
            let mut qb = QueryBuilder::new("SELECT ");
            qb.push(sale_columns(caps));
            qb.push(" FROM sales WHERE id = ");
            qb.push_bind(id);
            Some(qb)
        })
        .await?;
        Ok(rows.into_iter().next())
    }

    /// Gets all lines of a sale in position order.
    pub async fn get_items(&self, sale_id: Uuid) -> DbResult<Vec<SaleItem>> {
        read_adaptive(&self.pool, &self.catalog, "get_sale_items", |caps| {
            let mut qb = QueryBuilder::new("SELECT ");
            qb.push(sale_item_columns(caps));
            qb.push(" FROM sale_items WHERE sale_id = ");
            qb.push_bind(sale_id);
            qb.push(" ORDER BY position");
            Some(qb)
        })
        .await
    }

    /// Inserts the sale header. `store_id` is written only where the
    /// column exists.
    pub async fn insert_sale(&self, conn: &mut PgConnection, sale: &Sale) -> DbResult<()> {
        debug!(id = %sale.id, grand_total = %sale.grand_total, "Inserting sale");

        self.catalog
            .execute_adaptive(conn, "insert_sale", |caps| {
                let with_store = caps.supports(columns::SALES_STORE_ID);
                let mut qb = QueryBuilder::new(
                    "INSERT INTO sales (id, customer_id, subtotal, tax_total, grand_total, payment_method, metadata, created_at",
                );
                if with_store {
                    qb.push(", store_id");
                }
                qb.push(") VALUES (");
                let mut values = qb.separated(", ");
                values.push_bind(sale.id);
                values.push_bind(sale.customer_id);
                values.push_bind(sale.subtotal);
                values.push_bind(sale.tax_total);
                values.push_bind(sale.grand_total);
                values.push_bind(sale.payment_method.as_str());
                values.push_bind(sale.metadata.clone());
                values.push_bind(sale.created_at);
                if with_store {
                    values.push_bind(sale.store_id);
                }
                qb.push(")");
                Some(qb)
            })
            .await?;

        Ok(())
    }

    /// Inserts all sale lines in one statement.
    pub async fn insert_items(&self, conn: &mut PgConnection, items: &[SaleItem]) -> DbResult<()> {
        if items.is_empty() {
            return Ok(());
        }
        debug!(sale_id = %items[0].sale_id, count = items.len(), "Inserting sale items");

        self.catalog
            .execute_adaptive(conn, "insert_sale_items", |caps| {
                let with_store = caps.supports(columns::SALE_ITEMS_STORE_ID);
                let with_variant = caps.supports(columns::SALE_ITEMS_VARIANT_ID);

                let mut qb = QueryBuilder::new(
                    "INSERT INTO sale_items (id, sale_id, product_id, name, quantity, unit_price, tax_rate, line_total, position",
                );
                if with_store {
                    qb.push(", store_id");
                }
                if with_variant {
                    qb.push(", variant_id");
                }
                qb.push(") ");
                qb.push_values(items.iter(), |mut row, item| {
                    row.push_bind(item.id)
                        .push_bind(item.sale_id)
                        .push_bind(item.product_id)
                        .push_bind(item.name.clone())
                        .push_bind(item.quantity)
                        .push_bind(item.unit_price)
                        .push_bind(item.tax_rate)
                        .push_bind(item.line_total)
                        .push_bind(item.position);
                    if with_store {
                        row.push_bind(item.store_id);
                    }
                    if with_variant {
                        row.push_bind(item.variant_id);
                    }
                });
                Some(qb)
            })
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sale_item_columns_follow_capabilities() {
        let bare = SchemaCapabilities::from_columns(1, [("sale_items", "id")]);
        let cols = sale_item_columns(&bare);
        assert!(!cols.contains("store_id"));
        assert!(!cols.contains("variant_id"));

        let full = SchemaCapabilities::from_columns(
            1,
            [("sale_items", "store_id"), ("sale_items", "variant_id")],
        );
        assert!(sale_item_columns(&full).ends_with("position, store_id, variant_id"));
    }

    #[test]
    fn test_sale_columns() {
        let caps = SchemaCapabilities::from_columns(1, [("sales", "store_id")]);
        assert!(sale_columns(&caps).contains("store_id"));
        assert!(!sale_columns(&SchemaCapabilities::empty()).contains("store_id"));
    }
}
