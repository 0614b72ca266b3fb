//! # Purchase Repository
//!
//! Purchases stay editable, so lines remember where their stock went
//! (`variant_id`, `mrp`) where the database has those columns.

use std::sync::Arc;

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use super::{push_store_scope, read_adaptive};
use crate::error::DbResult;
use crate::schema::SchemaCatalog;
use tally_core::schema::columns;
use tally_core::{CoreError, Purchase, PurchaseItem, SchemaCapabilities};

fn purchase_item_columns(caps: &SchemaCapabilities) -> String {
    let mut cols = String::from("id, purchase_id, product_id, quantity, unit_cost, position");
    if caps.supports(columns::PURCHASE_ITEMS_VARIANT_ID) {
        cols.push_str(", variant_id");
    }
    if caps.supports(columns::PURCHASE_ITEMS_MRP) {
        cols.push_str(", mrp");
    }
    cols
}

/// Repository for purchases and their lines.
#[derive(Debug, Clone)]
pub struct PurchaseRepository {
    pool: PgPool,
    catalog: Arc<SchemaCatalog>,
}

impl PurchaseRepository {
    pub fn new(pool: PgPool, catalog: Arc<SchemaCatalog>) -> Self {
        PurchaseRepository { pool, catalog }
    }

    pub async fn get_by_id(&self, id: Uuid) -> DbResult<Option<Purchase>> {
        let purchase = sqlx::query_as::<_, Purchase>(
            r#"
            SELECT id, store_id, supplier_id, total, created_at, updated_at
            FROM purchases
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(purchase)
    }

    /// Lines of a purchase in position order.
    pub async fn get_items(&self, purchase_id: Uuid) -> DbResult<Vec<PurchaseItem>> {
        read_adaptive(&self.pool, &self.catalog, "get_purchase_items", |caps| {
            let mut qb = QueryBuilder::new("SELECT ");
            qb.push(purchase_item_columns(caps));
            qb.push(" FROM purchase_items WHERE purchase_id = ");
            qb.push_bind(purchase_id);
            qb.push(" ORDER BY position");
            Some(qb)
        })
        .await
    }

    pub async fn insert(&self, conn: &mut PgConnection, purchase: &Purchase) -> DbResult<()> {
        debug!(id = %purchase.id, total = %purchase.total, "Inserting purchase");

        sqlx::query(
            r#"
            INSERT INTO purchases (id, store_id, supplier_id, total, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(purchase.id)
        .bind(purchase.store_id)
        .bind(purchase.supplier_id)
        .bind(purchase.total)
        .bind(purchase.created_at)
        .bind(purchase.updated_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Inserts lines in one statement.
    pub async fn insert_items(
        &self,
        conn: &mut PgConnection,
        items: &[PurchaseItem],
    ) -> DbResult<()> {
        if items.is_empty() {
            return Ok(());
        }

        self.catalog
            .execute_adaptive(conn, "insert_purchase_items", |caps| {
                let with_variant = caps.supports(columns::PURCHASE_ITEMS_VARIANT_ID);
                let with_mrp = caps.supports(columns::PURCHASE_ITEMS_MRP);

                let mut qb = QueryBuilder::new(
                    "INSERT INTO purchase_items (id, purchase_id, product_id, quantity, unit_cost, position",
                );
                if with_variant {
                    qb.push(", variant_id");
                }
                if with_mrp {
                    qb.push(", mrp");
                }
                qb.push(") ");
                qb.push_values(items.iter(), |mut row, item| {
                    row.push_bind(item.id)
                        .push_bind(item.purchase_id)
                        .push_bind(item.product_id)
                        .push_bind(item.quantity)
                        .push_bind(item.unit_cost)
                        .push_bind(item.position);
                    if with_variant {
                        row.push_bind(item.variant_id);
                    }
                    if with_mrp {
                        row.push_bind(item.mrp);
                    }
                });
                Some(qb)
            })
            .await?;

        Ok(())
    }

    /// Locks a purchase header, scoped to `store_id`.
    pub async fn lock(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        store_id: Option<Uuid>,
    ) -> DbResult<Purchase> {
        let mut qb = QueryBuilder::new(
            "SELECT id, store_id, supplier_id, total, created_at, updated_at FROM purchases WHERE id = ",
        );
        qb.push_bind(id);
        qb.push(" AND ");
        push_store_scope(&mut qb, "store_id", store_id);
        qb.push(" FOR UPDATE");

        let purchase = qb.build_query_as::<Purchase>().fetch_optional(conn).await?;
        purchase.ok_or_else(|| CoreError::PurchaseNotFound(id.to_string()).into())
    }

    /// Locks every line of a purchase.
    pub async fn lock_items(
        &self,
        conn: &mut PgConnection,
        purchase_id: Uuid,
    ) -> DbResult<Vec<PurchaseItem>> {
        self.catalog
            .fetch_all_adaptive(conn, "lock_purchase_items", |caps| {
                let mut qb = QueryBuilder::new("SELECT ");
                qb.push(purchase_item_columns(caps));
                qb.push(" FROM purchase_items WHERE purchase_id = ");
                qb.push_bind(purchase_id);
                qb.push(" ORDER BY position, id FOR UPDATE");
                Some(qb)
            })
            .await
    }

    /// Rewrites an existing line in place.
    pub async fn update_item(&self, conn: &mut PgConnection, item: &PurchaseItem) -> DbResult<()> {
        let affected = self
            .catalog
            .execute_adaptive(conn, "update_purchase_item", |caps| {
                let mut qb = QueryBuilder::new("UPDATE purchase_items SET product_id = ");
                qb.push_bind(item.product_id);
                qb.push(", quantity = ");
                qb.push_bind(item.quantity);
                qb.push(", unit_cost = ");
                qb.push_bind(item.unit_cost);
                qb.push(", position = ");
                qb.push_bind(item.position);
                if caps.supports(columns::PURCHASE_ITEMS_VARIANT_ID) {
                    qb.push(", variant_id = ");
                    qb.push_bind(item.variant_id);
                }
                if caps.supports(columns::PURCHASE_ITEMS_MRP) {
                    qb.push(", mrp = ");
                    qb.push_bind(item.mrp);
                }
                qb.push(" WHERE id = ");
                qb.push_bind(item.id);
                qb.push(" AND purchase_id = ");
                qb.push_bind(item.purchase_id);
                Some(qb)
            })
            .await?;

        if affected == 0 {
            return Err(CoreError::PurchaseLineNotFound(item.id.to_string()).into());
        }
        Ok(())
    }

    pub async fn delete_item(
        &self,
        conn: &mut PgConnection,
        purchase_id: Uuid,
        line_id: Uuid,
    ) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM purchase_items WHERE id = $1 AND purchase_id = $2")
            .bind(line_id)
            .bind(purchase_id)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::PurchaseLineNotFound(line_id.to_string()).into());
        }
        Ok(())
    }

    pub async fn update_total(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        total: Decimal,
    ) -> DbResult<()> {
        sqlx::query("UPDATE purchases SET total = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(total)
            .execute(conn)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purchase_item_columns_follow_capabilities() {
        let caps = SchemaCapabilities::from_columns(1, [("purchase_items", "mrp")]);
        let cols = purchase_item_columns(&caps);
        assert!(cols.ends_with(", mrp"));
        assert!(!cols.contains("variant_id"));
    }
}
