//! # Variant Repository
//!
//! One stock row per `(product_id, mrp)`. A `NULL` MRP is its own tier.
//!
//! ## Upsert
//! ```text
//! INSERT INTO product_variants (...) VALUES (...)
//! ON CONFLICT (product_id, mrp) DO UPDATE
//!   SET stock = product_variants.stock + EXCLUDED.stock,
//!       price = COALESCE(product_variants.price, EXCLUDED.price), ...
//! RETURNING ...
//! ```
//! The constraint is `UNIQUE NULLS NOT DISTINCT`, so two purchases of the
//! same product without an MRP meet on the same row. A concurrent inserter
//! blocks on the first one's commit and then takes the update branch.

use std::sync::Arc;

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use super::read_adaptive;
use crate::error::DbResult;
use crate::schema::SchemaCatalog;
use tally_core::schema::columns;
use tally_core::types::PriceTier;
use tally_core::{CoreError, ProductVariant, SchemaCapabilities};

/// Stock to put into a product's tier, creating the variant if needed.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantUpsert {
    pub product_id: Uuid,
    pub store_id: Option<Uuid>,
    pub tier: PriceTier,
    /// Used only when the row is created (or had no price).
    pub price: Option<Decimal>,
    pub unit: Option<String>,
    pub tax_rate: Option<Decimal>,
    pub barcode: Option<String>,
    pub stock_delta: Decimal,
}

pub(crate) fn variant_columns(caps: &SchemaCapabilities) -> String {
    let mut cols =
        String::from("id, product_id, mrp, price, unit, tax_rate, stock, created_at, updated_at");
    if caps.supports(columns::VARIANTS_STORE_ID) {
        cols.push_str(", store_id");
    }
    if caps.supports(columns::VARIANTS_BARCODE) {
        cols.push_str(", barcode");
    }
    cols
}

fn upsert_query(
    caps: &SchemaCapabilities,
    id: Uuid,
    v: &VariantUpsert,
) -> QueryBuilder<'static, Postgres> {
    let with_store = caps.supports(columns::VARIANTS_STORE_ID);
    let with_barcode = caps.supports(columns::VARIANTS_BARCODE);

    let mut qb = QueryBuilder::new(
        "INSERT INTO product_variants (id, product_id, mrp, price, unit, tax_rate, stock",
    );
    if with_store {
        qb.push(", store_id");
    }
    if with_barcode {
        qb.push(", barcode");
    }
    qb.push(") VALUES (");
    let mut values = qb.separated(", ");
    values.push_bind(id);
    values.push_bind(v.product_id);
    values.push_bind(v.tier.mrp());
    values.push_bind(v.price);
    values.push_bind(v.unit.clone());
    values.push_bind(v.tax_rate);
    values.push_bind(v.stock_delta);
    if with_store {
        values.push_bind(v.store_id);
    }
    if with_barcode {
        values.push_bind(v.barcode.clone());
    }
    qb.push(
        ") ON CONFLICT (product_id, mrp) DO UPDATE SET \
         stock = product_variants.stock + EXCLUDED.stock, \
         price = COALESCE(product_variants.price, EXCLUDED.price), \
         unit = COALESCE(product_variants.unit, EXCLUDED.unit), \
         tax_rate = COALESCE(product_variants.tax_rate, EXCLUDED.tax_rate), ",
    );
    if with_barcode {
        qb.push("barcode = COALESCE(product_variants.barcode, EXCLUDED.barcode), ");
    }
    qb.push("updated_at = NOW() RETURNING ");
    qb.push(variant_columns(caps));
    qb
}

/// Repository for product variants.
#[derive(Debug, Clone)]
pub struct VariantRepository {
    pool: PgPool,
    catalog: Arc<SchemaCatalog>,
}

impl VariantRepository {
    pub fn new(pool: PgPool, catalog: Arc<SchemaCatalog>) -> Self {
        VariantRepository { pool, catalog }
    }

    /// All variants of a product, lowest tier first.
    pub async fn list_for_product(&self, product_id: Uuid) -> DbResult<Vec<ProductVariant>> {
        read_adaptive(&self.pool, &self.catalog, "list_variants", |caps| {
            let mut qb = QueryBuilder::new("SELECT ");
            qb.push(variant_columns(caps));
            qb.push(" FROM product_variants WHERE product_id = ");
            qb.push_bind(product_id);
            qb.push(" ORDER BY mrp ASC NULLS FIRST, id");
            Some(qb)
        })
        .await
    }

    /// Adds stock to the product's tier, creating the variant on first use.
    pub async fn upsert(
        &self,
        conn: &mut PgConnection,
        v: &VariantUpsert,
    ) -> DbResult<ProductVariant> {
        let id = Uuid::new_v4();
        debug!(
            product_id = %v.product_id,
            tier = %v.tier,
            delta = %v.stock_delta,
            "Upserting variant"
        );

        let rows: Vec<ProductVariant> = self
            .catalog
            .fetch_all_adaptive(conn, "upsert_variant", |caps| Some(upsert_query(caps, id, v)))
            .await?;

        rows.into_iter().next().ok_or_else(|| {
            CoreError::VariantNotFound(format!("{} @ {}", v.product_id, v.tier)).into()
        })
    }

    /// Locks every variant of a product in tier order.
    pub async fn lock_for_product(
        &self,
        conn: &mut PgConnection,
        product_id: Uuid,
    ) -> DbResult<Vec<ProductVariant>> {
        self.catalog
            .fetch_all_adaptive(conn, "lock_variants", |caps| {
                let mut qb = QueryBuilder::new("SELECT ");
                qb.push(variant_columns(caps));
                qb.push(" FROM product_variants WHERE product_id = ");
                qb.push_bind(product_id);
                qb.push(" ORDER BY mrp ASC NULLS FIRST, id FOR UPDATE");
                Some(qb)
            })
            .await
    }

    /// Locks one variant, which must belong to `product_id`.
    pub async fn lock_one(
        &self,
        conn: &mut PgConnection,
        variant_id: Uuid,
        product_id: Uuid,
    ) -> DbResult<ProductVariant> {
        let rows: Vec<ProductVariant> = self
            .catalog
            .fetch_all_adaptive(conn, "lock_variant", |caps| {
                let mut qb = QueryBuilder::new("SELECT ");
                qb.push(variant_columns(caps));
                qb.push(" FROM product_variants WHERE id = ");
                qb.push_bind(variant_id);
                qb.push(" AND product_id = ");
                qb.push_bind(product_id);
                qb.push(" FOR UPDATE");
                Some(qb)
            })
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| CoreError::VariantNotFound(variant_id.to_string()).into())
    }

    /// Reads one variant by ID.
    pub async fn find(
        &self,
        conn: &mut PgConnection,
        variant_id: Uuid,
    ) -> DbResult<Option<ProductVariant>> {
        let rows: Vec<ProductVariant> = self
            .catalog
            .fetch_all_adaptive(conn, "find_variant", |caps| {
                let mut qb = QueryBuilder::new("SELECT ");
                qb.push(variant_columns(caps));
                qb.push(" FROM product_variants WHERE id = ");
                qb.push_bind(variant_id);
                Some(qb)
            })
            .await?;
        Ok(rows.into_iter().next())
    }

    /// The variant holding a product's tier, if one exists.
    pub async fn find_for_tier(
        &self,
        conn: &mut PgConnection,
        product_id: Uuid,
        tier: PriceTier,
    ) -> DbResult<Option<ProductVariant>> {
        let rows: Vec<ProductVariant> = self
            .catalog
            .fetch_all_adaptive(conn, "find_variant_for_tier", |caps| {
                let mut qb = QueryBuilder::new("SELECT ");
                qb.push(variant_columns(caps));
                qb.push(" FROM product_variants WHERE product_id = ");
                qb.push_bind(product_id);
                qb.push(" AND mrp IS NOT DISTINCT FROM ");
                qb.push_bind(tier.mrp());
                qb.push(" FOR UPDATE");
                Some(qb)
            })
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Moves a variant's stock by `delta`. Returns the new stock.
    pub async fn adjust_stock(
        &self,
        conn: &mut PgConnection,
        variant_id: Uuid,
        delta: Decimal,
    ) -> DbResult<Decimal> {
        let stock: Option<Decimal> = sqlx::query_scalar(
            r#"
            UPDATE product_variants
            SET stock = stock + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING stock
            "#,
        )
        .bind(variant_id)
        .bind(delta)
        .fetch_optional(conn)
        .await?;

        stock.ok_or_else(|| CoreError::VariantNotFound(variant_id.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upsert(tier: PriceTier) -> VariantUpsert {
        VariantUpsert {
            product_id: Uuid::new_v4(),
            store_id: None,
            tier,
            price: Some(Decimal::TEN),
            unit: None,
            tax_rate: None,
            barcode: None,
            stock_delta: Decimal::ONE,
        }
    }

    #[test]
    fn test_upsert_targets_tier_constraint() {
        let caps = SchemaCapabilities::empty();
        let sql = upsert_query(&caps, Uuid::new_v4(), &upsert(PriceTier::NONE)).into_sql();
        assert!(sql.contains("ON CONFLICT (product_id, mrp) DO UPDATE"));
        assert!(sql.contains("stock = product_variants.stock + EXCLUDED.stock"));
        assert!(!sql.contains("store_id"));
        assert!(!sql.contains("barcode"));
    }

    #[test]
    fn test_upsert_writes_optional_columns_when_present() {
        let caps = SchemaCapabilities::from_columns(
            2,
            [("product_variants", "store_id"), ("product_variants", "barcode")],
        );
        let tiered = upsert(PriceTier::stated(Decimal::TEN));
        let sql = upsert_query(&caps, Uuid::new_v4(), &tiered).into_sql();
        assert!(sql.contains("stock, store_id, barcode) VALUES"));
        assert!(sql.contains("barcode = COALESCE(product_variants.barcode, EXCLUDED.barcode)"));
        assert!(sql.ends_with("store_id, barcode"));
    }
}
