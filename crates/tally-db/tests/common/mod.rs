//! Shared setup for the PostgreSQL integration tests.
//!
//! Each test gets its own schema in the database named by
//! `TALLY_TEST_DATABASE_URL`, migrated from scratch. Tests return early
//! when the variable is unset.

#![allow(dead_code)]

use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use tally_core::{
    Customer, NewProduct, PaymentMethod, Product, ProductVariant, PurchaseItemInput, SaleItemInput,
    SaleRequest,
};
use tally_db::{Database, DbConfig, InventoryEngine};
use uuid::Uuid;

pub const DATABASE_URL_VAR: &str = "TALLY_TEST_DATABASE_URL";

pub struct TestDb {
    pub db: Database,
    pub engine: InventoryEngine,
    pub store_id: Uuid,
    schema: String,
    admin: PgPool,
}

/// Connects to a fresh schema, or `None` when no test database is configured.
pub async fn setup() -> Option<TestDb> {
    let url = match std::env::var(DATABASE_URL_VAR) {
        Ok(url) => url,
        Err(_) => {
            eprintln!("{} not set; skipping", DATABASE_URL_VAR);
            return None;
        }
    };

    let admin = PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("connect admin pool");

    let schema = format!("tally_test_{}", Uuid::new_v4().simple());
    sqlx::query(&format!("CREATE SCHEMA {}", schema))
        .execute(&admin)
        .await
        .expect("create schema");

    let options = PgConnectOptions::from_str(&url)
        .expect("parse url")
        .options([("search_path", schema.as_str())]);
    let pool = PgPoolOptions::new()
        .max_connections(16)
        .connect_with(options)
        .await
        .expect("connect test pool");

    let config = DbConfig::new(url).run_migrations(true);
    let db = Database::from_pool(pool, &config).await.expect("init database");

    let store_id = Uuid::new_v4();
    sqlx::query("INSERT INTO stores (id, name) VALUES ($1, 'Test Store')")
        .bind(store_id)
        .execute(db.pool())
        .await
        .expect("insert store");

    Some(TestDb {
        engine: db.engine(),
        db,
        store_id,
        schema,
        admin,
    })
}

impl TestDb {
    pub async fn teardown(self) {
        self.db.close().await;
        sqlx::query(&format!("DROP SCHEMA {} CASCADE", self.schema))
            .execute(&self.admin)
            .await
            .expect("drop schema");
    }

    /// A second store, for scoping tests.
    pub async fn other_store(&self) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO stores (id, name) VALUES ($1, 'Other Store')")
            .bind(id)
            .execute(self.db.pool())
            .await
            .expect("insert store");
        id
    }

    pub async fn product(&self, name: &str, mrp: Option<i64>, stock: i64) -> Product {
        self.engine
            .create_product(NewProduct {
                store_id: Some(self.store_id),
                sku: None,
                name: name.to_string(),
                price: Decimal::from(100),
                mrp: mrp.map(Decimal::from),
                unit: Some("pcs".to_string()),
                tax_rate: Decimal::ZERO,
                opening_stock: Decimal::from(stock),
                is_repacking: false,
                barcode: None,
            })
            .await
            .expect("create product")
    }

    pub async fn repacking_product(&self, name: &str, stock: i64) -> Product {
        self.engine
            .create_product(NewProduct {
                store_id: Some(self.store_id),
                sku: None,
                name: name.to_string(),
                price: Decimal::from(80),
                mrp: None,
                unit: Some("kg".to_string()),
                tax_rate: Decimal::ZERO,
                opening_stock: Decimal::from(stock),
                is_repacking: true,
                barcode: None,
            })
            .await
            .expect("create repacking product")
    }

    pub async fn customer(&self, loyalty_points: i64) -> Customer {
        let mut tx = self.db.pool().begin().await.expect("begin");
        let customer = self
            .db
            .customers()
            .insert(&mut tx, Some(self.store_id), "Regular", None)
            .await
            .expect("insert customer");
        tx.commit().await.expect("commit");

        sqlx::query("UPDATE customers SET loyalty_points = $1 WHERE id = $2")
            .bind(loyalty_points)
            .bind(customer.id)
            .execute(self.db.pool())
            .await
            .expect("set loyalty");
        customer
    }

    pub async fn loyalty_of(&self, customer_id: Uuid) -> i64 {
        sqlx::query_scalar("SELECT loyalty_points FROM customers WHERE id = $1")
            .bind(customer_id)
            .fetch_one(self.db.pool())
            .await
            .expect("read loyalty")
    }

    pub async fn variants_of(&self, product_id: Uuid) -> Vec<ProductVariant> {
        self.db
            .variants()
            .list_for_product(product_id)
            .await
            .expect("list variants")
    }

    pub async fn master_stock(&self, product_id: Uuid) -> Decimal {
        self.db
            .products()
            .get_by_id(product_id, Some(self.store_id))
            .await
            .expect("get product")
            .expect("product exists")
            .stock
    }

    pub async fn total_variant_stock(&self, product_id: Uuid) -> Decimal {
        self.variants_of(product_id).await.iter().map(|v| v.stock).sum()
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(self.db.pool())
            .await
            .expect("count rows")
    }

    pub fn sale(&self, items: Vec<SaleItemInput>) -> SaleRequest {
        SaleRequest {
            store_id: Some(self.store_id),
            items,
            payment_method: PaymentMethod::Cash,
            customer_id: None,
            payment: None,
        }
    }
}

pub fn line(product_id: Uuid, quantity: i64, unit_price: i64) -> SaleItemInput {
    SaleItemInput {
        product_id: Some(product_id),
        variant_id: None,
        use_master_stock: false,
        name: None,
        quantity: Decimal::from(quantity),
        unit_price: Decimal::from(unit_price),
        tax_rate: None,
    }
}

pub fn purchase_line(product_id: Uuid, quantity: i64, mrp: Option<i64>) -> PurchaseItemInput {
    PurchaseItemInput {
        product_id: Some(product_id),
        quantity: Decimal::from(quantity),
        unit_cost: Decimal::from(60),
        mrp: mrp.map(Decimal::from),
        ..Default::default()
    }
}
