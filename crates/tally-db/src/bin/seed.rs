//! # Seed Data Generator
//!
//! Populates a development database with a store, a few products and a
//! customer, going through the engine so opening stock lands where the
//! engine expects it.
//!
//! ## Usage
//! ```bash
//! # Uses TALLY_DATABASE_URL
//! cargo run -p tally-db --bin seed
//!
//! # With a config file
//! cargo run -p tally-db --bin seed -- --config ./tally.toml
//! ```
//!
//! ## Generated Data
//! - One store, "Demo Store"
//! - Tiered products with an opening variant each (MRP set or absent)
//! - Loose products sold by weight (repacking, stock on the master)
//! - One walk-in customer

use std::env;
use std::path::PathBuf;

use rust_decimal::Decimal;
use tally_core::NewProduct;
use tally_db::{Database, EngineConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// (sku, name, price, mrp, unit, tax %, opening stock)
const TIERED: &[(&str, &str, i64, Option<i64>, &str, i64, i64)] = &[
    ("BEV-001", "Cola 500ml", 4000, Some(4500), "pcs", 12, 48),
    ("BEV-002", "Mineral Water 1L", 2000, Some(2000), "pcs", 0, 120),
    ("SNK-001", "Salted Chips 50g", 1000, Some(1000), "pcs", 12, 60),
    ("DRY-001", "Toned Milk 500ml", 2700, Some(2800), "pcs", 0, 30),
    ("GRO-001", "Notebook 100pg", 3500, None, "pcs", 18, 25),
];

/// (sku, name, price per kg, opening kg)
const LOOSE: &[(&str, &str, i64, i64)] = &[
    ("LSE-001", "Basmati Rice", 9500, 50),
    ("LSE-002", "Toor Dal", 14000, 25),
    ("LSE-003", "Sugar", 4500, 40),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>  tally.toml to load (default: environment only)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            other => warn!(arg = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let config = EngineConfig::load(config_path.as_deref())?;
    let db = Database::new(config.db_config()).await?;
    info!("Connected and migrated");

    let store_id = Uuid::new_v4();
    sqlx::query("INSERT INTO stores (id, name) VALUES ($1, $2)")
        .bind(store_id)
        .bind("Demo Store")
        .execute(db.pool())
        .await?;
    info!(%store_id, "Store created");

    let engine = db.engine();
    let mut created = 0;

    for (sku, name, price, mrp, unit, tax, stock) in TIERED {
        let product = NewProduct {
            store_id: Some(store_id),
            sku: Some(sku.to_string()),
            name: name.to_string(),
            price: Decimal::new(*price, 2),
            mrp: mrp.map(|m| Decimal::new(m, 2)),
            unit: Some(unit.to_string()),
            tax_rate: Decimal::from(*tax),
            opening_stock: Decimal::from(*stock),
            is_repacking: false,
            barcode: Some(format!("890{:010}", created)),
        };
        match engine.create_product(product).await {
            Ok(p) => {
                info!(sku = %sku, id = %p.id, tier = %p.tier(), "Product created");
                created += 1;
            }
            Err(e) => warn!(sku = %sku, error = %e, "Skipping product"),
        }
    }

    for (sku, name, price, stock) in LOOSE {
        let product = NewProduct {
            store_id: Some(store_id),
            sku: Some(sku.to_string()),
            name: name.to_string(),
            price: Decimal::new(*price, 2),
            mrp: None,
            unit: Some("kg".to_string()),
            tax_rate: Decimal::ZERO,
            opening_stock: Decimal::from(*stock),
            is_repacking: true,
            barcode: None,
        };
        match engine.create_product(product).await {
            Ok(p) => {
                info!(sku = %sku, id = %p.id, stock = %p.stock, "Repacking product created");
                created += 1;
            }
            Err(e) => warn!(sku = %sku, error = %e, "Skipping product"),
        }
    }

    let mut tx = db.pool().begin().await?;
    let customer = db
        .customers()
        .insert(&mut tx, Some(store_id), "Walk-in Regular", Some("9000000000"))
        .await?;
    tx.commit().await?;
    info!(customer_id = %customer.id, "Customer created");

    info!(
        products = created,
        stats = ?engine.transaction_stats(),
        "Seed complete"
    );
    Ok(())
}
