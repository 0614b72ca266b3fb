//! Product creation and edit rules against a live PostgreSQL.

#![cfg(feature = "pg-tests")]

mod common;

use rust_decimal::Decimal;
use tally_core::{NewProduct, ProductUpdate};
use tally_db::ErrorCode;

use common::line;

#[tokio::test]
async fn test_opening_stock_goes_to_variant_or_master() {
    let Some(t) = common::setup().await else { return };

    let tiered = t.product("Hand Wash", Some(99), 12).await;
    assert_eq!(tiered.stock, Decimal::ZERO);
    let variants = t.variants_of(tiered.id).await;
    assert_eq!(variants.len(), 1);
    assert_eq!(variants[0].mrp, Some(Decimal::from(99)));
    assert_eq!(variants[0].stock, Decimal::from(12));
    assert_eq!(variants[0].store_id, Some(t.store_id));

    let loose = t.repacking_product("Toor Dal", 25).await;
    assert!(loose.is_repacking);
    assert_eq!(loose.stock, Decimal::from(25));
    assert!(t.variants_of(loose.id).await.is_empty());

    t.teardown().await;
}

#[tokio::test]
async fn test_repacking_cannot_be_unset() {
    let Some(t) = common::setup().await else { return };
    let loose = t.repacking_product("Sugar", 40).await;

    let err = t
        .engine
        .update_product(
            loose.id,
            ProductUpdate {
                store_id: Some(t.store_id),
                is_repacking: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationError);

    let unchanged = t
        .engine
        .update_product(
            loose.id,
            ProductUpdate {
                store_id: Some(t.store_id),
                price: Some(Decimal::from(48)),
                ..Default::default()
            },
        )
        .await
        .expect("price update");
    assert!(unchanged.is_repacking);
    assert_eq!(unchanged.price, Decimal::from(48));

    t.teardown().await;
}

#[tokio::test]
async fn test_product_can_become_repacking() {
    let Some(t) = common::setup().await else { return };
    let product = t.product("Peanuts", None, 0).await;
    assert!(!product.is_repacking);

    let updated = t
        .engine
        .update_product(
            product.id,
            ProductUpdate {
                store_id: Some(t.store_id),
                is_repacking: Some(true),
                ..Default::default()
            },
        )
        .await
        .expect("becomes repacking");
    assert!(updated.is_repacking);

    sqlx::query("UPDATE products SET stock = 5 WHERE id = $1")
        .bind(product.id)
        .execute(t.db.pool())
        .await
        .unwrap();
    t.engine
        .create_sale(t.sale(vec![line(product.id, 2, 90)]))
        .await
        .expect("sale from master");
    assert_eq!(t.master_stock(product.id).await, Decimal::from(3));

    t.teardown().await;
}

#[tokio::test]
async fn test_duplicate_sku_in_store_is_rejected() {
    let Some(t) = common::setup().await else { return };
    let new = |sku: &str| NewProduct {
        store_id: Some(t.store_id),
        sku: Some(sku.to_string()),
        name: "Matches".to_string(),
        price: Decimal::from(2),
        mrp: Some(Decimal::from(2)),
        unit: None,
        tax_rate: Decimal::ZERO,
        opening_stock: Decimal::ZERO,
        is_repacking: false,
        barcode: None,
    };

    t.engine.create_product(new("MAT-1")).await.expect("first");
    let err = t.engine.create_product(new("mat-1")).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationError);

    t.teardown().await;
}

#[tokio::test]
async fn test_update_scoped_to_store() {
    let Some(t) = common::setup().await else { return };
    let product = t.product("Soda", Some(20), 0).await;
    let other = t.other_store().await;

    let err = t
        .engine
        .update_product(
            product.id,
            ProductUpdate {
                store_id: Some(other),
                name: Some("Renamed".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);

    t.teardown().await;
}
