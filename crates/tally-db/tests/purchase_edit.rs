//! Purchase creation and edit reconciliation against a live PostgreSQL.

#![cfg(feature = "pg-tests")]

mod common;

use rust_decimal::Decimal;
use tally_core::{PurchaseItemInput, PurchaseRequest, PurchaseUpdate};
use tally_db::ErrorCode;

use common::{line, purchase_line};

fn stock_by_tier(variants: &[tally_core::ProductVariant]) -> Vec<(Option<Decimal>, Decimal)> {
    variants.iter().map(|v| (v.mrp, v.stock)).collect()
}

#[tokio::test]
async fn test_missing_and_zero_mrp_are_distinct_tiers() {
    let Some(t) = common::setup().await else { return };
    let product = t.product("Candles", Some(15), 0).await;

    let req = PurchaseRequest {
        store_id: Some(t.store_id),
        supplier_id: None,
        total: Decimal::from(100),
        items: vec![
            purchase_line(product.id, 3, None),
            purchase_line(product.id, 4, Some(0)),
            purchase_line(product.id, 2, None),
        ],
    };
    t.engine.create_purchase(req).await.expect("purchase");

    assert_eq!(
        stock_by_tier(&t.variants_of(product.id).await),
        vec![
            (None, Decimal::from(5)),
            (Some(Decimal::ZERO), Decimal::from(4)),
            (Some(Decimal::from(15)), Decimal::ZERO),
        ]
    );

    t.teardown().await;
}

#[tokio::test]
async fn test_purchase_by_sku_creates_master_once() {
    let Some(t) = common::setup().await else { return };
    let new_line = |qty: i64| PurchaseItemInput {
        sku: Some("GRN-101".to_string()),
        name: Some("Green Tea".to_string()),
        quantity: Decimal::from(qty),
        unit_cost: Decimal::from(90),
        price: Some(Decimal::from(110)),
        mrp: Some(Decimal::from(120)),
        ..Default::default()
    };

    for qty in [6, 4] {
        t.engine
            .create_purchase(PurchaseRequest {
                store_id: Some(t.store_id),
                supplier_id: None,
                total: Decimal::from(90 * qty),
                items: vec![new_line(qty)],
            })
            .await
            .expect("purchase");
    }

    let mut conn = t.db.pool().acquire().await.unwrap();
    let product = t
        .db
        .products()
        .find_by_sku(&mut conn, "grn-101", Some(t.store_id))
        .await
        .unwrap()
        .expect("master created");
    drop(conn);
    assert_eq!(product.price, Decimal::from(110));
    assert_eq!(t.count("products").await, 1);
    assert_eq!(
        stock_by_tier(&t.variants_of(product.id).await),
        vec![(Some(Decimal::from(120)), Decimal::from(10))]
    );

    t.teardown().await;
}

#[tokio::test]
async fn test_update_reconciles_quantity_tier_add_and_remove() {
    let Some(t) = common::setup().await else { return };
    let product = t.product("Coffee 200g", Some(50), 0).await;

    let receipt = t
        .engine
        .create_purchase(PurchaseRequest {
            store_id: Some(t.store_id),
            supplier_id: None,
            total: Decimal::from(900),
            items: vec![
                purchase_line(product.id, 10, Some(50)),
                purchase_line(product.id, 5, Some(60)),
            ],
        })
        .await
        .expect("purchase");
    let lines = t.db.purchases().get_items(receipt.purchase_id).await.unwrap();
    assert_eq!(lines.len(), 2);

    // Line 0: 10 -> 7. Line 1: MRP 60 -> 70. New line without MRP.
    let mut first = purchase_line(product.id, 7, Some(50));
    first.line_id = Some(lines[0].id);
    let mut second = purchase_line(product.id, 5, Some(70));
    second.line_id = Some(lines[1].id);
    let added = purchase_line(product.id, 3, None);

    t.engine
        .update_purchase(
            receipt.purchase_id,
            PurchaseUpdate {
                store_id: Some(t.store_id),
                total: Decimal::from(880),
                items: vec![first, second, added],
            },
        )
        .await
        .expect("update");

    assert_eq!(
        stock_by_tier(&t.variants_of(product.id).await),
        vec![
            (None, Decimal::from(3)),
            (Some(Decimal::from(50)), Decimal::from(7)),
            (Some(Decimal::from(60)), Decimal::ZERO),
            (Some(Decimal::from(70)), Decimal::from(5)),
        ]
    );
    let lines = t.db.purchases().get_items(receipt.purchase_id).await.unwrap();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1].mrp, Some(Decimal::from(70)));

    // Keep only the first line.
    let mut only = purchase_line(product.id, 7, Some(50));
    only.line_id = Some(lines[0].id);
    t.engine
        .update_purchase(
            receipt.purchase_id,
            PurchaseUpdate {
                store_id: Some(t.store_id),
                total: Decimal::from(420),
                items: vec![only],
            },
        )
        .await
        .expect("second update");

    assert_eq!(t.total_variant_stock(product.id).await, Decimal::from(7));
    assert_eq!(t.db.purchases().get_items(receipt.purchase_id).await.unwrap().len(), 1);
    let purchase = t.db.purchases().get_by_id(receipt.purchase_id).await.unwrap().unwrap();
    assert_eq!(purchase.total, Decimal::from(420));

    t.teardown().await;
}

#[tokio::test]
async fn test_removing_sold_stock_goes_negative() {
    let Some(t) = common::setup().await else { return };
    let product = t.product("Batteries", Some(40), 0).await;

    let receipt = t
        .engine
        .create_purchase(PurchaseRequest {
            store_id: Some(t.store_id),
            supplier_id: None,
            total: Decimal::from(120),
            items: vec![purchase_line(product.id, 4, Some(40))],
        })
        .await
        .expect("purchase");
    t.engine
        .create_sale(t.sale(vec![line(product.id, 3, 40)]))
        .await
        .expect("sale");

    t.engine
        .update_purchase(
            receipt.purchase_id,
            PurchaseUpdate {
                store_id: Some(t.store_id),
                total: Decimal::ZERO,
                items: vec![],
            },
        )
        .await
        .expect("update");

    assert_eq!(t.total_variant_stock(product.id).await, Decimal::from(-3));

    t.teardown().await;
}

#[tokio::test]
async fn test_repacking_purchase_lands_on_master() {
    let Some(t) = common::setup().await else { return };
    let product = t.repacking_product("Basmati Rice", 20).await;

    let mut item = purchase_line(product.id, 15, None);
    item.price = Some(Decimal::from(95));
    let receipt = t
        .engine
        .create_purchase(PurchaseRequest {
            store_id: Some(t.store_id),
            supplier_id: None,
            total: Decimal::from(900),
            items: vec![item],
        })
        .await
        .expect("purchase");

    assert_eq!(t.master_stock(product.id).await, Decimal::from(35));
    assert!(t.variants_of(product.id).await.is_empty());
    let lines = t.db.purchases().get_items(receipt.purchase_id).await.unwrap();
    assert!(lines[0].variant_id.is_none());

    let mut edited = purchase_line(product.id, 10, None);
    edited.line_id = Some(lines[0].id);
    t.engine
        .update_purchase(
            receipt.purchase_id,
            PurchaseUpdate {
                store_id: Some(t.store_id),
                total: Decimal::from(600),
                items: vec![edited],
            },
        )
        .await
        .expect("update");
    assert_eq!(t.master_stock(product.id).await, Decimal::from(30));

    t.teardown().await;
}

#[tokio::test]
async fn test_repacking_line_moved_to_new_mrp_rewrites_master() {
    let Some(t) = common::setup().await else { return };
    let product = t.repacking_product("Moong Dal", 20).await;

    let mut item = purchase_line(product.id, 10, Some(100));
    item.price = Some(Decimal::from(90));
    let receipt = t
        .engine
        .create_purchase(PurchaseRequest {
            store_id: Some(t.store_id),
            supplier_id: None,
            total: Decimal::from(600),
            items: vec![item],
        })
        .await
        .expect("purchase");
    assert_eq!(t.master_stock(product.id).await, Decimal::from(30));
    let lines = t.db.purchases().get_items(receipt.purchase_id).await.unwrap();

    let mut moved = purchase_line(product.id, 10, Some(120));
    moved.price = Some(Decimal::from(95));
    moved.line_id = Some(lines[0].id);
    t.engine
        .update_purchase(
            receipt.purchase_id,
            PurchaseUpdate {
                store_id: Some(t.store_id),
                total: Decimal::from(600),
                items: vec![moved],
            },
        )
        .await
        .expect("update");

    let master = t
        .db
        .products()
        .get_by_id(product.id, Some(t.store_id))
        .await
        .unwrap()
        .expect("product");
    assert_eq!(master.stock, Decimal::from(30));
    assert_eq!(master.price, Decimal::from(95));
    assert_eq!(master.mrp, Some(Decimal::from(120)));
    assert!(t.variants_of(product.id).await.is_empty());

    let lines = t.db.purchases().get_items(receipt.purchase_id).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].mrp, Some(Decimal::from(120)));
    assert!(lines[0].variant_id.is_none());

    t.teardown().await;
}

#[tokio::test]
async fn test_update_of_unknown_purchase_is_not_found() {
    let Some(t) = common::setup().await else { return };
    let err = t
        .engine
        .update_purchase(
            uuid::Uuid::new_v4(),
            PurchaseUpdate {
                store_id: Some(t.store_id),
                total: Decimal::ZERO,
                items: vec![],
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);

    t.teardown().await;
}
