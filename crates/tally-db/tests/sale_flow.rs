//! Sale composition against a live PostgreSQL: tier order, atomicity,
//! loyalty and store scoping.

#![cfg(feature = "pg-tests")]

mod common;

use rust_decimal::Decimal;
use tally_core::{PaymentBreakdown, PurchaseRequest};
use tally_db::ErrorCode;

use common::{line, purchase_line};

#[tokio::test]
async fn test_auto_sale_draws_lowest_tier_first() {
    let Some(t) = common::setup().await else { return };
    let product = t.product("Rice 1kg", None, 2).await;
    t.engine
        .create_purchase(PurchaseRequest {
            store_id: Some(t.store_id),
            supplier_id: None,
            total: Decimal::from(900),
            items: vec![
                purchase_line(product.id, 4, Some(40)),
                purchase_line(product.id, 9, Some(30)),
            ],
        })
        .await
        .expect("purchase");

    t.engine
        .create_sale(t.sale(vec![line(product.id, 5, 35)]))
        .await
        .expect("sale");

    let variants = t.variants_of(product.id).await;
    let stock: Vec<(Option<Decimal>, Decimal)> =
        variants.iter().map(|v| (v.mrp, v.stock)).collect();
    assert_eq!(
        stock,
        vec![
            (None, Decimal::ZERO),
            (Some(Decimal::from(30)), Decimal::from(6)),
            (Some(Decimal::from(40)), Decimal::from(4)),
        ]
    );

    t.teardown().await;
}

#[tokio::test]
async fn test_designated_variant_and_master_draws() {
    let Some(t) = common::setup().await else { return };
    let product = t.product("Soap", Some(25), 5).await;
    let variant = t.variants_of(product.id).await.remove(0);
    sqlx::query("UPDATE products SET stock = 3 WHERE id = $1")
        .bind(product.id)
        .execute(t.db.pool())
        .await
        .unwrap();

    let mut from_variant = line(product.id, 2, 25);
    from_variant.variant_id = Some(variant.id);
    let mut from_master = line(product.id, 1, 25);
    from_master.use_master_stock = true;

    t.engine
        .create_sale(t.sale(vec![from_variant, from_master]))
        .await
        .expect("sale");

    assert_eq!(t.total_variant_stock(product.id).await, Decimal::from(3));
    assert_eq!(t.master_stock(product.id).await, Decimal::from(2));

    t.teardown().await;
}

#[tokio::test]
async fn test_failed_line_rolls_back_whole_sale() {
    let Some(t) = common::setup().await else { return };
    let plenty = t.product("Sugar 1kg", Some(50), 10).await;
    let scarce = t.product("Saffron 1g", Some(300), 1).await;

    let err = t
        .engine
        .create_sale(t.sale(vec![line(plenty.id, 4, 48), line(scarce.id, 2, 290)]))
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::InsufficientStock);
    assert!(err.message.contains("Saffron 1g"));
    assert_eq!(t.total_variant_stock(plenty.id).await, Decimal::from(10));
    assert_eq!(t.total_variant_stock(scarce.id).await, Decimal::ONE);
    assert_eq!(t.count("sales").await, 0);
    assert_eq!(t.count("sale_items").await, 0);

    t.teardown().await;
}

#[tokio::test]
async fn test_product_from_another_store_is_invalid_item() {
    let Some(t) = common::setup().await else { return };
    let product = t.product("Tea 250g", Some(120), 10).await;
    let other = t.other_store().await;

    let mut req = t.sale(vec![line(product.id, 1, 120)]);
    req.store_id = Some(other);
    let err = t.engine.create_sale(req).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::InvalidItem);
    assert_eq!(t.total_variant_stock(product.id).await, Decimal::from(10));

    t.teardown().await;
}

#[tokio::test]
async fn test_quantity_below_stock_precision_is_refused() {
    let Some(t) = common::setup().await else { return };
    let product = t.product("Cardamom", Some(40), 10).await;

    let mut tiny = line(product.id, 1, 40);
    tiny.quantity = "0.0004".parse().unwrap();
    let err = t.engine.create_sale(t.sale(vec![tiny])).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::InvalidItem);
    assert_eq!(t.total_variant_stock(product.id).await, Decimal::from(10));
    assert_eq!(t.count("sales").await, 0);

    t.teardown().await;
}

#[tokio::test]
async fn test_free_text_line_is_billed_without_stock() {
    let Some(t) = common::setup().await else { return };
    let mut carry_bag = line(uuid::Uuid::nil(), 1, 5);
    carry_bag.product_id = None;
    carry_bag.name = Some("Carry bag".to_string());

    let receipt = t.engine.create_sale(t.sale(vec![carry_bag])).await.expect("sale");

    assert_eq!(receipt.grand_total, Decimal::from(5));
    let items = t.db.sales().get_items(receipt.sale_id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "Carry bag");
    assert!(items[0].product_id.is_none());

    t.teardown().await;
}

#[tokio::test]
async fn test_loyalty_award_thresholds() {
    let Some(t) = common::setup().await else { return };
    let product = t.product("Detergent", Some(100), 10).await;
    let customer = t.customer(0).await;

    let mut req = t.sale(vec![line(product.id, 1, 100)]);
    req.customer_id = Some(customer.id);
    let receipt = t.engine.create_sale(req).await.expect("sale at 100");
    assert_eq!(receipt.loyalty_awarded, 1);
    assert_eq!(t.loyalty_of(customer.id).await, 1);

    let mut req = t.sale(vec![line(product.id, 1, 99)]);
    req.customer_id = Some(customer.id);
    let receipt = t.engine.create_sale(req).await.expect("sale at 99");
    assert_eq!(receipt.loyalty_awarded, 0);
    assert_eq!(t.loyalty_of(customer.id).await, 1);

    t.teardown().await;
}

#[tokio::test]
async fn test_walk_in_sale_reports_awarded_points() {
    let Some(t) = common::setup().await else { return };
    let product = t.product("Tissue Box", Some(100), 5).await;

    let receipt = t
        .engine
        .create_sale(t.sale(vec![line(product.id, 1, 100)]))
        .await
        .expect("sale");

    assert_eq!(receipt.grand_total, Decimal::from(100));
    assert_eq!(receipt.loyalty_awarded, 1);
    assert_eq!(receipt.loyalty_used, 0);
    let sale = t.db.sales().get_by_id(receipt.sale_id).await.unwrap().unwrap();
    let metadata = sale.parsed_metadata().expect("metadata");
    assert_eq!(metadata.loyalty.awarded, 1);
    assert_eq!(metadata.loyalty.spent, 0);

    t.teardown().await;
}

#[tokio::test]
async fn test_loyalty_spend_is_clamped_to_balance() {
    let Some(t) = common::setup().await else { return };
    let product = t.product("Shampoo", Some(200), 10).await;
    let customer = t.customer(5).await;

    let mut req = t.sale(vec![line(product.id, 1, 100)]);
    req.customer_id = Some(customer.id);
    req.payment = Some(PaymentBreakdown {
        cash: Decimal::from(95),
        points: Some(Decimal::from(10)),
        ..Default::default()
    });
    let receipt = t.engine.create_sale(req).await.expect("sale");

    assert_eq!(receipt.loyalty_used, 5);
    assert_eq!(receipt.loyalty_awarded, 1);
    assert_eq!(t.loyalty_of(customer.id).await, 1);

    let sale = t.db.sales().get_by_id(receipt.sale_id).await.unwrap().unwrap();
    let metadata = sale.parsed_metadata().expect("metadata");
    assert_eq!(metadata.loyalty.requested, 10);
    assert_eq!(metadata.loyalty.spent, 5);
    assert_eq!(metadata.loyalty.awarded, 1);

    t.teardown().await;
}

#[tokio::test]
async fn test_credit_is_added_to_customer() {
    let Some(t) = common::setup().await else { return };
    let product = t.product("Oil 1L", Some(180), 10).await;
    let customer = t.customer(0).await;

    let mut req = t.sale(vec![line(product.id, 1, 150)]);
    req.customer_id = Some(customer.id);
    req.payment = Some(PaymentBreakdown {
        cash: Decimal::from(100),
        credit: Decimal::from(50),
        ..Default::default()
    });
    t.engine.create_sale(req).await.expect("sale");

    let customer = t.db.customers().get_by_id(customer.id).await.unwrap().unwrap();
    assert_eq!(customer.credit_due, Decimal::from(50));

    t.teardown().await;
}

#[tokio::test]
async fn test_unknown_customer_is_invalid_item() {
    let Some(t) = common::setup().await else { return };
    let product = t.product("Biscuits", Some(30), 10).await;

    let mut req = t.sale(vec![line(product.id, 1, 30)]);
    req.customer_id = Some(uuid::Uuid::new_v4());
    let err = t.engine.create_sale(req).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::InvalidItem);
    assert_eq!(t.total_variant_stock(product.id).await, Decimal::from(10));

    t.teardown().await;
}
