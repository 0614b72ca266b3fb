//! # Inventory Engine
//!
//! The operations callers use. Each one validates its input, runs in a
//! single transaction and reports failure as an [`ApiError`].
//!
//! ## Usage
//! ```rust,ignore
//! let db = Database::new(EngineConfig::load(None)?.db_config()).await?;
//! let engine = db.engine();
//!
//! let receipt = engine.create_sale(request).await?;
//! println!("sale {} earned {} points", receipt.sale_id, receipt.loyalty_awarded);
//! ```

use std::sync::Arc;

use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::api_error::{ApiError, ErrorCode};
use crate::compose;
use crate::repository::Repositories;
use crate::transaction::{TransactionRunner, TxLabel, TxStatsSnapshot};
use tally_core::validation::{
    validate_new_product, validate_product_update, validate_purchase_request,
    validate_purchase_update, validate_sale_request,
};
use tally_core::{
    NewProduct, Product, ProductUpdate, PurchaseReceipt, PurchaseRequest, PurchaseUpdate,
    SaleReceipt, SaleRequest, SchemaCapabilities,
};

/// Transactional inventory operations. Cheap to clone.
#[derive(Debug, Clone)]
pub struct InventoryEngine {
    repos: Repositories,
    runner: TransactionRunner,
    pool: PgPool,
}

impl InventoryEngine {
    pub fn new(repos: Repositories, runner: TransactionRunner, pool: PgPool) -> Self {
        InventoryEngine {
            repos,
            runner,
            pool,
        }
    }

    /// Records a sale: stock out, totals, loyalty and credit.
    ///
    /// ## Errors
    /// - `INSUFFICIENT_STOCK` naming the product that ran short
    /// - `INVALID_ITEM` for bad lines or references outside the store
    /// - `INTERNAL` for everything else
    ///
    /// Nothing is written unless everything is.
    pub async fn create_sale(&self, req: SaleRequest) -> Result<SaleReceipt, ApiError> {
        validate_sale_request(&req)
            .map_err(|e| ApiError::new(ErrorCode::InvalidItem, e.to_string()))?;

        let repos = self.repos.clone();
        let label = TxLabel::new("create_sale").store(req.store_id);
        let receipt = self
            .runner
            .run(label, move |tx| {
                Box::pin(async move { compose::sale::create(&repos, &mut **tx, &req).await })
            })
            .await
            .map_err(ApiError::from_sale_error)?;

        info!(
            sale_id = %receipt.sale_id,
            grand_total = %receipt.grand_total,
            loyalty_awarded = receipt.loyalty_awarded,
            loyalty_used = receipt.loyalty_used,
            "Sale recorded"
        );
        Ok(receipt)
    }

    /// Records a purchase and books its stock.
    pub async fn create_purchase(&self, req: PurchaseRequest) -> Result<PurchaseReceipt, ApiError> {
        validate_purchase_request(&req)?;

        let repos = self.repos.clone();
        let label = TxLabel::new("create_purchase").store(req.store_id);
        let receipt = self
            .runner
            .run(label, move |tx| {
                Box::pin(async move { compose::purchase::create(&repos, &mut **tx, &req).await })
            })
            .await?;

        info!(purchase_id = %receipt.purchase_id, lines = receipt.lines, "Purchase recorded");
        Ok(receipt)
    }

    /// Replaces a purchase's lines and moves stock by the difference.
    pub async fn update_purchase(
        &self,
        purchase_id: Uuid,
        update: PurchaseUpdate,
    ) -> Result<PurchaseReceipt, ApiError> {
        validate_purchase_update(&update)?;

        let repos = self.repos.clone();
        let label = TxLabel::new("update_purchase").store(update.store_id);
        let receipt = self
            .runner
            .run(label, move |tx| {
                Box::pin(async move {
                    compose::purchase::update(&repos, &mut **tx, purchase_id, &update).await
                })
            })
            .await?;

        info!(purchase_id = %receipt.purchase_id, lines = receipt.lines, "Purchase updated");
        Ok(receipt)
    }

    /// Creates a product master with its opening stock.
    pub async fn create_product(&self, new: NewProduct) -> Result<Product, ApiError> {
        validate_new_product(&new)?;

        let repos = self.repos.clone();
        let label = TxLabel::new("create_product").store(new.store_id);
        let product = self
            .runner
            .run(label, move |tx| {
                Box::pin(async move { compose::product::create(&repos, &mut **tx, &new).await })
            })
            .await?;
        Ok(product)
    }

    /// Edits a product master. A repacking product cannot be turned back.
    pub async fn update_product(
        &self,
        id: Uuid,
        update: ProductUpdate,
    ) -> Result<Product, ApiError> {
        validate_product_update(&update)?;

        let repos = self.repos.clone();
        let label = TxLabel::new("update_product").store(update.store_id);
        let product = self
            .runner
            .run(label, move |tx| {
                Box::pin(
                    async move { compose::product::update(&repos, &mut **tx, id, &update).await },
                )
            })
            .await?;
        Ok(product)
    }

    /// Discovers the schema if that has not happened yet.
    pub async fn init_schema(&self) -> Result<Arc<SchemaCapabilities>, ApiError> {
        Ok(self.repos.catalog.init(&self.pool).await?)
    }

    /// Rescans the schema unconditionally.
    pub async fn refresh_schema(&self) -> Result<Arc<SchemaCapabilities>, ApiError> {
        Ok(self.repos.catalog.refresh(&self.pool).await?)
    }

    pub fn transaction_stats(&self) -> TxStatsSnapshot {
        self.runner.stats()
    }

    pub fn repositories(&self) -> &Repositories {
        &self.repos
    }
}
