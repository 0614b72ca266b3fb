//! # Requests and Receipts
//!
//! The inbound shapes of the three mutating operations and what each
//! returns on success.
//!
//! ```text
//! SaleRequest ─────► create_sale ─────► SaleReceipt
//! PurchaseRequest ─► create_purchase ─► PurchaseReceipt
//! PurchaseUpdate ──► update_purchase ─► PurchaseReceipt
//! NewProduct ──────► create_product ──► Product
//! ProductUpdate ───► update_product ──► Product
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::stock::StockSource;
use crate::types::{PaymentMethod, PriceTier};

// =============================================================================
// Sale
// =============================================================================

/// Request to record a sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleRequest {
    #[serde(default)]
    pub store_id: Option<Uuid>,
    pub items: Vec<SaleItemInput>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub customer_id: Option<Uuid>,
    #[serde(default)]
    pub payment: Option<PaymentBreakdown>,
}

/// One line of a sale request.
///
/// Lines without `product_id` are free-text lines: they are billed but do
/// not touch stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleItemInput {
    #[serde(default)]
    pub product_id: Option<Uuid>,
    /// Draw from exactly this variant.
    #[serde(default)]
    pub variant_id: Option<Uuid>,
    /// Draw from the master row even if variants exist.
    #[serde(default)]
    pub use_master_stock: bool,
    #[serde(default)]
    pub name: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Percent; falls back to the product's rate when absent.
    #[serde(default)]
    pub tax_rate: Option<Decimal>,
}

impl SaleItemInput {
    /// Where this line's stock comes from.
    pub fn stock_source(&self) -> StockSource {
        match (self.variant_id, self.use_master_stock) {
            (Some(id), _) => StockSource::Variant(id),
            (None, true) => StockSource::Master,
            (None, false) => StockSource::Auto,
        }
    }
}

/// How a sale was paid, when split.
///
/// `credit` is added to the customer's credit due. `points` is the number
/// of loyalty points the customer wants to spend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentBreakdown {
    #[serde(default)]
    pub cash: Decimal,
    #[serde(default)]
    pub card: Decimal,
    #[serde(default)]
    pub upi: Decimal,
    #[serde(default)]
    pub credit: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Decimal>,
}

/// Result of a committed sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleReceipt {
    pub sale_id: Uuid,
    pub loyalty_awarded: i64,
    /// Points actually deducted (after clamping to the balance).
    pub loyalty_used: i64,
    /// Rounded grand total as persisted.
    pub grand_total: Decimal,
}

// =============================================================================
// Purchase
// =============================================================================

/// Request to record a purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRequest {
    #[serde(default)]
    pub store_id: Option<Uuid>,
    #[serde(default)]
    pub supplier_id: Option<Uuid>,
    /// Declared total as given by the supplier invoice.
    pub total: Decimal,
    pub items: Vec<PurchaseItemInput>,
}

/// One purchase line, used both on create and on update.
///
/// The product is identified by `product_id`, or by `sku` (+ `name` to
/// create the master when the SKU is new in this store).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PurchaseItemInput {
    /// Existing line being edited. Only meaningful on update.
    #[serde(default)]
    pub line_id: Option<Uuid>,
    #[serde(default)]
    pub product_id: Option<Uuid>,
    /// Stock into exactly this variant instead of resolving by tier.
    #[serde(default)]
    pub variant_id: Option<Uuid>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub tax_rate: Option<Decimal>,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    /// Selling price for a newly created variant or master.
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub mrp: Option<Decimal>,
}

impl PurchaseItemInput {
    #[inline]
    pub fn tier(&self) -> PriceTier {
        PriceTier::from_mrp(self.mrp)
    }
}

/// Replacement contents of an existing purchase.
///
/// Lines carrying a `line_id` edit that line; lines without one are
/// added; recorded lines not mentioned are removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseUpdate {
    /// Store the purchase must belong to.
    #[serde(default)]
    pub store_id: Option<Uuid>,
    pub total: Decimal,
    pub items: Vec<PurchaseItemInput>,
}

/// Result of a committed purchase create or update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub purchase_id: Uuid,
    pub lines: usize,
}

// =============================================================================
// Product
// =============================================================================

/// Request to create a product master.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    #[serde(default)]
    pub store_id: Option<Uuid>,
    #[serde(default)]
    pub sku: Option<String>,
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub mrp: Option<Decimal>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub tax_rate: Decimal,
    /// Initial stock, placed on the master for repacking products and on
    /// the first variant otherwise.
    #[serde(default)]
    pub opening_stock: Decimal,
    #[serde(default)]
    pub is_repacking: bool,
    #[serde(default)]
    pub barcode: Option<String>,
}

/// Partial update of a product master. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductUpdate {
    /// Store the product must belong to.
    #[serde(default)]
    pub store_id: Option<Uuid>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub mrp: Option<Decimal>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub tax_rate: Option<Decimal>,
    #[serde(default)]
    pub is_repacking: Option<bool>,
}

// =============================================================================
// Unit Tests
// =============================================================================
