//! # Domain Types
//!
//! Rows the engine reads and writes.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐ 1   * ┌──────────────────┐                         │
//! │  │ Product (master)│──────►│ ProductVariant   │  one row per price tier │
//! │  │  stock          │       │  mrp (tier)      │  (NULL is its own tier) │
//! │  │  is_repacking   │       │  stock           │                         │
//! │  └─────────────────┘       └──────────────────┘                         │
//! │                                                                         │
//! │  ┌─────────────────┐ 1   * ┌──────────────────┐    ┌────────────────┐   │
//! │  │      Sale       │──────►│    SaleItem      │    │   Customer     │   │
//! │  │  metadata JSON  │       │  variant_id?     │    │ loyalty_points │   │
//! │  └─────────────────┘       └──────────────────┘    │ credit_due     │   │
//! │                                                    └────────────────┘   │
//! │  ┌─────────────────┐ 1   * ┌──────────────────┐                         │
//! │  │    Purchase     │──────►│  PurchaseItem    │  mutable                │
//! │  └─────────────────┘       └──────────────────┘                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Store Scoping
//! Every scoped row carries `store_id: Option<Uuid>`. `None` is the global
//! scope; a scoped request never sees global rows and vice versa.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate as a percentage (`5` = 5%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxRate(Decimal);

impl TaxRate {
    /// Creates a tax rate from a percentage.
    #[inline]
    pub const fn from_percent(percent: Decimal) -> Self {
        TaxRate(percent)
    }

    /// Returns the rate as a percentage.
    #[inline]
    pub const fn percent(&self) -> Decimal {
        self.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(Decimal::ZERO)
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Price Tier
// =============================================================================

/// The MRP (list price) that distinguishes one variant from another.
///
/// `PriceTier::NONE` (no stated MRP) is a tier of its own: it is never
/// equal to a stated `0`. Ordering puts `NONE` first, then ascending MRP,
/// which is the order sales consume stock in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceTier(Option<Decimal>);

impl PriceTier {
    /// The tier of variants with no stated MRP.
    pub const NONE: PriceTier = PriceTier(None);

    /// A tier with a stated MRP.
    ///
    /// Scale is normalized so `10`, `10.0` and `10.00` are one tier, the
    /// same way NUMERIC equality treats them.
    pub fn stated(mrp: Decimal) -> Self {
        PriceTier(Some(mrp.normalize()))
    }

    /// Builds a tier from a nullable MRP column.
    pub fn from_mrp(mrp: Option<Decimal>) -> Self {
        match mrp {
            Some(m) => PriceTier::stated(m),
            None => PriceTier::NONE,
        }
    }

    /// The MRP value to bind into SQL (`None` → NULL).
    #[inline]
    pub const fn mrp(&self) -> Option<Decimal> {
        self.0
    }

    #[inline]
    pub const fn is_none(&self) -> bool {
        self.0.is_none()
    }
}

impl fmt::Display for PriceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(m) => write!(f, "MRP {}", m),
            None => write!(f, "no MRP"),
        }
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product master row.
///
/// `stock` is the master stock used when a product has no variants, and
/// the only stock repacking products ever carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: Uuid,
    pub store_id: Option<Uuid>,
    /// Unique per store, compared case-insensitively.
    pub sku: Option<String>,
    pub name: String,
    pub price: Decimal,
    pub mrp: Option<Decimal>,
    pub unit: Option<String>,
    /// Percent.
    pub tax_rate: Decimal,
    pub stock: Decimal,
    /// Optional column; `false` when the column is absent.
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub is_repacking: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_decimal(self.price)
    }

    #[inline]
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_percent(self.tax_rate)
    }

    #[inline]
    pub fn tier(&self) -> PriceTier {
        PriceTier::from_mrp(self.mrp)
    }

    /// Name used in error messages (SKU when present).
    pub fn label(&self) -> String {
        match &self.sku {
            Some(sku) => format!("{} ({})", self.name, sku),
            None => self.name.clone(),
        }
    }
}

// =============================================================================
// Product Variant
// =============================================================================

/// A stock-holding child of a product, identified by its price tier.
///
/// At most one variant exists per `(product_id, mrp)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductVariant {
    pub id: Uuid,
    pub product_id: Uuid,
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub store_id: Option<Uuid>,
    pub mrp: Option<Decimal>,
    pub price: Option<Decimal>,
    pub unit: Option<String>,
    pub tax_rate: Option<Decimal>,
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub barcode: Option<String>,
    pub stock: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductVariant {
    #[inline]
    pub fn tier(&self) -> PriceTier {
        PriceTier::from_mrp(self.mrp)
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "text", rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Upi,
    /// Sale goes (partly) on the customer's tab.
    Credit,
    /// Split across methods; see the payment breakdown.
    Mixed,
}

impl PaymentMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Upi => "upi",
            PaymentMethod::Credit => "credit",
            PaymentMethod::Mixed => "mixed",
        }
    }
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::Cash
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            "upi" => Ok(PaymentMethod::Upi),
            "credit" => Ok(PaymentMethod::Credit),
            "mixed" => Ok(PaymentMethod::Mixed),
            other => Err(ValidationError::InvalidFormat {
                field: "payment_method".to_string(),
                reason: format!("unknown method '{}'", other),
            }),
        }
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A committed sale. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: Uuid,
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub store_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub subtotal: Decimal,
    pub tax_total: Decimal,
    pub grand_total: Decimal,
    pub payment_method: PaymentMethod,
    /// Serialized [`SaleMetadata`].
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Sale {
    /// Decodes the metadata column; `None` for rows written by other tools.
    pub fn parsed_metadata(&self) -> Option<SaleMetadata> {
        serde_json::from_value(self.metadata.clone()).ok()
    }
}

/// A sale line. Name, price and tax are snapshots taken at sale time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: Uuid,
    pub sale_id: Uuid,
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub store_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub variant_id: Option<Uuid>,
    pub name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub tax_rate: Decimal,
    pub line_total: Decimal,
    pub position: i32,
}

// =============================================================================
// Sale Metadata
// =============================================================================

/// JSON annotations stored on each sale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaleMetadata {
    pub loyalty: LoyaltyAnnotation,
    /// Amount added to the customer's credit due.
    #[serde(default)]
    pub credit: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<crate::request::PaymentBreakdown>,
}

/// Loyalty bookkeeping for one sale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltyAnnotation {
    pub awarded: i64,
    /// Points the caller asked to spend (after flooring, before clamping).
    pub requested: i64,
    /// Points actually deducted from the customer.
    pub spent: i64,
}

// =============================================================================
// Purchase
// =============================================================================

/// A stock purchase from a supplier. Mutable until deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Purchase {
    pub id: Uuid,
    pub store_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A purchase line as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PurchaseItem {
    pub id: Uuid,
    pub purchase_id: Uuid,
    pub product_id: Uuid,
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub variant_id: Option<Uuid>,
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub mrp: Option<Decimal>,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub position: i32,
}

impl PurchaseItem {
    #[inline]
    pub fn tier(&self) -> PriceTier {
        PriceTier::from_mrp(self.mrp)
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A customer with loyalty and credit balances.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Customer {
    pub id: Uuid,
    pub store_id: Option<Uuid>,
    pub name: String,
    pub phone: Option<String>,
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub loyalty_points: i64,
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub credit_due: Decimal,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
