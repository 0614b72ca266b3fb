//! # tally-core: Pure Business Logic for the Tally Engine
//!
//! This crate holds every decision the inventory transaction engine makes
//! that does not need a database: which variant rows a sale draws from,
//! how a purchase edit moves stock between price tiers, what a sale's
//! totals and loyalty points are, and which optional columns a tenant
//! database supports.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              HTTP handlers (outside this workspace)             │   │
//! │  │    create-sale, create-purchase, update-purchase                │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  tally-db (InventoryEngine)                     │   │
//! │  │   Transaction runner ──► composers ──► row locks / upserts      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ pure calls                             │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌───────────┐ ┌─────────┐ ┌────────┐ │   │
//! │  │   │  stock  │ │reconcile│ │  totals   │ │ loyalty │ │ schema │ │   │
//! │  │   │  plans  │ │  diffs  │ │ + money   │ │ points  │ │  caps  │ │   │
//! │  │   └─────────┘ └─────────┘ └───────────┘ └─────────┘ └────────┘ │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain rows (Product, ProductVariant, Sale, Purchase, ...)
//! - [`request`] - Inbound requests and outbound receipts
//! - [`money`] - Decimal money with currency rounding at persistence time
//! - [`stock`] - Greedy stock consumption over locked rows
//! - [`reconcile`] - Purchase-edit stock reconciliation
//! - [`totals`] - Sale subtotal / tax / grand total
//! - [`loyalty`] - Loyalty point award and spend clamping
//! - [`schema`] - Versioned schema capability descriptor
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use rust_decimal::Decimal;
//! use tally_core::loyalty;
//! use tally_core::money::Money;
//!
//! let grand_total = Money::from_decimal(Decimal::new(25_050, 2)); // 250.50
//! assert_eq!(loyalty::points_awarded(grand_total), 2);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod loyalty;
pub mod money;
pub mod reconcile;
pub mod request;
pub mod schema;
pub mod stock;
pub mod totals;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use request::*;
pub use schema::{OptionalColumn, SchemaCapabilities};
pub use stock::{DrawTarget, LockedStock, StockDraw, StockSource};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Decimal places money is rounded to when persisted.
pub const CURRENCY_SCALE: u32 = 2;

/// Decimal places stock and line quantities are stored with.
pub const QUANTITY_SCALE: u32 = 3;

/// Currency units that earn one loyalty point.
pub const CURRENCY_UNITS_PER_POINT: i64 = 100;

/// Maximum line items accepted in a single sale or purchase.
///
/// ## Business Reason
/// Keeps a single transaction's lock footprint bounded.
pub const MAX_LINE_ITEMS: usize = 500;
