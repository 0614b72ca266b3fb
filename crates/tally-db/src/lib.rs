//! # tally-db: PostgreSQL Inventory Transaction Engine
//!
//! This crate runs the Tally inventory operations against PostgreSQL:
//! sales that draw stock from price-tiered variants, purchases that book
//! stock in, and purchase edits that move stock by the difference.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally Data Flow                                  │
//! │                                                                         │
//! │  HTTP handler (create-sale)                                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tally-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   InventoryEngine ──► TransactionRunner (BEGIN/COMMIT/ROLLBACK) │   │
//! │  │         │                        │                              │   │
//! │  │         ▼                        ▼                              │   │
//! │  │   ┌───────────┐   ┌──────────────────┐   ┌──────────────────┐  │   │
//! │  │   │ composers │──►│   repositories   │──►│  SchemaCatalog   │  │   │
//! │  │   │ sale      │   │ product variant  │   │ optional columns │  │   │
//! │  │   │ purchase  │   │ stock sale       │   │ refresh on 42703 │  │   │
//! │  │   │ product   │   │ purchase customer│   │                  │  │   │
//! │  │   └───────────┘   └──────────────────┘   └──────────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     PostgreSQL 15+                              │   │
//! │  │   row locks (FOR UPDATE), ON CONFLICT upserts, savepoints       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`config`] - `tally.toml` and environment configuration
//! - [`engine`] - The public operations
//! - [`transaction`] - One transaction per operation, with counters
//! - [`compose`] - Multi-statement operations inside a transaction
//! - [`repository`] - Per-table statements and row locks
//! - [`schema`] - Optional column discovery
//! - [`migrations`] - Embedded database migrations
//! - [`error`] / [`api_error`] - Internal and caller-facing errors
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_db::{Database, EngineConfig};
//!
//! let config = EngineConfig::load(Some(Path::new("tally.toml")))?;
//! let db = Database::new(config.db_config()).await?;
//!
//! let engine = db.engine();
//! let receipt = engine.create_sale(request).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod api_error;
pub mod compose;
pub mod config;
pub mod engine;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod schema;
pub mod transaction;

// =============================================================================
// Re-exports
// =============================================================================

pub use api_error::{ApiError, ErrorCode};
pub use config::{ConfigError, EngineConfig};
pub use engine::InventoryEngine;
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use schema::SchemaCatalog;
pub use transaction::{TransactionRunner, TxLabel, TxStatsSnapshot};

// Repository re-exports for convenience
pub use repository::Repositories;
