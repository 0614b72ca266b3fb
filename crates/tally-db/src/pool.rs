//! Pool construction and the [`Database`] handle.
//!
//! `Database::new` builds a `PgPool` from [`DbConfig`] (statement timeout
//! goes in as a connection option), applies migrations when asked, then
//! takes the first schema capability snapshot. Every engine operation
//! borrows one pooled connection for the length of its transaction.

use std::str::FromStr;
use std::sync::Arc;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use tracing::{debug, info};

pub use crate::config::DbConfig;
use crate::config::redact_url;
use crate::engine::InventoryEngine;
use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::{
    CustomerRepository, ProductRepository, PurchaseRepository, Repositories, SaleRepository,
    VariantRepository,
};
use crate::schema::SchemaCatalog;
use crate::transaction::TransactionRunner;

/// Main database handle providing repository and engine access.
///
/// Cheap to clone; clones share the pool, the schema catalog and the
/// transaction counters.
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
    catalog: Arc<SchemaCatalog>,
    runner: TransactionRunner,
}

impl Database {
    /// Connects, migrates and discovers the schema.
    ///
    /// ## Returns
    /// * `Ok(Database)` - Ready-to-use database handle
    /// * `Err(DbError)` - Connection, migration or schema scan failed
    ///
    /// ## Example
    /// ```rust,ignore
    /// let config = DbConfig::new("postgres://localhost/tally");
    /// let db = Database::new(config).await?;
    /// ```
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            url = %redact_url(&config.database_url),
            "Initializing database connection"
        );

        let mut connect_options = PgConnectOptions::from_str(&config.database_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .application_name("tally");
        if let Some(timeout) = config.statement_timeout {
            connect_options =
                connect_options.options([("statement_timeout", timeout.as_millis().to_string())]);
        }

        debug!("Connection options configured");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(max_connections = config.max_connections, "Database pool created");

        Self::from_pool(pool, &config).await
    }

    /// Wraps an existing pool. Runs migrations when `config` asks for it,
    /// then discovers the schema.
    pub async fn from_pool(pool: PgPool, config: &DbConfig) -> DbResult<Self> {
        let db = Database {
            runner: TransactionRunner::new(pool.clone(), config.slow_transaction_threshold),
            catalog: Arc::new(SchemaCatalog::new()),
            pool,
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }
        db.catalog.init(&db.pool).await?;

        Ok(db)
    }

    /// Applies pending migrations. Idempotent.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// For queries not covered by repositories.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn catalog(&self) -> &Arc<SchemaCatalog> {
        &self.catalog
    }

    pub fn runner(&self) -> &TransactionRunner {
        &self.runner
    }

    pub fn repositories(&self) -> Repositories {
        Repositories::new(self.pool.clone(), Arc::clone(&self.catalog))
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone(), Arc::clone(&self.catalog))
    }

    pub fn variants(&self) -> VariantRepository {
        VariantRepository::new(self.pool.clone(), Arc::clone(&self.catalog))
    }

    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.pool.clone(), Arc::clone(&self.catalog))
    }

    pub fn purchases(&self) -> PurchaseRepository {
        PurchaseRepository::new(self.pool.clone(), Arc::clone(&self.catalog))
    }

    pub fn customers(&self) -> CustomerRepository {
        CustomerRepository::new(self.pool.clone(), Arc::clone(&self.catalog))
    }

    /// The transactional operations of the engine.
    pub fn engine(&self) -> InventoryEngine {
        InventoryEngine::new(self.repositories(), self.runner.clone(), self.pool.clone())
    }

    /// Closes the pool. Repository calls fail afterwards.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// True when the database answers `SELECT 1`.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
