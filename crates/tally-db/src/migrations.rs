//! # Database Migrations
//!
//! Embedded SQL migrations for the Tally engine.
//!
//! ## Migration Set
//! ```text
//! migrations/postgres/
//! ├── 0001_core_schema.sql       # tables every tenant database has
//! └── 0002_optional_columns.sql  # columns the engine probes for at runtime
//! ```
//!
//! Tenant databases that never received `0002` still work: the schema
//! catalog reports the missing columns and the engine leaves them out.
//!
//! ## Adding New Migrations
//! 1. Create `NNNN_description.sql` with the next sequence number
//! 2. **NEVER** modify existing migrations - always add new ones
//! 3. A new column the engine writes must also be registered in
//!    `tally_core::schema::columns` if older databases may lack it

use sqlx::PgPool;
use tracing::info;

use crate::error::DbResult;

/// Embedded migrations from the `migrations/postgres` directory.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/postgres");

/// Runs all pending database migrations.
///
/// Idempotent; each migration runs in its own transaction and is recorded
/// in `_sqlx_migrations`.
pub async fn run_migrations(pool: &PgPool) -> DbResult<()> {
    info!("Checking for pending migrations");

    MIGRATOR.run(pool).await?;

    info!("All migrations applied successfully");
    Ok(())
}
