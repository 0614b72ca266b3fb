//! # Schema Capability Catalog
//!
//! Owns the current [`SchemaCapabilities`] snapshot and keeps it in step
//! with the database.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Database::new ──► SchemaCatalog::init(pool)                            │
//! │                      │  single-flight: concurrent callers wait on       │
//! │                      │  one scan of information_schema.columns          │
//! │                      ▼                                                  │
//! │               Arc<SchemaCapabilities> (generation 1)                    │
//! │                      │                                                  │
//! │   composers ─────────┤ has_column / supports (sync, lock-free read)     │
//! │                      │                                                  │
//! │   statement fails    ▼                                                  │
//! │   with 42703 ──► ROLLBACK TO SAVEPOINT ──► refresh (same tx)            │
//! │                      │                                                  │
//! │                      ▼                                                  │
//! │               Arc<SchemaCapabilities> (generation 2) ──► retry once     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Readers always see a complete snapshot; a refresh swaps the `Arc` whole.

use std::sync::{Arc, RwLock};

use sqlx::postgres::PgRow;
use sqlx::{Connection, FromRow, PgConnection, PgExecutor, PgPool, Postgres, QueryBuilder};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use tally_core::schema::{OptionalColumn, SchemaCapabilities, ENGINE_TABLES};

/// Shared handle to the capability snapshot.
#[derive(Debug)]
pub struct SchemaCatalog {
    current: RwLock<Arc<SchemaCapabilities>>,
    refresh_lock: Mutex<()>,
}

impl Default for SchemaCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaCatalog {
    /// An uninitialized catalog. Every optional column reads as absent.
    pub fn new() -> Self {
        Self::with_capabilities(SchemaCapabilities::empty())
    }

    /// A catalog seeded with a known snapshot.
    pub fn with_capabilities(caps: SchemaCapabilities) -> Self {
        SchemaCatalog {
            current: RwLock::new(Arc::new(caps)),
            refresh_lock: Mutex::new(()),
        }
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<SchemaCapabilities> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.snapshot().has_column(table, column)
    }

    pub fn supports(&self, column: OptionalColumn) -> bool {
        self.snapshot().supports(column)
    }

    pub fn is_initialized(&self) -> bool {
        self.snapshot().is_initialized()
    }

    /// Scans the catalog once. Later calls return the cached snapshot.
    pub async fn init(&self, pool: &PgPool) -> DbResult<Arc<SchemaCapabilities>> {
        let snap = self.snapshot();
        if snap.is_initialized() {
            return Ok(snap);
        }

        let _guard = self.refresh_lock.lock().await;
        let snap = self.snapshot();
        if snap.is_initialized() {
            return Ok(snap);
        }

        let caps = self.scan(pool, snap.generation()).await?;
        let missing = caps.missing_optional();
        if missing.is_empty() {
            info!(generation = caps.generation(), "Schema capabilities loaded");
        } else {
            let names: Vec<String> = missing.iter().map(ToString::to_string).collect();
            warn!(
                generation = caps.generation(),
                missing = ?names,
                "Schema capabilities loaded; optional columns absent"
            );
        }
        Ok(self.install(caps))
    }

    /// Forces a rescan.
    pub async fn refresh<'e, E>(&self, executor: E) -> DbResult<Arc<SchemaCapabilities>>
    where
        E: PgExecutor<'e>,
    {
        let _guard = self.refresh_lock.lock().await;
        let generation = self.snapshot().generation();
        let caps = self.scan(executor, generation).await?;
        info!(generation = caps.generation(), "Schema capabilities refreshed");
        Ok(self.install(caps))
    }

    /// Rescans unless someone already refreshed past `seen_generation`.
    pub async fn refresh_if_stale(
        &self,
        conn: &mut PgConnection,
        seen_generation: u64,
    ) -> DbResult<Arc<SchemaCapabilities>> {
        let _guard = self.refresh_lock.lock().await;
        let snap = self.snapshot();
        if snap.generation() > seen_generation {
            debug!(generation = snap.generation(), "Schema capabilities already refreshed");
            return Ok(snap);
        }
        let caps = self.scan(&mut *conn, snap.generation()).await?;
        info!(generation = caps.generation(), "Schema capabilities refreshed");
        Ok(self.install(caps))
    }

    async fn scan<'e, E>(&self, executor: E, generation: u64) -> DbResult<SchemaCapabilities>
    where
        E: PgExecutor<'e>,
    {
        let tables: Vec<String> = ENGINE_TABLES.iter().map(|t| t.to_string()).collect();
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT table_name::text, column_name::text
            FROM information_schema.columns
            WHERE table_schema = current_schema()
              AND table_name = ANY($1)
            "#,
        )
        .bind(tables)
        .fetch_all(executor)
        .await?;

        debug!(columns = rows.len(), "Scanned information_schema.columns");
        Ok(SchemaCapabilities::from_columns(generation + 1, rows))
    }

    fn install(&self, caps: SchemaCapabilities) -> Arc<SchemaCapabilities> {
        let caps = Arc::new(caps);
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::clone(&caps);
        caps
    }

    // =========================================================================
    // Adaptive statements
    // =========================================================================

    /// Runs a statement built against the current snapshot, inside a
    /// savepoint. On SQLSTATE 42703 the savepoint is rolled back, the
    /// snapshot refreshed through `conn`, and the statement rebuilt and
    /// retried once. Any other error, or a second failure, is returned.
    ///
    /// `build` returns `None` when the snapshot leaves nothing to run; the
    /// result is then empty. `conn` must already be inside a transaction.
    pub async fn fetch_all_adaptive<T, F>(
        &self,
        conn: &mut PgConnection,
        what: &'static str,
        mut build: F,
    ) -> DbResult<Vec<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
        F: FnMut(&SchemaCapabilities) -> Option<QueryBuilder<'static, Postgres>>,
    {
        let caps = self.snapshot();
        let Some(mut qb) = build(&caps) else {
            return Ok(Vec::new());
        };

        let err = {
            let mut sp = conn.begin().await?;
            let result = qb.build_query_as::<T>().fetch_all(&mut *sp).await;
            match result {
                Ok(rows) => {
                    sp.commit().await?;
                    return Ok(rows);
                }
                Err(e) => {
                    sp.rollback().await?;
                    DbError::from(e)
                }
            }
        };

        let caps = self.recover(conn, what, err, caps.generation()).await?;
        match build(&caps) {
            Some(mut qb) => Ok(qb.build_query_as::<T>().fetch_all(&mut *conn).await?),
            None => Ok(Vec::new()),
        }
    }

    /// [`Self::fetch_all_adaptive`] for statements without result rows.
    /// Returns the number of rows affected.
    pub async fn execute_adaptive<F>(
        &self,
        conn: &mut PgConnection,
        what: &'static str,
        mut build: F,
    ) -> DbResult<u64>
    where
        F: FnMut(&SchemaCapabilities) -> Option<QueryBuilder<'static, Postgres>>,
    {
        let caps = self.snapshot();
        let Some(mut qb) = build(&caps) else {
            return Ok(0);
        };

        let err = {
            let mut sp = conn.begin().await?;
            let result = qb.build().execute(&mut *sp).await;
            match result {
                Ok(done) => {
                    sp.commit().await?;
                    return Ok(done.rows_affected());
                }
                Err(e) => {
                    sp.rollback().await?;
                    DbError::from(e)
                }
            }
        };

        let caps = self.recover(conn, what, err, caps.generation()).await?;
        match build(&caps) {
            Some(mut qb) => Ok(qb.build().execute(&mut *conn).await?.rows_affected()),
            None => Ok(0),
        }
    }

    async fn recover(
        &self,
        conn: &mut PgConnection,
        what: &'static str,
        err: DbError,
        seen_generation: u64,
    ) -> DbResult<Arc<SchemaCapabilities>> {
        if !err.is_undefined_column() {
            return Err(err);
        }
        warn!(
            statement = what,
            error = %err,
            "Schema mismatch; refreshing capabilities and retrying"
        );
        self.refresh_if_stale(conn, seen_generation).await
    }
}
