//! # Transaction Runner
//!
//! Runs a unit of work inside one PostgreSQL transaction and commits or
//! rolls back based on its result.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  run(label, work)                                                       │
//! │    │                                                                    │
//! │    ├── pool.begin()              ── acquire + BEGIN                     │
//! │    │                                                                    │
//! │    ├── work(&mut tx).await                                              │
//! │    │      │                                                             │
//! │    │      ├── Ok(v)  ──► COMMIT   ──► Ok(v)                             │
//! │    │      └── Err(e) ──► ROLLBACK ──► Err(e)                            │
//! │    │                    (a failed ROLLBACK is logged, e is kept)        │
//! │    │                                                                    │
//! │    └── elapsed > slow threshold ──► warn!                               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Writing work closures
//! The closure receives the transaction and returns a boxed future that
//! borrows it. Data the work needs is moved in:
//!
//! ```rust,ignore
//! let receipt = runner
//!     .run(TxLabel::new("create_sale"), move |tx| {
//!         Box::pin(async move { compose::sale::create(&repos, &mut **tx, &request).await })
//!     })
//!     .await?;
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};

/// Future returned by a unit of work, borrowing the transaction for `'c`.
pub type TxFuture<'c, T> = Pin<Box<dyn Future<Output = DbResult<T>> + Send + 'c>>;

/// Identifies a transaction in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxLabel {
    pub operation: &'static str,
    pub store_id: Option<Uuid>,
}

impl TxLabel {
    pub const fn new(operation: &'static str) -> Self {
        TxLabel {
            operation,
            store_id: None,
        }
    }

    pub const fn store(mut self, store_id: Option<Uuid>) -> Self {
        self.store_id = store_id;
        self
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Process-wide transaction counters.
#[derive(Debug, Default)]
pub struct TransactionStats {
    committed: AtomicU64,
    rolled_back: AtomicU64,
    slow: AtomicU64,
}

/// Point-in-time copy of [`TransactionStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TxStatsSnapshot {
    pub committed: u64,
    pub rolled_back: u64,
    pub slow: u64,
}

impl TransactionStats {
    pub fn snapshot(&self) -> TxStatsSnapshot {
        TxStatsSnapshot {
            committed: self.committed.load(Ordering::Relaxed),
            rolled_back: self.rolled_back.load(Ordering::Relaxed),
            slow: self.slow.load(Ordering::Relaxed),
        }
    }

    fn record(&self, committed: bool, slow: bool) {
        if committed {
            self.committed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.rolled_back.fetch_add(1, Ordering::Relaxed);
        }
        if slow {
            self.slow.fetch_add(1, Ordering::Relaxed);
        }
    }
}

// =============================================================================
// Runner
// =============================================================================

/// Runs units of work in their own transaction.
///
/// Cheap to clone; clones share the pool and the counters.
#[derive(Debug, Clone)]
pub struct TransactionRunner {
    pool: PgPool,
    stats: Arc<TransactionStats>,
    slow_threshold: Duration,
}

impl TransactionRunner {
    pub fn new(pool: PgPool, slow_threshold: Duration) -> Self {
        TransactionRunner {
            pool,
            stats: Arc::new(TransactionStats::default()),
            slow_threshold,
        }
    }

    pub fn stats(&self) -> TxStatsSnapshot {
        self.stats.snapshot()
    }

    /// Runs `work` in a fresh transaction.
    ///
    /// ## Returns
    /// * `Ok(T)` - `work` succeeded and the transaction committed
    /// * `Err(DbError)` - acquiring, BEGIN, `work` or COMMIT failed; the
    ///   transaction was rolled back (or never started)
    ///
    /// Callers must not hold row locks elsewhere while awaiting this.
    pub async fn run<T, F>(&self, label: TxLabel, work: F) -> DbResult<T>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut Transaction<'static, Postgres>) -> TxFuture<'c, T> + Send,
    {
        let started = Instant::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::at_boundary("BEGIN", e))?;
        debug!(operation = label.operation, store_id = ?label.store_id, "Transaction started");

        let outcome = work(&mut tx).await;

        let result = match outcome {
            Ok(value) => match tx.commit().await {
                Ok(()) => Ok(value),
                Err(e) => Err(DbError::at_boundary("COMMIT", e)),
            },
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(
                        operation = label.operation,
                        error = %rollback_err,
                        "Rollback failed; connection will be discarded"
                    );
                }
                Err(err)
            }
        };

        let elapsed = started.elapsed();
        let slow = elapsed > self.slow_threshold;
        self.stats.record(result.is_ok(), slow);

        match &result {
            Ok(_) => debug!(
                operation = label.operation,
                store_id = ?label.store_id,
                elapsed_ms = elapsed.as_millis() as u64,
                "Transaction committed"
            ),
            Err(e) => debug!(
                operation = label.operation,
                store_id = ?label.store_id,
                elapsed_ms = elapsed.as_millis() as u64,
                error = %e,
                "Transaction rolled back"
            ),
        }
        if slow {
            warn!(
                operation = label.operation,
                store_id = ?label.store_id,
                elapsed_ms = elapsed.as_millis() as u64,
                threshold_ms = self.slow_threshold.as_millis() as u64,
                "Slow transaction"
            );
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_record() {
        let stats = TransactionStats::default();
        stats.record(true, false);
        stats.record(false, true);
        stats.record(true, true);

        let snap = stats.snapshot();
        assert_eq!(snap.committed, 2);
        assert_eq!(snap.rolled_back, 1);
        assert_eq!(snap.slow, 2);
    }

    #[test]
    fn test_label_builder() {
        let store = Uuid::new_v4();
        let label = TxLabel::new("create_purchase").store(Some(store));
        assert_eq!(label.operation, "create_purchase");
        assert_eq!(label.store_id, Some(store));
    }
}
