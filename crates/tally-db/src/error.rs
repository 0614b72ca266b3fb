//! Storage errors for the inventory engine.
//!
//! Everything returned by sqlx is folded into [`DbError`] here, keyed on
//! SQLSTATE where PostgreSQL supplies one. Business failures raised while a
//! transaction is open (short stock, unknown product) travel through the
//! [`DbError::Domain`] variant so the runner can roll back and the engine can
//! still surface the original [`CoreError`]. `api_error.rs` turns the result
//! into a stable code for callers.
//!
//! | SQLSTATE        | Variant                |
//! |-----------------|------------------------|
//! | `23505`         | `UniqueViolation`      |
//! | `23503`         | `ForeignKeyViolation`  |
//! | `42703`         | `UndefinedColumn`      |
//! | `40P01`/`40001` | `Conflict`             |

use tally_core::CoreError;
use thiserror::Error;

/// SQLSTATE for a reference to a column that does not exist.
pub const UNDEFINED_COLUMN: &str = "42703";

#[derive(Debug, Error)]
pub enum DbError {
    /// No row matched the lookup (or it belongs to another store).
    #[error("{entity} {id} does not exist")]
    NotFound { entity: String, id: String },

    #[error("{field} '{value}' is already taken")]
    UniqueViolation { field: String, value: String },

    /// A referenced store, product, customer or variant is missing.
    #[error("dangling reference: {message}")]
    ForeignKeyViolation { message: String },

    /// A statement referenced a column this database does not have.
    ///
    /// Happens when an optional column is dropped after the capability
    /// snapshot was taken. Recovered locally by refreshing the snapshot and
    /// retrying once.
    #[error("column missing: {0}")]
    UndefinedColumn(String),

    /// Deadlock or serialization failure. The transaction was rolled back.
    #[error("transaction conflict: {0}")]
    Conflict(String),

    /// Business rule failure raised inside a transaction.
    #[error(transparent)]
    Domain(#[from] CoreError),

    #[error("cannot reach database: {0}")]
    ConnectionFailed(String),

    #[error("schema migration: {0}")]
    MigrationFailed(String),

    #[error("statement rejected: {0}")]
    QueryFailed(String),

    /// BEGIN or COMMIT failed.
    #[error("begin/commit: {0}")]
    TransactionFailed(String),

    /// Acquire timed out.
    #[error("no free connection in pool")]
    PoolExhausted,

    #[error("unexpected database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound { entity: entity.into(), id: id.to_string() }
    }

    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::UniqueViolation { field: field.into(), value: value.into() }
    }

    /// Classifies a failed BEGIN or COMMIT.
    ///
    /// Pool, connection and conflict errors keep their own variant; anything
    /// else becomes [`DbError::TransactionFailed`].
    pub fn at_boundary(stage: &str, err: sqlx::Error) -> Self {
        match Self::from(err) {
            Self::QueryFailed(msg) | Self::Internal(msg) => {
                Self::TransactionFailed(format!("{}: {}", stage, msg))
            }
            other => other,
        }
    }

    /// True when the statement failed with SQLSTATE 42703.
    pub fn is_undefined_column(&self) -> bool {
        matches!(self, DbError::UndefinedColumn(_))
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        let db_err = match err {
            sqlx::Error::Database(db_err) => db_err,
            sqlx::Error::RowNotFound => return Self::not_found("row", "?"),
            sqlx::Error::PoolTimedOut => return Self::PoolExhausted,
            sqlx::Error::PoolClosed => return Self::ConnectionFailed("pool closed".into()),
            sqlx::Error::Io(e) => return Self::ConnectionFailed(e.to_string()),
            other => return Self::Internal(other.to_string()),
        };

        let msg = db_err.message().to_string();
        match db_err.code().as_deref() {
            Some("23505") => {
                Self::duplicate(db_err.constraint().unwrap_or("constraint"), "?")
            }
            Some("23503") => Self::ForeignKeyViolation { message: msg },
            Some(UNDEFINED_COLUMN) => Self::UndefinedColumn(msg),
            Some("40P01") | Some("40001") => Self::Conflict(msg),
            _ => Self::QueryFailed(msg),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::MigrationFailed(err.to_string())
    }
}

impl From<tally_core::ValidationError> for DbError {
    fn from(err: tally_core::ValidationError) -> Self {
        DbError::Domain(CoreError::Validation(err))
    }
}

pub type DbResult<T> = Result<T, DbError>;
