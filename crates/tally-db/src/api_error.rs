//! # API Error Type
//!
//! What callers of [`InventoryEngine`](crate::engine::InventoryEngine) see
//! when an operation fails: a stable category and a readable message.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ValidationError ──────────────────────────────► VALIDATION_ERROR       │
//! │                                                   (INVALID_ITEM in sales)│
//! │  CoreError::InsufficientStock ─────────────────► INSUFFICIENT_STOCK     │
//! │  CoreError::*NotFound / DbError::NotFound ─────► NOT_FOUND              │
//! │                                                   (INVALID_ITEM in sales)│
//! │  DbError::UniqueViolation ─────────────────────► VALIDATION_ERROR       │
//! │  anything else ── tracing::error! ─────────────► INTERNAL               │
//! │                   (generic message, no database text)                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Serialization
//! ```json
//! { "code": "INSUFFICIENT_STOCK", "message": "Insufficient stock for Rice: available 3, requested 5" }
//! ```

use serde::Serialize;
use tally_core::{CoreError, ValidationError};

use crate::error::DbError;

/// Error returned by engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable category.
    pub code: ErrorCode,

    /// Human-readable reason.
    pub message: String,
}

/// Error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input rejected before any transaction was opened (400)
    ValidationError,

    /// A sale line asked for more than is in stock (409)
    InsufficientStock,

    /// A sale line (or its customer) references something that does not
    /// exist in the store (422)
    InvalidItem,

    /// Resource not found (404)
    NotFound,

    /// Anything else (500)
    Internal,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    /// Maps a create-sale failure. Bad input and missing references are
    /// both the caller's line item being wrong.
    pub fn from_sale_error(err: DbError) -> Self {
        match err {
            DbError::Domain(CoreError::Validation(e)) => {
                ApiError::new(ErrorCode::InvalidItem, e.to_string())
            }
            DbError::Domain(core) if core.is_not_found() => {
                ApiError::new(ErrorCode::InvalidItem, core.to_string())
            }
            DbError::NotFound { entity, id } => {
                ApiError::new(ErrorCode::InvalidItem, format!("{} not found: {}", entity, id))
            }
            other => ApiError::from(other),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InsufficientStock { .. } => {
                ApiError::new(ErrorCode::InsufficientStock, err.to_string())
            }
            CoreError::InvalidItem { .. } => ApiError::new(ErrorCode::InvalidItem, err.to_string()),
            CoreError::TooManyItems { .. } | CoreError::Validation(_) => {
                ApiError::validation(err.to_string())
            }
            ref e if e.is_not_found() => ApiError::new(ErrorCode::NotFound, err.to_string()),
            other => {
                tracing::error!(error = %other, "Unhandled domain error");
                ApiError::internal("Operation failed")
            }
        }
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Domain(core) => ApiError::from(core),
            DbError::NotFound { entity, id } => {
                ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", entity, id))
            }
            DbError::UniqueViolation { field, .. } => {
                ApiError::validation(format!("{} already exists", field))
            }
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::validation("Invalid reference")
            }
            DbError::Conflict(e) => {
                tracing::error!("Transaction conflict: {}", e);
                ApiError::internal("Concurrent update conflict; retry the operation")
            }
            DbError::UndefinedColumn(e) => {
                tracing::error!("Schema mismatch after refresh: {}", e);
                ApiError::internal("Database operation failed")
            }
            DbError::ConnectionFailed(e) => {
                tracing::error!("Database connection failed: {}", e);
                ApiError::internal("Database connection failed")
            }
            DbError::MigrationFailed(e) => {
                tracing::error!("Database migration failed: {}", e);
                ApiError::internal("Database migration failed")
            }
            DbError::QueryFailed(e) => {
                tracing::error!("Database query failed: {}", e);
                ApiError::internal("Database operation failed")
            }
            DbError::TransactionFailed(e) => {
                tracing::error!("Transaction failed: {}", e);
                ApiError::internal("Database transaction failed")
            }
            DbError::PoolExhausted => {
                tracing::error!("Database pool exhausted");
                ApiError::internal("Database pool exhausted")
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ApiError::internal("Database operation failed")
            }
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}
