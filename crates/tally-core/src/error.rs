//! Business and input errors.
//!
//! [`ValidationError`] is raised before a transaction opens. [`CoreError`]
//! covers everything discovered against stored rows (short stock, rows
//! missing from the caller's store) and always aborts the enclosing
//! transaction. The storage crate wraps both into its own `DbError`.

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found, or belongs to another store.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Variant cannot be found, or does not belong to the given product.
    #[error("Variant not found: {0}")]
    VariantNotFound(String),

    /// Purchase cannot be found within the caller's store.
    #[error("Purchase not found: {0}")]
    PurchaseNotFound(String),

    /// An update referenced a purchase line the purchase does not own.
    #[error("Purchase line not found: {0}")]
    PurchaseLineNotFound(String),

    /// Customer cannot be found within the caller's store.
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    /// Locked rows for a sale line hold less than the requested quantity.
    /// The whole sale is rolled back.
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: Decimal,
        requested: Decimal,
    },

    /// A line item is malformed in a way only detectable against stored data.
    #[error("Invalid item at position {index}: {reason}")]
    InvalidItem { index: usize, reason: String },

    /// Request carries more line items than allowed.
    #[error("Cannot have more than {max} line items")]
    TooManyItems { max: usize },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// True for the "row does not exist (in this store)" family.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoreError::ProductNotFound(_)
                | CoreError::VariantNotFound(_)
                | CoreError::PurchaseNotFound(_)
                | CoreError::PurchaseLineNotFound(_)
                | CoreError::CustomerNotFound(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum ValidationError {
    /// Missing, or blank after trimming.
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be strictly positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must be zero or greater.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format or contradictory combination of fields.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., the same purchase line listed twice).
    #[error("{field} '{value}' appears more than once")]
    Duplicate { field: String, value: String },

    /// Field cannot be changed once set.
    #[error("{field} cannot be changed once set")]
    Immutable { field: String },
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message() {
        let err = CoreError::InsufficientStock {
            product: "Rice 1kg".to_string(),
            available: Decimal::new(3, 0),
            requested: Decimal::new(55, 1),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Rice 1kg: available 3, requested 5.5"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "sku".to_string(),
        };
        assert_eq!(err.to_string(), "sku is required");

        let err = ValidationError::Immutable {
            field: "is_repacking".to_string(),
        };
        assert_eq!(err.to_string(), "is_repacking cannot be changed once set");
    }

    #[test]
    fn test_validation_lifts_into_core() {
        let lifted = CoreError::from(ValidationError::MustBePositive {
            field: "quantity".into(),
        });
        assert!(matches!(lifted, CoreError::Validation(_)));
        assert_eq!(lifted.to_string(), "Validation error: quantity must be positive");
    }

    #[test]
    fn test_not_found_family() {
        assert!(CoreError::VariantNotFound("v".into()).is_not_found());
        assert!(CoreError::PurchaseLineNotFound("l".into()).is_not_found());
        assert!(!CoreError::TooManyItems { max: 1 }.is_not_found());
    }
}
