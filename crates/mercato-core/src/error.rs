//! # Error Types
//!
//! Domain error taxonomy shared by the pricing engine and the ledgers.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  CoreError                     (business rule violations)              │
//! │  ├── InsufficientStock         sale line asks for more than on hand    │
//! │  ├── SaleAlreadyTerminal       refund/void on a refunded/voided sale   │
//! │  ├── InvalidPromotion          promotion config cannot be interpreted  │
//! │  └── Validation ──► ValidationError                                    │
//! │                     ├── Required / TooLong / OutOfRange / ...          │
//! │                     ├── CreditRequiresCustomer                         │
//! │                     └── Rejected (customer has sales history, ...)     │
//! │                                                                         │
//! │  mercato-db wraps CoreError inside DbError, next to NotFound and the   │
//! │  persistence failures. Messages are written for direct display.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised by the engines.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A sale line requests more units than the product has on hand.
    ///
    /// ## When This Occurs
    /// - Cart line quantity exceeds the live stock read inside the sale transaction
    /// - `remove_stock` asked to take out more than is on hand
    ///
    /// The whole operation is rolled back; nothing is partially applied.
    #[error("Insufficient stock for \"{product_name}\": requested {requested}, available {available}")]
    InsufficientStock {
        product_id: String,
        product_name: String,
        requested: i64,
        available: i64,
    },

    /// Refund or void requested on a sale that already left `completed`.
    #[error("Sale is already {status}")]
    SaleAlreadyTerminal { sale_id: String, status: String },

    /// A promotion row carries a config that does not match its type.
    #[error("Invalid promotion {promotion_id}: {reason}")]
    InvalidPromotion { promotion_id: String, reason: String },

    /// Input validation failure.
    #[error("{0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors, raised before any transaction is opened.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, end date before start date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Credit payment without a linked customer.
    #[error("Credit sales require a linked customer")]
    CreditRequiresCustomer,

    /// The operation is not permitted in the entity's current state.
    ///
    /// ## When This Occurs
    /// - Deleting a customer who has sales history
    /// - Setting a purchase order to `received` without going through receive
    /// - Changing the status of a received purchase order
    #[error("{0}")]
    Rejected(String),
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    pub fn must_be_positive(field: impl Into<String>) -> Self {
        ValidationError::MustBePositive {
            field: field.into(),
        }
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message() {
        let err = CoreError::InsufficientStock {
            product_id: "p-1".to_string(),
            product_name: "Widget".to_string(),
            requested: 10,
            available: 3,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for \"Widget\": requested 10, available 3"
        );
    }

    #[test]
    fn test_terminal_sale_message() {
        let err = CoreError::SaleAlreadyTerminal {
            sale_id: "s-1".to_string(),
            status: "refunded".to_string(),
        };
        assert_eq!(err.to_string(), "Sale is already refunded");
    }

    #[test]
    fn test_credit_message_passes_through() {
        let err: CoreError = ValidationError::CreditRequiresCustomer.into();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(err.to_string(), "Credit sales require a linked customer");
    }

    #[test]
    fn test_validation_helpers() {
        assert_eq!(ValidationError::required("name").to_string(), "name is required");
        assert_eq!(
            ValidationError::must_be_positive("quantity").to_string(),
            "quantity must be positive"
        );
    }
}
