//! # Error Types
//!
//! Domain-specific error types for furnish-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  furnish-core errors (this file)                                       │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  furnish-db errors (separate crate)                                    │
//! │  └── DbError          - Database operation failures + Busy             │
//! │                                                                         │
//! │  Back-office API errors (in app)                                       │
//! │  └── ApiError         - What callers see (serialized)                  │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Caller       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product, sale, balance)
//! 3. Errors are enum variants, never String
//! 4. Every variant classifies into an [`ErrorKind`]

use serde::Serialize;
use serde_json::json;
use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// Every variant is an expected, caller-recoverable condition. Infrastructure
/// failures never appear here; they live in `furnish-db`.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    /// Product cannot be found.
    ///
    /// ## When This Occurs
    /// - Product ID doesn't exist
    /// - A sale line references a product id that was mistyped
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    /// Product exists but has no inventory record.
    #[error("Inventory record not found for product {0}")]
    InventoryNotFound(String),

    /// A sale was submitted without any line items.
    #[error("A sale must contain at least one line item")]
    EmptySale,

    /// Product has been deactivated and can no longer be sold.
    #[error("Product {0} is inactive and cannot be sold")]
    ProductInactive(String),

    /// Insufficient stock to complete a sale line.
    ///
    /// ## User Workflow
    /// ```text
    /// create_sale (SOFA-3S qty: 5)
    ///      │
    ///      ▼
    /// Check stock: on hand = 3
    ///      │
    ///      ▼
    /// InsufficientStock { product_id, available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Caller shows: "Only 3 in stock, 2 short"
    /// ```
    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// Payment would push the completed total past the sale's final amount.
    #[error("Payment of {amount_cents} cents exceeds remaining balance of {remaining_cents} cents on sale {sale_id}")]
    Overpayment {
        sale_id: String,
        amount_cents: i64,
        remaining_cents: i64,
    },

    /// Sale is not in a state that allows the requested operation.
    ///
    /// ## When This Occurs
    /// - Cancelling a sale that is already cancelled
    /// - Recording a payment against a cancelled sale
    #[error("Sale {sale_id} is {current_status}, cannot perform operation")]
    InvalidSaleStatus {
        sale_id: String,
        current_status: String,
    },

    /// Requested lifecycle transition is not permitted.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Coarse classification of a [`CoreError`], used by the API boundary to
/// pick a stable error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Validation,
    InsufficientStock,
    Overpayment,
    InvalidState,
}

impl CoreError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::CustomerNotFound(_)
            | CoreError::ProductNotFound(_)
            | CoreError::SaleNotFound(_)
            | CoreError::PaymentNotFound(_)
            | CoreError::InventoryNotFound(_) => ErrorKind::NotFound,
            CoreError::EmptySale
            | CoreError::ProductInactive(_)
            | CoreError::InvalidTransition { .. }
            | CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            CoreError::Overpayment { .. } => ErrorKind::Overpayment,
            CoreError::InvalidSaleStatus { .. } => ErrorKind::InvalidState,
        }
    }

    /// Machine-readable context for the caller, if the variant carries any.
    ///
    /// Stock shortfalls report the product and how many units are missing;
    /// overpayments report the balance still open on the sale.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            CoreError::InsufficientStock {
                product_id,
                available,
                requested,
            } => Some(json!({
                "product_id": product_id,
                "available": available,
                "requested": requested,
                "shortfall": requested - available,
            })),
            CoreError::Overpayment {
                sale_id,
                amount_cents,
                remaining_cents,
            } => Some(json!({
                "sale_id": sale_id,
                "amount_cents": amount_cents,
                "remaining_cents": remaining_cents,
            })),
            CoreError::InvalidSaleStatus {
                sale_id,
                current_status,
            } => Some(json!({
                "sale_id": sale_id,
                "current_status": current_status,
            })),
            CoreError::InvalidTransition { from, to } => Some(json!({
                "from": from,
                "to": to,
            })),
            _ => None,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before any transaction is opened.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    #[error("{field} must not be zero")]
    MustNotBeZero { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., duplicate product code).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
