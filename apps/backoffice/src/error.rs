//! # API Error Type
//!
//! The structured failure every back-office operation returns.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Back Office                        │
//! │                                                                         │
//! │  BackOffice::create_sale(...)                                           │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Repository call → DbResult<T>                                   │  │
//! │  │         │                                                        │  │
//! │  │         ├── DbError::Domain(CoreError) ── kind() ──► ApiError    │  │
//! │  │         │     NOT_FOUND, VALIDATION_ERROR, INSUFFICIENT_STOCK,   │  │
//! │  │         │     OVERPAYMENT, INVALID_STATE  (+ details)            │  │
//! │  │         │                                                        │  │
//! │  │         ├── DbError::Busy ─────────────► CONCURRENCY_CONFLICT    │  │
//! │  │         │                                                        │  │
//! │  │         └── anything else ── error!() ─► INTERNAL (generic text) │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Serialization
//! ```json
//! {
//!   "code": "INSUFFICIENT_STOCK",
//!   "message": "Insufficient stock for product 9f1c...: 10 available, 12 requested",
//!   "details": { "product_id": "9f1c...", "available": 10, "requested": 12, "shortfall": 2 }
//! }
//! ```

use furnish_core::{CoreError, ErrorKind};
use furnish_db::DbError;
use serde::Serialize;
use serde_json::Value;

/// API error returned from every back-office operation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,

    /// What the caller needs to act on: product and shortfall, remaining
    /// balance, current status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Sale, product, customer, payment or inventory record missing
    NotFound,

    /// Input validation failed, including invalid status transitions
    ValidationError,

    /// A decrement would take stock below zero
    InsufficientStock,

    /// A payment would exceed the remaining balance
    Overpayment,

    /// Operation not valid in the current lifecycle state
    InvalidState,

    /// Lock contention; retry the whole operation
    ConcurrencyConflict,

    /// Infrastructure failure (details are logged, not returned)
    Internal,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Attaches machine-readable details.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    /// Creates an internal error. The message is shown to the caller as is.
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        self.code == ErrorCode::ConcurrencyConflict
    }
}

impl From<ErrorKind> for ErrorCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::NotFound => ErrorCode::NotFound,
            ErrorKind::Validation => ErrorCode::ValidationError,
            ErrorKind::InsufficientStock => ErrorCode::InsufficientStock,
            ErrorKind::Overpayment => ErrorCode::Overpayment,
            ErrorKind::InvalidState => ErrorCode::InvalidState,
        }
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError {
            code: err.kind().into(),
            message: err.to_string(),
            details: err.details(),
        }
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Domain(e) => e.into(),
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => ApiError::validation(format!(
                "{} '{}' already exists",
                field, value
            )),
            DbError::ForeignKeyViolation { message } => {
                tracing::warn!("Foreign key violation: {}", message);
                ApiError::validation("Invalid reference")
            }
            DbError::ConstraintViolation(message) => {
                tracing::warn!("Constraint violation: {}", message);
                ApiError::validation("Constraint violated")
            }
            DbError::Busy(e) => {
                tracing::warn!("Database busy: {}", e);
                ApiError::new(
                    ErrorCode::ConcurrencyConflict,
                    "The database is busy, retry the operation",
                )
            }
            DbError::PoolExhausted => ApiError::new(
                ErrorCode::ConcurrencyConflict,
                "No database connection available, retry the operation",
            ),
            DbError::ConnectionFailed(e) => {
                tracing::error!("Database connection failed: {}", e);
                ApiError::internal("Internal error")
            }
            DbError::MigrationFailed(e) => {
                tracing::error!("Database migration failed: {}", e);
                ApiError::internal("Internal error")
            }
            DbError::QueryFailed(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Database query failed: {}", e);
                ApiError::internal("Internal error")
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ApiError::internal("Internal error")
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

// =============================================================================
// Unit Tests
// =============================================================================
