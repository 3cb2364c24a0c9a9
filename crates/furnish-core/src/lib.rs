//! # furnish-core: Pure Business Logic for the Furnish Back Office
//!
//! This crate holds the rules the back office must never get wrong, as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Furnish Back Office Architecture                    │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 apps/backoffice (API boundary)                  │   │
//! │  │      sales ─── payments ─── inventory    → ApiError            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    furnish-db (Database Layer)                  │   │
//! │  │      transactions, stock decrements, movement log               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ calls                                  │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ furnish-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ │   │
//! │  │   │  types  │ │  money  │ │ pricing │ │ ledger  │ │validation│ │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └─────────┘ └─────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, InventoryRecord, Sale, Payment, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`pricing`] - Line and sale totals
//! - [`ledger`] - Payment status derivation and overpayment rule
//! - [`error`] - Domain error types
//! - [`validation`] - Field-level validation
//!
//! ## Example Usage
//!
//! ```rust
//! use furnish_core::ledger::derive_payment_status;
//! use furnish_core::{Money, PaymentStatus};
//!
//! let total = Money::from_cents(30_000);
//! let paid = Money::from_cents(20_000);
//! assert_eq!(derive_payment_status(total, paid, false), PaymentStatus::Partial);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ledger;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines on a single sale.
pub const MAX_SALE_LINES: usize = 200;

/// Maximum quantity on one sale line.
///
/// Guards against typing 1000 instead of 10 on a sofa order.
pub const MAX_LINE_QUANTITY: i64 = 9_999;

/// Largest amount accepted for any price, discount, tax or payment
/// ($10 billion). Keeps every sale total far inside `i64`.
pub const MAX_AMOUNT_CENTS: i64 = 1_000_000_000_000;

/// Largest quantity an inventory record can hold or a manual adjustment can
/// move in one step.
pub const MAX_STOCK_QUANTITY: i64 = 1_000_000_000;

/// Maximum length of free-text notes.
pub const MAX_NOTES_LENGTH: usize = 2_000;

/// Reorder level given to new inventory records unless specified.
pub const DEFAULT_REORDER_LEVEL: i64 = 10;

/// Reorder quantity given to new inventory records unless specified.
pub const DEFAULT_REORDER_QUANTITY: i64 = 50;

/// Prefix of every invoice number.
pub const INVOICE_PREFIX: &str = "ORD";
