//! # Repository Module
//!
//! Database repository implementations for the back office.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories and Who Writes What                     │
//! │                                                                         │
//! │  CustomerRepository ──► customers                                      │
//! │  ProductRepository  ──► products (+ opening inventory row)             │
//! │  InventoryRepository ─► inventory, inventory_movements                 │
//! │  SaleRepository ──────► sales, sale_items                              │
//! │        └── calls the inventory helpers inside ITS transaction          │
//! │  PaymentRepository ───► payments, sales.payment_status                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Transactions
//! Every multi-statement operation runs in one transaction whose FIRST
//! statement is a write (a conditional stock decrement, or an `updated_at`
//! touch of the row being changed). SQLite then grants the write lock up
//! front, so concurrent writers queue on `busy_timeout` instead of failing
//! a read-to-write lock upgrade halfway through. Crate-internal helpers take
//! `&mut SqliteConnection` so they compose inside a caller's transaction.
//!
//! ## Available Repositories
//!
//! - [`CustomerRepository`](customer::CustomerRepository) - Customers
//! - [`ProductRepository`](product::ProductRepository) - Catalog
//! - [`InventoryRepository`](inventory::InventoryRepository) - Inventory ledger
//! - [`SaleRepository`](sale::SaleRepository) - Sale transaction manager
//! - [`PaymentRepository`](payment::PaymentRepository) - Payment ledger

pub mod customer;
pub mod inventory;
pub mod payment;
pub mod product;
pub mod sale;

/// Rows returned by list queries when the caller gives no limit.
pub const DEFAULT_LIST_LIMIT: u32 = 100;

/// Hard cap on rows returned by list queries.
pub const MAX_LIST_LIMIT: u32 = 1_000;

pub(crate) fn list_limit(requested: Option<u32>) -> i64 {
    i64::from(requested.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT))
}
