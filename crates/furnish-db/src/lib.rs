//! # furnish-db: Database Layer for the Furnish Back Office
//!
//! SQLite persistence for the back office, built on sqlx. Every write that
//! touches stock, sales or payments goes through this crate, one transaction
//! per unit of work.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Furnish Back Office Data Flow                       │
//! │                                                                         │
//! │  BackOffice facade (create_sale, record_payment, ...)                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    furnish-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐   ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │   │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │   │  (embedded)  │  │   │
//! │  │   │               │    │ SaleRepo       │   │              │  │   │
//! │  │   │ SqlitePool    │◄───│ PaymentRepo    │   │ 001_initial  │  │   │
//! │  │   │ WAL, FKs on   │    │ InventoryRepo  │   │ _schema.sql  │  │   │
//! │  │   │ busy_timeout  │    │ ProductRepo    │   │              │  │   │
//! │  │   └───────────────┘    └────────────────┘   └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   backoffice.db (+ -wal, -shm)                                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (sale, payment, inventory, ...)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use furnish_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("backoffice.db")).await?;
//!
//! let sale = db.sales().create_sale(new_sale).await?;
//! db.payments().record_payment(payment).await?;
//! let low = db.inventory().list_low_stock().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig, MigrationStatus};

// Repository re-exports for convenience
pub use repository::customer::CustomerRepository;
pub use repository::inventory::InventoryRepository;
pub use repository::payment::PaymentRepository;
pub use repository::product::ProductRepository;
pub use repository::sale::SaleRepository;
