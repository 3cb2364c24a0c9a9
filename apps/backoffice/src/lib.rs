//! # Furnish Back Office
//!
//! The API boundary of the back office: configuration, logging setup and
//! the [`BackOffice`] facade over the sale, payment and inventory
//! operations.
//!
//! ## Module Organization
//! ```text
//! furnish_backoffice/
//! ├── lib.rs          ◄─── You are here
//! ├── config.rs       ◄─── Layered configuration (defaults, file, FURNISH_*)
//! ├── telemetry.rs    ◄─── tracing-subscriber setup
//! ├── error.rs        ◄─── ApiError { code, message, details }
//! └── service/
//!     ├── mod.rs      ◄─── BackOffice handle, health
//!     ├── sales.rs    ◄─── Sale operations
//!     ├── payments.rs ◄─── Payment operations
//!     ├── inventory.rs◄─── Inventory operations
//!     └── catalog.rs  ◄─── Products and customers
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! let config = BackOfficeConfig::load()?;
//! telemetry::init(&config.log_filter, config.log_json)?;
//! let office = BackOffice::connect(&config).await?;
//!
//! match office.create_sale(new_sale).await {
//!     Ok(sale) => println!("{}", sale.invoice_number),
//!     Err(e) if e.code == ErrorCode::InsufficientStock => { /* e.details */ }
//!     Err(e) => return Err(e.into()),
//! }
//! ```

pub mod config;
pub mod error;
pub mod service;
pub mod telemetry;

pub use config::{BackOfficeConfig, ConfigError};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use service::{BackOffice, HealthReport};
