//! # BackOffice Facade
//!
//! The operations the back office exposes, grouped the way callers use them.
//! Every method returns [`ApiResult`]; storage errors never leak past here.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           BackOffice                                    │
//! │                                                                         │
//! │  sales.rs      create_sale, get_sale, list_sales, cancel_sale, ...     │
//! │  payments.rs   record_payment, delete_payment, list_payments, ...      │
//! │  inventory.rs  adjust_inventory, list_low_stock, list_movements, ...   │
//! │  catalog.rs    products and customers                                  │
//! │                                                                         │
//! │  Each call takes fresh repository handles from the shared Database:    │
//! │  nothing is cached between calls.                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod catalog;
mod inventory;
mod payments;
mod sales;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::config::BackOfficeConfig;
use crate::error::ApiResult;
use furnish_db::{Database, DbResult, MigrationStatus};

/// Handle to the back office. Cheap to clone.
#[derive(Debug, Clone)]
pub struct BackOffice {
    db: Database,
}

/// Result of [`BackOffice::health`].
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub database: bool,
    pub migrations: MigrationStatus,
    pub checked_at: DateTime<Utc>,
}

impl BackOffice {
    /// Wraps an already opened database.
    pub fn new(db: Database) -> Self {
        BackOffice { db }
    }

    /// Opens the configured database (running migrations if enabled).
    pub async fn connect(config: &BackOfficeConfig) -> DbResult<Self> {
        let db = Database::new(config.db_config()).await?;
        info!(path = %config.database_path, "Back office ready");
        Ok(BackOffice::new(db))
    }

    /// The underlying database handle.
    pub fn database(&self) -> &Database {
        &self.db
    }

    pub async fn health(&self) -> ApiResult<HealthReport> {
        Ok(HealthReport {
            database: self.db.health_check().await,
            migrations: self.db.migration_status().await?,
            checked_at: Utc::now(),
        })
    }

    pub async fn close(&self) {
        self.db.close().await;
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;

    #[tokio::test]
    async fn test_health_reports_migrations() {
        let office = office().await;
        let report = office.health().await.unwrap();
        assert!(report.database);
        assert_eq!(report.migrations.total, report.migrations.applied);
    }
}
