//! # Inventory Operations

use tracing::debug;

use super::BackOffice;
use crate::error::{ApiError, ApiResult};
use furnish_core::{
    InventoryMovement, InventoryRecord, InventorySettingsPatch, MovementFilter, MovementReason,
    StockAdjustment,
};

impl BackOffice {
    /// Manual stock change: relative (`Delta`) or a stock count (`Absolute`).
    /// Only `adjustment` and `restock` reasons are accepted.
    pub async fn adjust_inventory(
        &self,
        product_id: &str,
        adjustment: StockAdjustment,
        reason: MovementReason,
        notes: Option<&str>,
    ) -> ApiResult<InventoryRecord> {
        debug!(product_id = %product_id, ?adjustment, reason = %reason, "adjust_inventory");
        Ok(self
            .db
            .inventory()
            .adjust(product_id, adjustment, reason, notes)
            .await?)
    }

    pub async fn get_inventory(&self, product_id: &str) -> ApiResult<InventoryRecord> {
        self.db
            .inventory()
            .get(product_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Inventory record", product_id))
    }

    pub async fn update_inventory_settings(
        &self,
        product_id: &str,
        patch: InventorySettingsPatch,
    ) -> ApiResult<InventoryRecord> {
        Ok(self.db.inventory().update_settings(product_id, patch).await?)
    }

    /// Records at or below their reorder level, biggest shortfall first.
    pub async fn list_low_stock(&self) -> ApiResult<Vec<InventoryRecord>> {
        Ok(self.db.inventory().list_low_stock().await?)
    }

    /// Movement log, newest first.
    pub async fn list_movements(&self, filter: MovementFilter) -> ApiResult<Vec<InventoryMovement>> {
        Ok(self.db.inventory().list_movements(filter).await?)
    }
}
