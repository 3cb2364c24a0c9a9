//! # Sale Operations

use tracing::debug;

use super::BackOffice;
use crate::error::{ApiError, ApiResult};
use furnish_core::{NewSale, Sale, SaleFilter, SalePatch, SaleStatus};

impl BackOffice {
    /// Creates a sale, decrementing stock for every line in one transaction.
    pub async fn create_sale(&self, input: NewSale) -> ApiResult<Sale> {
        debug!(customer_id = %input.customer_id, lines = input.items.len(), "create_sale");
        Ok(self.db.sales().create_sale(input).await?)
    }

    pub async fn get_sale(&self, sale_id: &str) -> ApiResult<Sale> {
        self.db
            .sales()
            .get_by_id(sale_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Sale", sale_id))
    }

    pub async fn get_sale_by_invoice(&self, invoice_number: &str) -> ApiResult<Sale> {
        self.db
            .sales()
            .get_by_invoice(invoice_number)
            .await?
            .ok_or_else(|| ApiError::not_found("Sale", invoice_number))
    }

    pub async fn list_sales(&self, filter: SaleFilter) -> ApiResult<Vec<Sale>> {
        Ok(self.db.sales().list(filter).await?)
    }

    /// Cancels a sale and restores its stock. A second cancel fails with
    /// `INVALID_STATE`.
    pub async fn cancel_sale(&self, sale_id: &str) -> ApiResult<()> {
        debug!(sale_id = %sale_id, "cancel_sale");
        Ok(self.db.sales().cancel_sale(sale_id).await?)
    }

    pub async fn update_sale_status(
        &self,
        sale_id: &str,
        status: SaleStatus,
        notes: Option<String>,
    ) -> ApiResult<Sale> {
        debug!(sale_id = %sale_id, status = %status, "update_sale_status");
        Ok(self
            .db
            .sales()
            .update_sale_status(sale_id, status, notes)
            .await?)
    }

    pub async fn update_sale(&self, sale_id: &str, patch: SalePatch) -> ApiResult<Sale> {
        Ok(self.db.sales().update(sale_id, patch).await?)
    }
}
