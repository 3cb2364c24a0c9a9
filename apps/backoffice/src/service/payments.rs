//! # Payment Operations

use tracing::debug;

use super::BackOffice;
use crate::error::{ApiError, ApiResult};
use furnish_core::{NewPayment, Payment, PaymentFilter, PaymentRecordStatus};

impl BackOffice {
    /// Records a completed payment. Fails with `OVERPAYMENT` (carrying the
    /// remaining balance) when the amount exceeds what is still owed.
    pub async fn record_payment(&self, input: NewPayment) -> ApiResult<Payment> {
        debug!(sale_id = %input.sale_id, amount = input.amount_cents, "record_payment");
        Ok(self.db.payments().record_payment(input).await?)
    }

    pub async fn delete_payment(&self, payment_id: &str) -> ApiResult<()> {
        debug!(payment_id = %payment_id, "delete_payment");
        Ok(self.db.payments().delete_payment(payment_id).await?)
    }

    pub async fn update_payment_status(
        &self,
        payment_id: &str,
        status: PaymentRecordStatus,
        notes: Option<String>,
    ) -> ApiResult<Payment> {
        debug!(payment_id = %payment_id, status = status.as_str(), "update_payment_status");
        Ok(self
            .db
            .payments()
            .update_payment_status(payment_id, status, notes)
            .await?)
    }

    pub async fn get_payment(&self, payment_id: &str) -> ApiResult<Payment> {
        self.db
            .payments()
            .get_by_id(payment_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Payment", payment_id))
    }

    /// Payments of one sale, in the order they were taken.
    pub async fn list_payments(&self, sale_id: &str) -> ApiResult<Vec<Payment>> {
        Ok(self.db.payments().list_for_sale(sale_id).await?)
    }

    /// Payments across sales, newest first.
    pub async fn search_payments(&self, filter: PaymentFilter) -> ApiResult<Vec<Payment>> {
        Ok(self.db.payments().list(filter).await?)
    }
}
