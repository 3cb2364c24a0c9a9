//! # Payment Repository
//!
//! The payment ledger. Owns `payments` and keeps `sales.payment_status` in
//! step with it: every write recomputes the status from the ledger inside
//! the same transaction.
//!
//! ## Balance Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  paid      = Σ amount of COMPLETED payments (pending/failed/refunded    │
//! │              never count)                                               │
//! │  remaining = final_amount − paid                                        │
//! │                                                                         │
//! │  record_payment(amount)                                                 │
//! │     amount > remaining  → Overpayment { remaining }                     │
//! │     otherwise           → insert completed payment, refresh status      │
//! │                                                                         │
//! │  payment_status:                                                        │
//! │     paid = 0            → pending   (refunded if a refund exists)       │
//! │     0 < paid < final    → partial                                       │
//! │     paid >= final       → paid                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::list_limit;
use crate::repository::sale::lock_sale;
use furnish_core::ledger::{ensure_within_balance, LedgerSummary};
use furnish_core::validation::{validate_notes, validate_payment_amount};
use furnish_core::{
    CoreError, Money, NewPayment, Payment, PaymentFilter, PaymentRecordStatus, PaymentStatus,
    SaleStatus,
};

const PAYMENT_SELECT: &str = "SELECT id, sale_id, amount_cents, method, status, reference, \
     notes, created_at, updated_at FROM payments";

/// Repository for payment database operations.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    /// Creates a new PaymentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    /// Records a completed payment against a sale.
    ///
    /// ## Errors
    /// - `SaleNotFound`
    /// - `InvalidSaleStatus` if the sale is cancelled
    /// - `Overpayment` if the amount exceeds the remaining balance
    pub async fn record_payment(&self, input: NewPayment) -> DbResult<Payment> {
        validate_payment_amount(input.amount_cents)?;
        validate_notes(input.reference.as_deref())?;
        validate_notes(input.notes.as_deref())?;

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        // Locks the sale: concurrent payments on it are serialized from here.
        let sale_status = lock_sale(&mut *tx, &input.sale_id, now).await?;
        ensure_open(&input.sale_id, sale_status)?;

        let final_amount = final_amount(&mut *tx, &input.sale_id).await?;
        let summary = ledger_summary(&mut *tx, &input.sale_id, None).await?;
        if let Err(e) = ensure_within_balance(
            &input.sale_id,
            final_amount,
            summary.paid,
            Money::from_cents(input.amount_cents),
        ) {
            warn!(
                sale_id = %input.sale_id,
                amount = input.amount_cents,
                remaining = summary.remaining(final_amount).cents(),
                "Payment rejected: overpayment"
            );
            return Err(e.into());
        }

        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            sale_id: input.sale_id,
            amount_cents: input.amount_cents,
            method: input.method,
            status: PaymentRecordStatus::Completed,
            reference: input.reference,
            notes: input.notes,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, sale_id, amount_cents, method, status,
                reference, notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.sale_id)
        .bind(payment.amount_cents)
        .bind(payment.method)
        .bind(payment.status)
        .bind(&payment.reference)
        .bind(&payment.notes)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&mut *tx)
        .await?;

        let payment_status = refresh_payment_status(&mut *tx, &payment.sale_id).await?;
        tx.commit().await?;

        info!(
            payment_id = %payment.id,
            sale_id = %payment.sale_id,
            amount = %payment.amount(),
            payment_status = payment_status.as_str(),
            "Payment recorded"
        );
        Ok(payment)
    }

    /// Removes a payment and recomputes the sale's payment status.
    pub async fn delete_payment(&self, payment_id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let sale_id: Option<String> =
            sqlx::query_scalar("DELETE FROM payments WHERE id = ?1 RETURNING sale_id")
                .bind(payment_id)
                .fetch_optional(&mut *tx)
                .await?;
        let sale_id = sale_id.ok_or_else(|| CoreError::PaymentNotFound(payment_id.to_string()))?;

        let payment_status = refresh_payment_status(&mut *tx, &sale_id).await?;
        tx.commit().await?;

        info!(
            payment_id = %payment_id,
            sale_id = %sale_id,
            payment_status = payment_status.as_str(),
            "Payment deleted"
        );
        Ok(())
    }

    /// Changes the status of a payment record.
    ///
    /// A payment moving into `completed` must fit in the balance left by the
    /// other completed payments, and its sale must not be cancelled.
    pub async fn update_payment_status(
        &self,
        payment_id: &str,
        status: PaymentRecordStatus,
        notes: Option<String>,
    ) -> DbResult<Payment> {
        validate_notes(notes.as_deref())?;

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let sale_id: Option<String> =
            sqlx::query_scalar("UPDATE payments SET updated_at = ?1 WHERE id = ?2 RETURNING sale_id")
                .bind(now)
                .bind(payment_id)
                .fetch_optional(&mut *tx)
                .await?;
        let sale_id = sale_id.ok_or_else(|| CoreError::PaymentNotFound(payment_id.to_string()))?;

        let current = fetch_payment(&mut *tx, payment_id)
            .await?
            .ok_or_else(|| CoreError::PaymentNotFound(payment_id.to_string()))?;

        if status == PaymentRecordStatus::Completed
            && current.status != PaymentRecordStatus::Completed
        {
            let sale_status = lock_sale(&mut *tx, &sale_id, now).await?;
            ensure_open(&sale_id, sale_status)?;

            let final_amount = final_amount(&mut *tx, &sale_id).await?;
            let others = ledger_summary(&mut *tx, &sale_id, Some(payment_id)).await?;
            if let Err(e) =
                ensure_within_balance(&sale_id, final_amount, others.paid, current.amount())
            {
                warn!(
                    payment_id = %payment_id,
                    sale_id = %sale_id,
                    "Payment completion rejected: overpayment"
                );
                return Err(e.into());
            }
        }

        sqlx::query("UPDATE payments SET status = ?1, notes = COALESCE(?2, notes) WHERE id = ?3")
            .bind(status)
            .bind(notes)
            .bind(payment_id)
            .execute(&mut *tx)
            .await?;

        let payment_status = refresh_payment_status(&mut *tx, &sale_id).await?;
        let payment = fetch_payment(&mut *tx, payment_id)
            .await?
            .ok_or_else(|| CoreError::PaymentNotFound(payment_id.to_string()))?;
        tx.commit().await?;

        info!(
            payment_id = %payment_id,
            from = current.status.as_str(),
            to = status.as_str(),
            payment_status = payment_status.as_str(),
            "Payment status updated"
        );
        Ok(payment)
    }

    /// Gets a payment by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Payment>> {
        let sql = format!("{PAYMENT_SELECT} WHERE id = ?1");
        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(payment)
    }

    /// Lists payments, newest first.
    pub async fn list(&self, filter: PaymentFilter) -> DbResult<Vec<Payment>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(PAYMENT_SELECT);
        qb.push(" WHERE 1 = 1");
        if let Some(sale_id) = filter.sale_id {
            qb.push(" AND sale_id = ").push_bind(sale_id);
        }
        if let Some(method) = filter.method {
            qb.push(" AND method = ").push_bind(method);
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(from) = filter.from {
            qb.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            qb.push(" AND created_at <= ").push_bind(to);
        }
        qb.push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(list_limit(filter.limit));

        let payments = qb.build_query_as::<Payment>().fetch_all(&self.pool).await?;

        debug!(count = payments.len(), "Listed payments");
        Ok(payments)
    }

    /// All payments of one sale in the order they were taken.
    pub async fn list_for_sale(&self, sale_id: &str) -> DbResult<Vec<Payment>> {
        let sql = format!("{PAYMENT_SELECT} WHERE sale_id = ?1 ORDER BY created_at, rowid");
        let payments = sqlx::query_as::<_, Payment>(&sql)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(payments)
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

fn ensure_open(sale_id: &str, status: SaleStatus) -> DbResult<()> {
    if status == SaleStatus::Cancelled {
        warn!(sale_id = %sale_id, "Payment rejected: sale is cancelled");
        return Err(CoreError::InvalidSaleStatus {
            sale_id: sale_id.to_string(),
            current_status: status.to_string(),
        }
        .into());
    }
    Ok(())
}

async fn final_amount(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Money> {
    let cents: Option<i64> = sqlx::query_scalar("SELECT final_amount_cents FROM sales WHERE id = ?1")
        .bind(sale_id)
        .fetch_optional(&mut *conn)
        .await?;

    cents
        .map(Money::from_cents)
        .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()).into())
}

async fn fetch_payment(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Payment>> {
    let sql = format!("{PAYMENT_SELECT} WHERE id = ?1");
    let payment = sqlx::query_as::<_, Payment>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(payment)
}

/// Sums the ledger of a sale, optionally leaving one payment out.
async fn ledger_summary(
    conn: &mut SqliteConnection,
    sale_id: &str,
    excluding: Option<&str>,
) -> DbResult<LedgerSummary> {
    let sql = format!("{PAYMENT_SELECT} WHERE sale_id = ?1");
    let payments = sqlx::query_as::<_, Payment>(&sql)
        .bind(sale_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(LedgerSummary::from_payments(
        payments.iter().filter(|p| Some(p.id.as_str()) != excluding),
    ))
}

/// Recomputes and stores `sales.payment_status` from the payment ledger.
pub(crate) async fn refresh_payment_status(
    conn: &mut SqliteConnection,
    sale_id: &str,
) -> DbResult<PaymentStatus> {
    let final_amount = final_amount(&mut *conn, sale_id).await?;
    let summary = ledger_summary(&mut *conn, sale_id, None).await?;
    let status = summary.status(final_amount);

    sqlx::query("UPDATE sales SET payment_status = ?1 WHERE id = ?2")
        .bind(status)
        .bind(sale_id)
        .execute(&mut *conn)
        .await?;

    debug!(sale_id = %sale_id, paid = %summary.paid, status = status.as_str(), "Payment status refreshed");
    Ok(status)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::Database;
    use crate::repository::test_support::*;
    use furnish_core::{NewSale, NewSaleItem, PaymentMethod, Sale, ValidationError, MAX_AMOUNT_CENTS};

    /// A completed sale with final amount 300.
    async fn sale_of_300(db: &Database) -> Sale {
        let c = customer(db).await;
        let p = product(db, "CHAIR", 100, 10).await;
        db.sales()
            .create_sale(NewSale {
                customer_id: c.id,
                items: vec![NewSaleItem::new(&p.id, 3)],
                ..Default::default()
            })
            .await
            .unwrap()
    }

    fn pay(sale: &Sale, amount_cents: i64) -> NewPayment {
        NewPayment {
            sale_id: sale.id.clone(),
            amount_cents,
            method: PaymentMethod::Card,
            reference: None,
            notes: None,
        }
    }

    async fn payment_status(db: &Database, sale_id: &str) -> PaymentStatus {
        db.sales()
            .get_by_id(sale_id)
            .await
            .unwrap()
            .unwrap()
            .payment_status
    }

    #[tokio::test]
    async fn test_full_payment_then_delete() {
        let db = test_db().await;
        let sale = sale_of_300(&db).await;

        let payment = db.payments().record_payment(pay(&sale, 300)).await.unwrap();
        assert_eq!(payment.status, PaymentRecordStatus::Completed);
        assert_eq!(payment_status(&db, &sale.id).await, PaymentStatus::Paid);

        db.payments().delete_payment(&payment.id).await.unwrap();
        assert_eq!(payment_status(&db, &sale.id).await, PaymentStatus::Pending);
        assert!(db.payments().get_by_id(&payment.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_overpayment_rejected_and_status_kept() {
        let db = test_db().await;
        let sale = sale_of_300(&db).await;

        db.payments().record_payment(pay(&sale, 200)).await.unwrap();
        assert_eq!(payment_status(&db, &sale.id).await, PaymentStatus::Partial);

        let err = db.payments().record_payment(pay(&sale, 150)).await.unwrap_err();
        match err {
            DbError::Domain(CoreError::Overpayment {
                amount_cents,
                remaining_cents,
                ..
            }) => {
                assert_eq!(amount_cents, 150);
                assert_eq!(remaining_cents, 100);
            }
            other => panic!("expected overpayment, got {other:?}"),
        }

        assert_eq!(payment_status(&db, &sale.id).await, PaymentStatus::Partial);
        assert_eq!(db.payments().list_for_sale(&sale.id).await.unwrap().len(), 1);

        // The exact remainder settles the sale
        db.payments().record_payment(pay(&sale, 100)).await.unwrap();
        assert_eq!(payment_status(&db, &sale.id).await, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_huge_payment_is_rejected_not_wrapped() {
        let db = test_db().await;
        let sale = sale_of_300(&db).await;
        db.payments().record_payment(pay(&sale, 200)).await.unwrap();

        let err = db
            .payments()
            .record_payment(pay(&sale, i64::MAX))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));

        // Within the accepted range it is a plain overpayment.
        let err = db
            .payments()
            .record_payment(pay(&sale, MAX_AMOUNT_CENTS))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Overpayment { .. })));

        assert_eq!(payment_status(&db, &sale.id).await, PaymentStatus::Partial);
        assert_eq!(db.payments().list_for_sale(&sale.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_and_refunded_payments_do_not_count() {
        let db = test_db().await;
        let sale = sale_of_300(&db).await;

        let first = db.payments().record_payment(pay(&sale, 300)).await.unwrap();
        let failed = db
            .payments()
            .update_payment_status(&first.id, PaymentRecordStatus::Failed, Some("declined".into()))
            .await
            .unwrap();
        assert_eq!(failed.status, PaymentRecordStatus::Failed);
        assert_eq!(failed.notes.as_deref(), Some("declined"));
        assert_eq!(payment_status(&db, &sale.id).await, PaymentStatus::Pending);

        // The failed 300 leaves the full balance open
        let second = db.payments().record_payment(pay(&sale, 300)).await.unwrap();
        assert_eq!(payment_status(&db, &sale.id).await, PaymentStatus::Paid);

        db.payments()
            .update_payment_status(&second.id, PaymentRecordStatus::Refunded, None)
            .await
            .unwrap();
        assert_eq!(payment_status(&db, &sale.id).await, PaymentStatus::Refunded);

        // Reviving the failed payment is checked against the balance again
        let revived = db
            .payments()
            .update_payment_status(&first.id, PaymentRecordStatus::Completed, None)
            .await
            .unwrap();
        assert_eq!(revived.status, PaymentRecordStatus::Completed);
        assert_eq!(payment_status(&db, &sale.id).await, PaymentStatus::Paid);

        let err = db
            .payments()
            .update_payment_status(&second.id, PaymentRecordStatus::Completed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Overpayment { .. })));
    }

    #[tokio::test]
    async fn test_cancelled_sale_takes_no_payments() {
        let db = test_db().await;
        let sale = sale_of_300(&db).await;
        db.sales().cancel_sale(&sale.id).await.unwrap();

        let err = db.payments().record_payment(pay(&sale, 50)).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InvalidSaleStatus { .. })
        ));
    }

    #[tokio::test]
    async fn test_payment_input_errors() {
        let db = test_db().await;
        let sale = sale_of_300(&db).await;

        assert!(matches!(
            db.payments().record_payment(pay(&sale, 0)).await,
            Err(DbError::Domain(CoreError::Validation(_)))
        ));
        assert!(matches!(
            db.payments()
                .record_payment(NewPayment {
                    sale_id: "missing".into(),
                    ..pay(&sale, 10)
                })
                .await,
            Err(DbError::Domain(CoreError::SaleNotFound(_)))
        ));
        assert!(matches!(
            db.payments().delete_payment("missing").await,
            Err(DbError::Domain(CoreError::PaymentNotFound(_)))
        ));
        assert!(matches!(
            db.payments()
                .update_payment_status("missing", PaymentRecordStatus::Failed, None)
                .await,
            Err(DbError::Domain(CoreError::PaymentNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_list_filters() {
        let db = test_db().await;
        let sale = sale_of_300(&db).await;

        let cash = db
            .payments()
            .record_payment(NewPayment {
                method: PaymentMethod::Cash,
                ..pay(&sale, 100)
            })
            .await
            .unwrap();
        let card = db.payments().record_payment(pay(&sale, 50)).await.unwrap();

        let all = db.payments().list(PaymentFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, card.id);

        let cash_only = db
            .payments()
            .list(PaymentFilter {
                method: Some(PaymentMethod::Cash),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(cash_only.len(), 1);
        assert_eq!(cash_only[0].id, cash.id);

        let now = Utc::now();
        let (from, to) = (
            now - chrono::Duration::minutes(1),
            now + chrono::Duration::minutes(1),
        );
        let windowed = db
            .payments()
            .list(PaymentFilter {
                sale_id: Some(sale.id.clone()),
                status: Some(PaymentRecordStatus::Completed),
                from: Some(from),
                to: Some(to),
                limit: Some(10),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(windowed.len(), 2);

        let in_order = db.payments().list_for_sale(&sale.id).await.unwrap();
        assert_eq!(in_order[0].id, cash.id);
        assert_eq!(in_order[1].id, card.id);
    }
}
