//! # Sale Repository
//!
//! The sale transaction manager: the only writer of `sales` and `sale_items`,
//! and the only caller of the inventory ledger's sale movements.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. CREATE (one transaction)                                           │
//! │     ├── conditional decrement + `sale` movement per line, in order     │
//! │     ├── sale header                                                    │
//! │     └── sale items (price/cost/name snapshot)                          │
//! │     → status completed (default) or pending                            │
//! │                                                                         │
//! │  2. (OPTIONAL) pending → completed                                     │
//! │                                                                         │
//! │  3. CANCEL (one transaction)                                           │
//! │     ├── restore + `cancellation` movement per line                     │
//! │     └── status cancelled (terminal)                                    │
//! │                                                                         │
//! │  Any failure rolls the whole transaction back: no half-applied sale    │
//! │  is ever visible, and a cancelled sale is never restored twice.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqliteExecutor, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::inventory::{decrement, fetch_record, increment};
use crate::repository::list_limit;
use furnish_core::pricing::{PricedLine, SaleTotals};
use furnish_core::validation::{validate_line_count, validate_notes, validate_quantity};
use furnish_core::{
    invoice_number, CoreError, Money, MovementReason, NewSale, Product, Sale, SaleFilter,
    SaleItem, SalePatch, SaleStatus, ValidationError,
};

const SALE_SELECT: &str = "SELECT id, invoice_number, customer_id, status, payment_status, \
     subtotal_cents, discount_cents, tax_cents, final_amount_cents, notes, \
     created_at, updated_at, completed_at, cancelled_at FROM sales";

const ITEM_SELECT: &str = "SELECT id, sale_id, line_number, product_id, name_snapshot, \
     quantity, unit_price_cents, unit_cost_cents, discount_cents, line_total_cents, \
     created_at FROM sale_items";

/// Repository for sale database operations.
///
/// ## Usage
/// ```rust,ignore
/// let sale = db.sales().create_sale(NewSale {
///     customer_id,
///     items: vec![NewSaleItem::new(&sofa.id, 1)],
///     ..Default::default()
/// }).await?;
///
/// db.sales().cancel_sale(&sale.id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

/// A validated, priced line waiting to be written.
struct PlannedLine {
    product: Product,
    quantity: i64,
    discount_cents: i64,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Creates a sale and decrements stock for every line, atomically.
    ///
    /// ## Steps
    /// 1. Customer must exist (`CustomerNotFound`)
    /// 2. At least one line (`EmptySale`)
    /// 3. Per line, in order: product exists and is active, stock covers the
    ///    quantity requested so far for that product. The first failing line
    ///    is reported (`ProductNotFound`, `InsufficientStock`).
    /// 4. Totals: `final_amount = Σ line_total − discount + tax`
    /// 5. One transaction: conditional decrements (all before the header),
    ///    header, items. A decrement that loses a race to another sale fails
    ///    the whole transaction with `InsufficientStock`.
    pub async fn create_sale(&self, input: NewSale) -> DbResult<Sale> {
        let status = input.status.unwrap_or_default();
        if status == SaleStatus::Cancelled {
            return Err(ValidationError::NotAllowed {
                field: "status".to_string(),
                allowed: vec![
                    SaleStatus::Pending.to_string(),
                    SaleStatus::Completed.to_string(),
                ],
            }
            .into());
        }
        validate_notes(input.notes.as_deref())?;

        // Steps 1-3 read through the pool. The transaction re-checks stock
        // atomically, so these checks only decide which error to report.
        let customer: Option<i64> = sqlx::query_scalar("SELECT 1 FROM customers WHERE id = ?1")
            .bind(&input.customer_id)
            .fetch_optional(&self.pool)
            .await?;
        if customer.is_none() {
            return Err(CoreError::CustomerNotFound(input.customer_id).into());
        }

        if input.items.is_empty() {
            return Err(CoreError::EmptySale.into());
        }
        validate_line_count(input.items.len())?;

        let mut planned = Vec::with_capacity(input.items.len());
        let mut requested_so_far: HashMap<String, i64> = HashMap::new();

        for item in &input.items {
            validate_quantity(item.quantity)?;

            let product = sqlx::query_as::<_, Product>(
                "SELECT id, code, name, description, unit_price_cents, unit_cost_cents, \
                 is_active, created_at, updated_at FROM products WHERE id = ?1",
            )
            .bind(&item.product_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(item.product_id.clone()))?;

            if !product.is_active {
                return Err(CoreError::ProductInactive(product.id).into());
            }

            let record = fetch_record(&self.pool, &product.id)
                .await?
                .ok_or_else(|| CoreError::InventoryNotFound(product.id.clone()))?;

            let requested = requested_so_far.entry(product.id.clone()).or_insert(0);
            *requested += item.quantity;
            if record.quantity_on_hand < *requested {
                warn!(
                    product_id = %product.id,
                    available = record.quantity_on_hand,
                    requested = *requested,
                    "Sale rejected: insufficient stock"
                );
                return Err(CoreError::InsufficientStock {
                    product_id: product.id,
                    available: record.quantity_on_hand,
                    requested: *requested,
                }
                .into());
            }

            planned.push(PlannedLine {
                product,
                quantity: item.quantity,
                discount_cents: item.discount_cents,
            });
        }

        let priced: Vec<PricedLine> = planned
            .iter()
            .map(|line| {
                PricedLine::new(
                    line.quantity,
                    line.product.unit_price(),
                    Money::from_cents(line.discount_cents),
                )
            })
            .collect();
        let (line_totals, totals) = SaleTotals::compute(
            &priced,
            Money::from_cents(input.discount_cents),
            Money::from_cents(input.tax_cents),
        )?;

        let now = Utc::now();
        let sale_id = Uuid::new_v4().to_string();
        let sale = Sale {
            id: sale_id.clone(),
            invoice_number: invoice_number(now, Uuid::new_v4()),
            customer_id: input.customer_id,
            status,
            payment_status: Default::default(),
            subtotal_cents: totals.subtotal.cents(),
            discount_cents: totals.discount.cents(),
            tax_cents: totals.tax.cents(),
            final_amount_cents: totals.final_amount.cents(),
            notes: input.notes,
            created_at: now,
            updated_at: now,
            completed_at: (status == SaleStatus::Completed).then_some(now),
            cancelled_at: None,
            items: planned
                .iter()
                .zip(&line_totals)
                .enumerate()
                .map(|(index, (line, total))| SaleItem {
                    id: Uuid::new_v4().to_string(),
                    sale_id: sale_id.clone(),
                    line_number: index as i64 + 1,
                    product_id: line.product.id.clone(),
                    name_snapshot: line.product.name.clone(),
                    quantity: line.quantity,
                    unit_price_cents: line.product.unit_price_cents,
                    unit_cost_cents: line.product.unit_cost_cents,
                    discount_cents: line.discount_cents,
                    line_total_cents: total.cents(),
                    created_at: now,
                })
                .collect(),
        };

        // Step 5. The first statement is a write, so the database lock is
        // held from here to commit.
        let mut tx = self.pool.begin().await?;

        for item in &sale.items {
            decrement(
                &mut *tx,
                &item.product_id,
                item.quantity,
                MovementReason::Sale,
                Some(sale.id.as_str()),
                None,
                now,
            )
            .await?;
        }

        insert_header(&mut *tx, &sale).await?;
        for item in &sale.items {
            insert_item(&mut *tx, item).await?;
        }

        tx.commit().await?;

        info!(
            sale_id = %sale.id,
            invoice = %sale.invoice_number,
            lines = sale.items.len(),
            final_amount = %sale.final_amount(),
            "Sale created"
        );
        Ok(sale)
    }

    /// Gets a sale with its items.
    ///
    /// ## Returns
    /// * `Ok(Some(Sale))` - Sale found
    /// * `Ok(None)` - Sale not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let mut conn = self.pool.acquire().await?;
        fetch_sale(&mut conn, id).await
    }

    /// Gets a sale by its invoice number.
    pub async fn get_by_invoice(&self, invoice_number: &str) -> DbResult<Option<Sale>> {
        let sql = format!("{SALE_SELECT} WHERE invoice_number = ?1");
        let header = sqlx::query_as::<_, Sale>(&sql)
            .bind(invoice_number)
            .fetch_optional(&self.pool)
            .await?;

        match header {
            Some(mut sale) => {
                sale.items = fetch_items(&self.pool, &sale.id).await?;
                Ok(Some(sale))
            }
            None => Ok(None),
        }
    }

    /// Lists sales, newest first, with their items.
    pub async fn list(&self, filter: SaleFilter) -> DbResult<Vec<Sale>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(SALE_SELECT);
        qb.push(" WHERE 1 = 1");
        if let Some(customer_id) = filter.customer_id {
            qb.push(" AND customer_id = ").push_bind(customer_id);
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(payment_status) = filter.payment_status {
            qb.push(" AND payment_status = ").push_bind(payment_status);
        }
        if let Some(from) = filter.from {
            qb.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            qb.push(" AND created_at <= ").push_bind(to);
        }
        qb.push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(list_limit(filter.limit));

        let mut sales = qb.build_query_as::<Sale>().fetch_all(&self.pool).await?;
        if sales.is_empty() {
            return Ok(sales);
        }

        let mut items_qb: QueryBuilder<Sqlite> = QueryBuilder::new(ITEM_SELECT);
        items_qb.push(" WHERE sale_id IN (");
        let mut ids = items_qb.separated(", ");
        for sale in &sales {
            ids.push_bind(sale.id.clone());
        }
        items_qb.push(") ORDER BY sale_id, line_number");

        let items = items_qb
            .build_query_as::<SaleItem>()
            .fetch_all(&self.pool)
            .await?;

        let mut by_sale: HashMap<String, Vec<SaleItem>> = HashMap::new();
        for item in items {
            by_sale.entry(item.sale_id.clone()).or_default().push(item);
        }
        for sale in &mut sales {
            sale.items = by_sale.remove(&sale.id).unwrap_or_default();
        }

        debug!(count = sales.len(), "Listed sales");
        Ok(sales)
    }

    /// Cancels a sale, restoring the stock of every line exactly once.
    ///
    /// ## Errors
    /// - `SaleNotFound`
    /// - `InvalidSaleStatus` if the sale is already cancelled; nothing is
    ///   restored a second time
    pub async fn cancel_sale(&self, sale_id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let current = lock_sale(&mut *tx, sale_id, now).await?;
        if current == SaleStatus::Cancelled {
            warn!(sale_id = %sale_id, "Sale already cancelled");
            return Err(CoreError::InvalidSaleStatus {
                sale_id: sale_id.to_string(),
                current_status: current.to_string(),
            }
            .into());
        }

        cancel_locked(&mut *tx, sale_id, now).await?;
        tx.commit().await?;

        info!(sale_id = %sale_id, "Sale cancelled");
        Ok(())
    }

    /// Moves a sale through its lifecycle.
    ///
    /// Permitted: `pending → completed`, `pending → cancelled`,
    /// `completed → cancelled`. Cancelling restores stock. Anything else fails
    /// with `InvalidTransition`.
    pub async fn update_sale_status(
        &self,
        sale_id: &str,
        new_status: SaleStatus,
        notes: Option<String>,
    ) -> DbResult<Sale> {
        validate_notes(notes.as_deref())?;

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let current = lock_sale(&mut *tx, sale_id, now).await?;
        current.transition_to(new_status)?;

        match new_status {
            SaleStatus::Cancelled => cancel_locked(&mut *tx, sale_id, now).await?,
            SaleStatus::Completed => {
                sqlx::query("UPDATE sales SET status = ?1, completed_at = ?2 WHERE id = ?3")
                    .bind(SaleStatus::Completed)
                    .bind(now)
                    .bind(sale_id)
                    .execute(&mut *tx)
                    .await?;
            }
            // Unreachable: nothing transitions into pending.
            SaleStatus::Pending => {}
        }

        if let Some(notes) = notes {
            sqlx::query("UPDATE sales SET notes = ?1 WHERE id = ?2")
                .bind(notes)
                .bind(sale_id)
                .execute(&mut *tx)
                .await?;
        }

        let sale = fetch_sale(&mut *tx, sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;
        tx.commit().await?;

        info!(sale_id = %sale_id, from = %current, to = %new_status, "Sale status updated");
        Ok(sale)
    }

    /// Edits the free-text fields of a sale. Lines are immutable.
    pub async fn update(&self, sale_id: &str, patch: SalePatch) -> DbResult<Sale> {
        validate_notes(patch.notes.as_deref())?;

        if let Some(notes) = patch.notes {
            let result = sqlx::query("UPDATE sales SET notes = ?1, updated_at = ?2 WHERE id = ?3")
                .bind(notes)
                .bind(Utc::now())
                .bind(sale_id)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(CoreError::SaleNotFound(sale_id.to_string()).into());
            }
        }

        self.get_by_id(sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()).into())
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

/// Touches the sale row to take the write lock, returning its status.
pub(crate) async fn lock_sale(
    conn: &mut SqliteConnection,
    sale_id: &str,
    now: DateTime<Utc>,
) -> DbResult<SaleStatus> {
    let status: Option<SaleStatus> =
        sqlx::query_scalar("UPDATE sales SET updated_at = ?1 WHERE id = ?2 RETURNING status")
            .bind(now)
            .bind(sale_id)
            .fetch_optional(&mut *conn)
            .await?;

    status.ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()).into())
}

/// Restores every line of a locked sale and marks it cancelled.
async fn cancel_locked(
    conn: &mut SqliteConnection,
    sale_id: &str,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let lines: Vec<(String, i64)> = sqlx::query_as(
        "SELECT product_id, quantity FROM sale_items WHERE sale_id = ?1 ORDER BY line_number",
    )
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?;

    for (product_id, quantity) in &lines {
        increment(
            &mut *conn,
            product_id,
            *quantity,
            MovementReason::Cancellation,
            Some(sale_id),
            None,
            now,
        )
        .await?;
    }

    sqlx::query("UPDATE sales SET status = ?1, cancelled_at = ?2 WHERE id = ?3")
        .bind(SaleStatus::Cancelled)
        .bind(now)
        .bind(sale_id)
        .execute(&mut *conn)
        .await?;

    debug!(sale_id = %sale_id, lines = lines.len(), "Stock restored for cancelled sale");
    Ok(())
}

async fn insert_header(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sales (
            id, invoice_number, customer_id, status, payment_status,
            subtotal_cents, discount_cents, tax_cents, final_amount_cents,
            notes, created_at, updated_at, completed_at, cancelled_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.invoice_number)
    .bind(&sale.customer_id)
    .bind(sale.status)
    .bind(sale.payment_status)
    .bind(sale.subtotal_cents)
    .bind(sale.discount_cents)
    .bind(sale.tax_cents)
    .bind(sale.final_amount_cents)
    .bind(&sale.notes)
    .bind(sale.created_at)
    .bind(sale.updated_at)
    .bind(sale.completed_at)
    .bind(sale.cancelled_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn insert_item(conn: &mut SqliteConnection, item: &SaleItem) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sale_items (
            id, sale_id, line_number, product_id, name_snapshot, quantity,
            unit_price_cents, unit_cost_cents, discount_cents, line_total_cents, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&item.id)
    .bind(&item.sale_id)
    .bind(item.line_number)
    .bind(&item.product_id)
    .bind(&item.name_snapshot)
    .bind(item.quantity)
    .bind(item.unit_price_cents)
    .bind(item.unit_cost_cents)
    .bind(item.discount_cents)
    .bind(item.line_total_cents)
    .bind(item.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Loads a sale header and its items on one connection.
pub(crate) async fn fetch_sale(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Sale>> {
    let sql = format!("{SALE_SELECT} WHERE id = ?1");
    let header = sqlx::query_as::<_, Sale>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match header {
        Some(mut sale) => {
            sale.items = fetch_items(&mut *conn, id).await?;
            Ok(Some(sale))
        }
        None => Ok(None),
    }
}

async fn fetch_items<'e, E>(executor: E, sale_id: &str) -> DbResult<Vec<SaleItem>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("{ITEM_SELECT} WHERE sale_id = ?1 ORDER BY line_number");
    let items = sqlx::query_as::<_, SaleItem>(&sql)
        .bind(sale_id)
        .fetch_all(executor)
        .await?;
    Ok(items)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};
    use crate::repository::test_support::*;
    use furnish_core::{Customer, InventoryMovement, MovementFilter, NewSaleItem};
    use proptest::prelude::*;
    use proptest::test_runner::TestCaseError;

    async fn stock(db: &Database, product_id: &str) -> i64 {
        db.inventory()
            .get(product_id)
            .await
            .unwrap()
            .unwrap()
            .quantity_on_hand
    }

    async fn sale_movements(db: &Database, sale_id: &str) -> Vec<InventoryMovement> {
        db.inventory()
            .list_movements(MovementFilter {
                sale_id: Some(sale_id.to_string()),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    fn one_line(customer: &Customer, product: &Product, quantity: i64) -> NewSale {
        NewSale {
            customer_id: customer.id.clone(),
            items: vec![NewSaleItem::new(&product.id, quantity)],
            ..Default::default()
        }
    }

    async fn sale_count(db: &Database) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_oversell_rejected_without_side_effects() {
        let db = test_db().await;
        let c = customer(&db).await;
        let p = product(&db, "SOFA-1", 100, 10).await;

        let err = db.sales().create_sale(one_line(&c, &p, 12)).await.unwrap_err();
        match err {
            DbError::Domain(CoreError::InsufficientStock {
                available,
                requested,
                ..
            }) => {
                assert_eq!(available, 10);
                assert_eq!(requested, 12);
            }
            other => panic!("expected insufficient stock, got {other:?}"),
        }

        assert_eq!(stock(&db, &p.id).await, 10);
        assert_eq!(sale_count(&db).await, 0);
    }

    #[tokio::test]
    async fn test_create_sale_decrements_and_records_movement() {
        let db = test_db().await;
        let c = customer(&db).await;
        let p = product(&db, "SOFA-1", 100, 10).await;

        let sale = db.sales().create_sale(one_line(&c, &p, 3)).await.unwrap();

        assert_eq!(sale.final_amount_cents, 300);
        assert_eq!(sale.status, SaleStatus::Completed);
        assert!(sale.completed_at.is_some());
        assert_eq!(sale.payment_status, furnish_core::PaymentStatus::Pending);
        assert!(sale.invoice_number.starts_with(furnish_core::INVOICE_PREFIX));
        assert_eq!(stock(&db, &p.id).await, 7);

        let movements = sale_movements(&db, &sale.id).await;
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].delta, -3);
        assert_eq!(movements[0].reason, MovementReason::Sale);
        assert_eq!(movements[0].product_id, p.id);
    }

    #[tokio::test]
    async fn test_cancel_restores_once() {
        let db = test_db().await;
        let c = customer(&db).await;
        let p = product(&db, "SOFA-1", 100, 10).await;
        let sale = db.sales().create_sale(one_line(&c, &p, 3)).await.unwrap();

        db.sales().cancel_sale(&sale.id).await.unwrap();
        assert_eq!(stock(&db, &p.id).await, 10);

        let movements = sale_movements(&db, &sale.id).await;
        assert_eq!(movements.len(), 2);
        assert_eq!(movements[0].reason, MovementReason::Cancellation);
        assert_eq!(movements[0].delta, 3);
        assert_eq!(movements.iter().map(|m| m.delta).sum::<i64>(), 0);

        let cancelled = db.sales().get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(cancelled.status, SaleStatus::Cancelled);
        assert!(cancelled.cancelled_at.is_some());

        let again = db.sales().cancel_sale(&sale.id).await.unwrap_err();
        assert!(matches!(
            again,
            DbError::Domain(CoreError::InvalidSaleStatus { .. })
        ));
        assert_eq!(sale_movements(&db, &sale.id).await.len(), 2);
        assert_eq!(stock(&db, &p.id).await, 10);
    }

    #[tokio::test]
    async fn test_round_trip_keeps_line_order_and_snapshots() {
        let db = test_db().await;
        let c = customer(&db).await;
        let chair = product(&db, "CHAIR", 2_500, 20).await;
        let table = product(&db, "TABLE", 40_000, 2).await;

        let created = db
            .sales()
            .create_sale(NewSale {
                customer_id: c.id.clone(),
                items: vec![
                    NewSaleItem::new(&table.id, 1),
                    NewSaleItem {
                        product_id: chair.id.clone(),
                        quantity: 4,
                        discount_cents: 1_000,
                    },
                ],
                discount_cents: 500,
                tax_cents: 4_800,
                notes: Some("deliver Friday".into()),
                status: None,
            })
            .await
            .unwrap();

        // 40_000 + (4 * 2_500 - 1_000) = 49_000
        assert_eq!(created.subtotal_cents, 49_000);
        assert_eq!(created.final_amount_cents, 49_000 - 500 + 4_800);

        // Later price changes do not touch the stored lines
        db.products()
            .update(
                &table.id,
                furnish_core::ProductPatch {
                    unit_price_cents: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let loaded = db.sales().get_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(loaded.items.len(), 2);
        assert_eq!(loaded.items[0].product_id, table.id);
        assert_eq!(loaded.items[0].line_number, 1);
        assert_eq!(loaded.items[0].unit_price_cents, 40_000);
        assert_eq!(loaded.items[0].unit_cost_cents, 20_000);
        assert_eq!(loaded.items[0].name_snapshot, "Product TABLE");
        assert_eq!(loaded.items[1].product_id, chair.id);
        assert_eq!(loaded.items[1].line_total_cents, 9_000);
        assert_eq!(loaded.notes.as_deref(), Some("deliver Friday"));

        let by_invoice = db
            .sales()
            .get_by_invoice(&created.invoice_number)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_invoice.id, created.id);
        assert_eq!(by_invoice.items.len(), 2);
    }

    #[tokio::test]
    async fn test_failing_later_line_rolls_back_earlier_lines() {
        let db = test_db().await;
        let c = customer(&db).await;
        let a = product(&db, "A", 100, 5).await;
        let b = product(&db, "B", 100, 1).await;

        let err = db
            .sales()
            .create_sale(NewSale {
                customer_id: c.id.clone(),
                items: vec![NewSaleItem::new(&a.id, 2), NewSaleItem::new(&b.id, 2)],
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { ref product_id, .. }) if *product_id == b.id
        ));
        assert_eq!(stock(&db, &a.id).await, 5);
        assert_eq!(stock(&db, &b.id).await, 1);
    }

    #[tokio::test]
    async fn test_repeated_product_lines_are_cumulative() {
        let db = test_db().await;
        let c = customer(&db).await;
        let p = product(&db, "STOOL", 1_000, 5).await;

        let err = db
            .sales()
            .create_sale(NewSale {
                customer_id: c.id.clone(),
                items: vec![NewSaleItem::new(&p.id, 3), NewSaleItem::new(&p.id, 3)],
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock {
                available: 5,
                requested: 6,
                ..
            })
        ));

        let sale = db
            .sales()
            .create_sale(NewSale {
                customer_id: c.id.clone(),
                items: vec![NewSaleItem::new(&p.id, 3), NewSaleItem::new(&p.id, 2)],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(sale.items.len(), 2);
        assert_eq!(stock(&db, &p.id).await, 0);
        assert_eq!(sale_movements(&db, &sale.id).await.len(), 2);
    }

    #[tokio::test]
    async fn test_create_sale_rejections() {
        let db = test_db().await;
        let c = customer(&db).await;
        let p = product(&db, "LAMP", 1_000, 5).await;
        let sales = db.sales();

        let empty = sales
            .create_sale(NewSale {
                customer_id: c.id.clone(),
                ..Default::default()
            })
            .await;
        assert!(matches!(empty, Err(DbError::Domain(CoreError::EmptySale))));

        let unknown_customer = sales
            .create_sale(NewSale {
                customer_id: "nobody".into(),
                items: vec![NewSaleItem::new(&p.id, 1)],
                ..Default::default()
            })
            .await;
        assert!(matches!(
            unknown_customer,
            Err(DbError::Domain(CoreError::CustomerNotFound(_)))
        ));

        let unknown_product = sales
            .create_sale(NewSale {
                customer_id: c.id.clone(),
                items: vec![NewSaleItem::new("ghost", 1)],
                ..Default::default()
            })
            .await;
        assert!(matches!(
            unknown_product,
            Err(DbError::Domain(CoreError::ProductNotFound(_)))
        ));

        let zero_quantity = sales.create_sale(one_line(&c, &p, 0)).await;
        assert!(matches!(
            zero_quantity,
            Err(DbError::Domain(CoreError::Validation(_)))
        ));

        let born_cancelled = sales
            .create_sale(NewSale {
                status: Some(SaleStatus::Cancelled),
                ..one_line(&c, &p, 1)
            })
            .await;
        assert!(matches!(
            born_cancelled,
            Err(DbError::Domain(CoreError::Validation(_)))
        ));

        let huge_tax = sales
            .create_sale(NewSale {
                tax_cents: i64::MAX,
                ..one_line(&c, &p, 1)
            })
            .await;
        assert!(matches!(
            huge_tax,
            Err(DbError::Domain(CoreError::Validation(
                furnish_core::ValidationError::OutOfRange { .. }
            )))
        ));

        db.products()
            .update(
                &p.id,
                furnish_core::ProductPatch {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let inactive = sales.create_sale(one_line(&c, &p, 1)).await;
        assert!(matches!(
            inactive,
            Err(DbError::Domain(CoreError::ProductInactive(_)))
        ));

        assert_eq!(stock(&db, &p.id).await, 5);
        assert_eq!(sale_count(&db).await, 0);
    }

    #[tokio::test]
    async fn test_pending_sale_lifecycle() {
        let db = test_db().await;
        let c = customer(&db).await;
        let p = product(&db, "DESK", 30_000, 4).await;

        let sale = db
            .sales()
            .create_sale(NewSale {
                status: Some(SaleStatus::Pending),
                ..one_line(&c, &p, 1)
            })
            .await
            .unwrap();
        assert_eq!(sale.status, SaleStatus::Pending);
        assert!(sale.completed_at.is_none());
        // Pending sales already hold their stock
        assert_eq!(stock(&db, &p.id).await, 3);

        let completed = db
            .sales()
            .update_sale_status(&sale.id, SaleStatus::Completed, Some("picked up".into()))
            .await
            .unwrap();
        assert_eq!(completed.status, SaleStatus::Completed);
        assert!(completed.completed_at.is_some());
        assert_eq!(completed.notes.as_deref(), Some("picked up"));

        let back = db
            .sales()
            .update_sale_status(&sale.id, SaleStatus::Pending, None)
            .await;
        assert!(matches!(
            back,
            Err(DbError::Domain(CoreError::InvalidTransition { .. }))
        ));

        let cancelled = db
            .sales()
            .update_sale_status(&sale.id, SaleStatus::Cancelled, None)
            .await
            .unwrap();
        assert_eq!(cancelled.status, SaleStatus::Cancelled);
        assert_eq!(stock(&db, &p.id).await, 4);

        let reopen = db
            .sales()
            .update_sale_status(&sale.id, SaleStatus::Completed, None)
            .await;
        assert!(matches!(
            reopen,
            Err(DbError::Domain(CoreError::InvalidTransition { .. }))
        ));
        assert_eq!(stock(&db, &p.id).await, 4);
    }

    #[tokio::test]
    async fn test_missing_sale_operations() {
        let db = test_db().await;
        assert!(db.sales().get_by_id("missing").await.unwrap().is_none());
        assert!(matches!(
            db.sales().cancel_sale("missing").await,
            Err(DbError::Domain(CoreError::SaleNotFound(_)))
        ));
        assert!(matches!(
            db.sales()
                .update_sale_status("missing", SaleStatus::Cancelled, None)
                .await,
            Err(DbError::Domain(CoreError::SaleNotFound(_)))
        ));
        assert!(matches!(
            db.sales()
                .update("missing", SalePatch { notes: Some("x".into()) })
                .await,
            Err(DbError::Domain(CoreError::SaleNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_list_filters_newest_first() {
        let db = test_db().await;
        let c = customer(&db).await;
        let p = product(&db, "VASE", 500, 50).await;

        let first = db.sales().create_sale(one_line(&c, &p, 1)).await.unwrap();
        let second = db.sales().create_sale(one_line(&c, &p, 2)).await.unwrap();
        db.sales().cancel_sale(&first.id).await.unwrap();

        let all = db.sales().list(SaleFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);
        assert_eq!(all[0].items.len(), 1);
        assert_eq!(all[1].items[0].quantity, 1);

        let cancelled = db
            .sales()
            .list(SaleFilter {
                status: Some(SaleStatus::Cancelled),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].id, first.id);

        let limited = db
            .sales()
            .list(SaleFilter {
                limit: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);

        let updated = db
            .sales()
            .update(&second.id, SalePatch { notes: Some("gift wrap".into()) })
            .await
            .unwrap();
        assert_eq!(updated.notes.as_deref(), Some("gift wrap"));
        assert_eq!(updated.items.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_sales_never_oversell() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(
            DbConfig::new(dir.path().join("concurrency.db"))
                .max_connections(8)
                .busy_timeout(std::time::Duration::from_secs(30)),
        )
        .await
        .unwrap();
        let c = customer(&db).await;
        let p = product(&db, "LAST-ONES", 1_000, 5).await;

        let mut handles = Vec::new();
        for _ in 0..20 {
            let sales = db.sales();
            let input = one_line(&c, &p, 1);
            handles.push(tokio::spawn(async move { sales.create_sale(input).await }));
        }

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(DbError::Domain(CoreError::InsufficientStock { .. })) => {}
                Err(DbError::Busy(_)) => {}
                Err(other) => panic!("unexpected failure: {other:?}"),
            }
        }

        let remaining = stock(&db, &p.id).await;
        assert_eq!(succeeded, 5 - remaining);
        assert!(remaining >= 0);
        assert_eq!(sale_count(&db).await, succeeded);

        let ledger_sum: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(delta), 0) FROM inventory_movements WHERE product_id = ?1",
        )
        .bind(&p.id)
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(ledger_sum, remaining);

        db.close().await;
    }

    const OPENING_STOCK: i64 = 6;

    /// One step of a create/cancel run: create a sale of `quantity` units of
    /// product `pick % 3` (plus one unit of the next product when
    /// `two_lines`), or cancel the open sale at `pick % open.len()`.
    #[derive(Debug, Clone)]
    enum Step {
        Create { pick: usize, quantity: i64, two_lines: bool },
        Cancel { pick: usize },
    }

    fn step_strategy() -> impl Strategy<Value = Step> {
        prop_oneof![
            3 => (0usize..3, 1i64..5, any::<bool>())
                .prop_map(|(pick, quantity, two_lines)| Step::Create { pick, quantity, two_lines }),
            2 => (0usize..8).prop_map(|pick| Step::Cancel { pick }),
        ]
    }

    async fn run_steps(steps: Vec<Step>) -> Result<(), TestCaseError> {
        let db = test_db().await;
        let c = customer(&db).await;
        let mut products = Vec::new();
        for code in ["SEQ-A", "SEQ-B", "SEQ-C"] {
            products.push(product(&db, code, 1_000, OPENING_STOCK).await);
        }
        // Open sales and the units each one holds, per product index.
        let mut open: Vec<(String, [i64; 3])> = Vec::new();

        for step in steps {
            match step {
                Step::Create { pick, quantity, two_lines } => {
                    let first = pick % 3;
                    let mut held = [0i64; 3];
                    let mut items = vec![NewSaleItem::new(&products[first].id, quantity)];
                    held[first] += quantity;
                    if two_lines {
                        let second = (pick + 1) % 3;
                        items.push(NewSaleItem::new(&products[second].id, 1));
                        held[second] += 1;
                    }
                    let result = db
                        .sales()
                        .create_sale(NewSale {
                            customer_id: c.id.clone(),
                            items,
                            ..Default::default()
                        })
                        .await;
                    match result {
                        Ok(sale) => open.push((sale.id, held)),
                        Err(DbError::Domain(CoreError::InsufficientStock { .. })) => {}
                        Err(other) => {
                            return Err(TestCaseError::fail(format!("create failed: {other:?}")))
                        }
                    }
                }
                Step::Cancel { pick } => {
                    if open.is_empty() {
                        continue;
                    }
                    let (sale_id, _) = open.remove(pick % open.len());
                    if let Err(e) = db.sales().cancel_sale(&sale_id).await {
                        return Err(TestCaseError::fail(format!("cancel failed: {e:?}")));
                    }
                }
            }

            for (index, p) in products.iter().enumerate() {
                let on_hand = stock(&db, &p.id).await;
                let ledger: i64 = sqlx::query_scalar(
                    "SELECT COALESCE(SUM(delta), 0) FROM inventory_movements WHERE product_id = ?1",
                )
                .bind(&p.id)
                .fetch_one(db.pool())
                .await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
                let held: i64 = open.iter().map(|(_, held)| held[index]).sum();

                prop_assert!(on_hand >= 0);
                prop_assert_eq!(on_hand, ledger);
                prop_assert_eq!(on_hand, OPENING_STOCK - held);
            }
        }
        Ok(())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_create_cancel_sequences_keep_stock_consistent(
            steps in prop::collection::vec(step_strategy(), 1..25),
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(run_steps(steps))?;
        }
    }
}
