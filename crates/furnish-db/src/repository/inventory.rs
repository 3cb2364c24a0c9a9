//! # Inventory Repository
//!
//! The inventory ledger: the only code that writes `inventory.quantity_on_hand`,
//! and the only writer of the `inventory_movements` audit log.
//!
//! ## Stock Decrement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Check-and-decrement in ONE statement                 │
//! │                                                                         │
//! │  ❌ WRONG: read, compare, write                                        │
//! │     SELECT quantity_on_hand ...        (two sales both read 10)        │
//! │     UPDATE ... SET quantity_on_hand = 10 - 8                           │
//! │                                                                         │
//! │  ✅ CORRECT: conditional update                                         │
//! │     UPDATE inventory                                                    │
//! │        SET quantity_on_hand = quantity_on_hand - :qty                   │
//! │      WHERE product_id = :id AND quantity_on_hand >= :qty               │
//! │                                                                         │
//! │     rows_affected = 1 → decremented, write the movement row            │
//! │     rows_affected = 0 → InsufficientStock (or no inventory record)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every change to `quantity_on_hand` writes exactly one movement row with
//! the same signed delta, in the same transaction.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqliteExecutor, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::list_limit;
use furnish_core::validation::{validate_notes, validate_quantity, validate_stock_level};
use furnish_core::{
    CoreError, InventoryMovement, InventoryRecord, InventorySettingsPatch, MovementFilter,
    MovementReason, StockAdjustment, ValidationError, MAX_STOCK_QUANTITY,
};

const RECORD_SELECT: &str = "SELECT product_id, quantity_on_hand, quantity_reserved, \
     reorder_level, reorder_quantity, last_count_at, updated_at FROM inventory";

const MOVEMENT_SELECT: &str =
    "SELECT id, product_id, delta, reason, sale_id, notes, created_at FROM inventory_movements";

/// Repository for the inventory ledger.
///
/// ## Usage
/// ```rust,ignore
/// let inventory = db.inventory();
///
/// // Goods received
/// inventory.adjust(&product_id, StockAdjustment::Delta(12), MovementReason::Restock, None).await?;
///
/// // What needs reordering, most urgent first
/// let low = inventory.list_low_stock().await?;
/// ```
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    /// Creates a new InventoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// Gets the inventory record of a product.
    pub async fn get(&self, product_id: &str) -> DbResult<Option<InventoryRecord>> {
        fetch_record(&self.pool, product_id).await
    }

    /// Atomically checks `quantity_on_hand >= quantity` and decrements.
    ///
    /// ## Errors
    /// - `InsufficientStock` with the available and requested quantities
    /// - `InventoryNotFound` if the product has no inventory record
    pub async fn reserve_and_decrement(
        &self,
        product_id: &str,
        quantity: i64,
        reason: MovementReason,
        sale_id: Option<&str>,
    ) -> DbResult<InventoryRecord> {
        validate_quantity(quantity)?;

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        decrement(&mut *tx, product_id, quantity, reason, sale_id, None, now).await?;
        let record = require_record(&mut *tx, product_id).await?;
        tx.commit().await?;

        Ok(record)
    }

    /// Increments stock and writes an offsetting movement.
    ///
    /// No deduplication happens here; the sale workflow guarantees a sale is
    /// restored at most once.
    pub async fn restore(
        &self,
        product_id: &str,
        quantity: i64,
        reason: MovementReason,
        sale_id: Option<&str>,
    ) -> DbResult<InventoryRecord> {
        validate_quantity(quantity)?;

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        increment(&mut *tx, product_id, quantity, reason, sale_id, None, now).await?;
        let record = require_record(&mut *tx, product_id).await?;
        tx.commit().await?;

        Ok(record)
    }

    /// Sets the counted quantity on hand (stock take).
    ///
    /// Stamps `last_count_at`. A count equal to the current quantity writes no
    /// movement.
    pub async fn manual_adjust(
        &self,
        product_id: &str,
        new_quantity_on_hand: i64,
        reason: MovementReason,
        notes: Option<&str>,
    ) -> DbResult<InventoryRecord> {
        self.adjust(
            product_id,
            StockAdjustment::Absolute(new_quantity_on_hand),
            reason,
            notes,
        )
        .await
    }

    /// Applies a manual stock change, either relative or absolute.
    ///
    /// ## Rules
    /// - `reason` must be `adjustment` or `restock`
    /// - a relative change of zero is rejected
    /// - the result may not go below zero (`InsufficientStock`)
    pub async fn adjust(
        &self,
        product_id: &str,
        adjustment: StockAdjustment,
        reason: MovementReason,
        notes: Option<&str>,
    ) -> DbResult<InventoryRecord> {
        if !reason.is_manual() {
            return Err(ValidationError::NotAllowed {
                field: "reason".to_string(),
                allowed: vec![
                    MovementReason::Adjustment.to_string(),
                    MovementReason::Restock.to_string(),
                ],
            }
            .into());
        }
        match adjustment {
            StockAdjustment::Delta(0) => {
                return Err(ValidationError::MustNotBeZero {
                    field: "delta".to_string(),
                }
                .into())
            }
            StockAdjustment::Absolute(n) => validate_stock_level("quantity_on_hand", n)?,
            StockAdjustment::Delta(d) if !(-MAX_STOCK_QUANTITY..=MAX_STOCK_QUANTITY).contains(&d) => {
                return Err(ValidationError::OutOfRange {
                    field: "delta".to_string(),
                    min: -MAX_STOCK_QUANTITY,
                    max: MAX_STOCK_QUANTITY,
                }
                .into())
            }
            StockAdjustment::Delta(_) => {}
        }
        validate_notes(notes)?;

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        // Take the write lock before reading the current quantity.
        let touched = sqlx::query("UPDATE inventory SET updated_at = ?1 WHERE product_id = ?2")
            .bind(now)
            .bind(product_id)
            .execute(&mut *tx)
            .await?;
        if touched.rows_affected() == 0 {
            return Err(missing_record_error(&mut *tx, product_id).await?.into());
        }

        let current = require_record(&mut *tx, product_id).await?;
        let delta = adjustment.delta_from(current.quantity_on_hand);
        let new_quantity = current.quantity_on_hand.saturating_add(delta);
        if new_quantity > MAX_STOCK_QUANTITY {
            return Err(ValidationError::OutOfRange {
                field: "quantity_on_hand".to_string(),
                min: 0,
                max: MAX_STOCK_QUANTITY,
            }
            .into());
        }

        if new_quantity < 0 {
            warn!(product_id = %product_id, delta, "Adjustment would make stock negative");
            return Err(CoreError::InsufficientStock {
                product_id: product_id.to_string(),
                available: current.quantity_on_hand,
                requested: -delta,
            }
            .into());
        }

        if delta != 0 {
            sqlx::query("UPDATE inventory SET quantity_on_hand = ?1 WHERE product_id = ?2")
                .bind(new_quantity)
                .bind(product_id)
                .execute(&mut *tx)
                .await?;
            insert_movement(&mut *tx, product_id, delta, reason, None, notes, now).await?;
        }

        if matches!(adjustment, StockAdjustment::Absolute(_)) {
            sqlx::query("UPDATE inventory SET last_count_at = ?1 WHERE product_id = ?2")
                .bind(now)
                .bind(product_id)
                .execute(&mut *tx)
                .await?;
        }

        let record = require_record(&mut *tx, product_id).await?;
        tx.commit().await?;

        info!(
            product_id = %product_id,
            delta,
            reason = %reason,
            quantity_on_hand = record.quantity_on_hand,
            "Inventory adjusted"
        );
        Ok(record)
    }

    /// Updates reorder thresholds and the reserved quantity.
    ///
    /// Absent fields are left untouched. Never changes `quantity_on_hand`.
    pub async fn update_settings(
        &self,
        product_id: &str,
        patch: InventorySettingsPatch,
    ) -> DbResult<InventoryRecord> {
        if let Some(v) = patch.reorder_level {
            validate_stock_level("reorder_level", v)?;
        }
        if let Some(v) = patch.reorder_quantity {
            validate_stock_level("reorder_quantity", v)?;
        }
        if let Some(v) = patch.quantity_reserved {
            validate_stock_level("quantity_reserved", v)?;
        }

        if patch.is_empty() {
            return fetch_record(&self.pool, product_id)
                .await?
                .ok_or_else(|| CoreError::InventoryNotFound(product_id.to_string()).into());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE inventory SET updated_at = ");
        qb.push_bind(Utc::now());
        if let Some(v) = patch.reorder_level {
            qb.push(", reorder_level = ").push_bind(v);
        }
        if let Some(v) = patch.reorder_quantity {
            qb.push(", reorder_quantity = ").push_bind(v);
        }
        if let Some(v) = patch.quantity_reserved {
            qb.push(", quantity_reserved = ").push_bind(v);
        }
        qb.push(" WHERE product_id = ").push_bind(product_id);

        let result = qb.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::InventoryNotFound(product_id.to_string()).into());
        }

        debug!(product_id = %product_id, "Inventory settings updated");
        fetch_record(&self.pool, product_id)
            .await?
            .ok_or_else(|| CoreError::InventoryNotFound(product_id.to_string()).into())
    }

    /// Records at or below their reorder level, most urgent first.
    ///
    /// Ordered by shortfall (`reorder_level − quantity_on_hand`) descending,
    /// ties broken by product id. Inactive products are left out.
    pub async fn list_low_stock(&self) -> DbResult<Vec<InventoryRecord>> {
        let records = sqlx::query_as::<_, InventoryRecord>(
            r#"
            SELECT i.product_id, i.quantity_on_hand, i.quantity_reserved,
                   i.reorder_level, i.reorder_quantity, i.last_count_at, i.updated_at
            FROM inventory i
            INNER JOIN products p ON p.id = i.product_id
            WHERE p.is_active = 1
              AND i.quantity_on_hand <= i.reorder_level
            ORDER BY (i.reorder_level - i.quantity_on_hand) DESC, i.product_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        debug!(count = records.len(), "Low stock records");
        Ok(records)
    }

    /// Movement log, newest first.
    pub async fn list_movements(&self, filter: MovementFilter) -> DbResult<Vec<InventoryMovement>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(MOVEMENT_SELECT);
        qb.push(" WHERE 1 = 1");
        if let Some(product_id) = filter.product_id {
            qb.push(" AND product_id = ").push_bind(product_id);
        }
        if let Some(reason) = filter.reason {
            qb.push(" AND reason = ").push_bind(reason);
        }
        if let Some(sale_id) = filter.sale_id {
            qb.push(" AND sale_id = ").push_bind(sale_id);
        }
        qb.push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(list_limit(filter.limit));

        let movements = qb
            .build_query_as::<InventoryMovement>()
            .fetch_all(&self.pool)
            .await?;

        Ok(movements)
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================
// These run on a connection the caller already holds inside a transaction.

pub(crate) async fn fetch_record<'e, E>(
    executor: E,
    product_id: &str,
) -> DbResult<Option<InventoryRecord>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("{RECORD_SELECT} WHERE product_id = ?1");
    let record = sqlx::query_as::<_, InventoryRecord>(&sql)
        .bind(product_id)
        .fetch_optional(executor)
        .await?;
    Ok(record)
}

async fn require_record<'e, E>(executor: E, product_id: &str) -> DbResult<InventoryRecord>
where
    E: SqliteExecutor<'e>,
{
    fetch_record(executor, product_id)
        .await?
        .ok_or_else(|| CoreError::InventoryNotFound(product_id.to_string()).into())
}

/// Distinguishes a missing product from a product without inventory.
async fn missing_record_error(conn: &mut SqliteConnection, product_id: &str) -> DbResult<CoreError> {
    let product: Option<i64> = sqlx::query_scalar("SELECT 1 FROM products WHERE id = ?1")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(match product {
        Some(_) => CoreError::InventoryNotFound(product_id.to_string()),
        None => CoreError::ProductNotFound(product_id.to_string()),
    })
}

/// Conditional decrement plus its movement row.
pub(crate) async fn decrement(
    conn: &mut SqliteConnection,
    product_id: &str,
    quantity: i64,
    reason: MovementReason,
    sale_id: Option<&str>,
    notes: Option<&str>,
    now: DateTime<Utc>,
) -> DbResult<()> {
    debug!(product_id = %product_id, quantity, "Decrementing stock");

    let result = sqlx::query(
        r#"
        UPDATE inventory
        SET quantity_on_hand = quantity_on_hand - ?1,
            updated_at = ?2
        WHERE product_id = ?3 AND quantity_on_hand >= ?1
        "#,
    )
    .bind(quantity)
    .bind(now)
    .bind(product_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let available: Option<i64> =
            sqlx::query_scalar("SELECT quantity_on_hand FROM inventory WHERE product_id = ?1")
                .bind(product_id)
                .fetch_optional(&mut *conn)
                .await?;

        return Err(match available {
            Some(available) => {
                warn!(
                    product_id = %product_id,
                    available,
                    requested = quantity,
                    "Insufficient stock"
                );
                CoreError::InsufficientStock {
                    product_id: product_id.to_string(),
                    available,
                    requested: quantity,
                }
            }
            None => missing_record_error(conn, product_id).await?,
        }
        .into());
    }

    insert_movement(conn, product_id, -quantity, reason, sale_id, notes, now).await?;
    Ok(())
}

/// Increment plus its movement row.
pub(crate) async fn increment(
    conn: &mut SqliteConnection,
    product_id: &str,
    quantity: i64,
    reason: MovementReason,
    sale_id: Option<&str>,
    notes: Option<&str>,
    now: DateTime<Utc>,
) -> DbResult<()> {
    debug!(product_id = %product_id, quantity, "Restoring stock");

    let result = sqlx::query(
        r#"
        UPDATE inventory
        SET quantity_on_hand = quantity_on_hand + ?1,
            updated_at = ?2
        WHERE product_id = ?3
        "#,
    )
    .bind(quantity)
    .bind(now)
    .bind(product_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(missing_record_error(conn, product_id).await?.into());
    }

    insert_movement(conn, product_id, quantity, reason, sale_id, notes, now).await?;
    Ok(())
}

pub(crate) async fn insert_movement(
    conn: &mut SqliteConnection,
    product_id: &str,
    delta: i64,
    reason: MovementReason,
    sale_id: Option<&str>,
    notes: Option<&str>,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO inventory_movements (id, product_id, delta, reason, sale_id, notes, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(product_id)
    .bind(delta)
    .bind(reason)
    .bind(sale_id)
    .bind(notes)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
