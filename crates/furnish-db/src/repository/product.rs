//! # Product Repository
//!
//! The catalog: identity and pricing source of truth for products.
//!
//! ## Product Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  insert(NewProduct)  ── one transaction ──┐                             │
//! │     ├── products row                      │                             │
//! │     ├── inventory row (1:1)               │                             │
//! │     └── restock movement (opening stock)  │                             │
//! │                                           ▼                             │
//! │  update(ProductPatch)  price/cost/name/active flag                      │
//! │     └── existing sale lines keep their price snapshot                   │
//! │                                                                         │
//! │  Products are never deleted; deactivate with is_active = false.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::inventory::insert_movement;
use crate::repository::list_limit;
use furnish_core::validation::{
    validate_name, validate_notes, validate_price_cents, validate_product_code,
    validate_stock_level,
};
use furnish_core::{
    CoreError, MovementReason, NewProduct, Product, ProductPatch, DEFAULT_REORDER_LEVEL,
    DEFAULT_REORDER_QUANTITY,
};

const PRODUCT_SELECT: &str = "SELECT id, code, name, description, unit_price_cents, \
     unit_cost_cents, is_active, created_at, updated_at FROM products";

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Creates a product together with its inventory record.
    ///
    /// ## Returns
    /// * `Ok(Product)` - Inserted product
    /// * `Err(DbError::UniqueViolation)` - code already exists
    pub async fn insert(&self, input: NewProduct) -> DbResult<Product> {
        validate_product_code(&input.code)?;
        validate_name("name", &input.name)?;
        validate_notes(input.description.as_deref())?;
        validate_price_cents("unit_price", input.unit_price_cents)?;
        validate_price_cents("unit_cost", input.unit_cost_cents)?;
        validate_stock_level("opening_stock", input.opening_stock)?;

        let reorder_level = input.reorder_level.unwrap_or(DEFAULT_REORDER_LEVEL);
        let reorder_quantity = input.reorder_quantity.unwrap_or(DEFAULT_REORDER_QUANTITY);
        validate_stock_level("reorder_level", reorder_level)?;
        validate_stock_level("reorder_quantity", reorder_quantity)?;

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            code: input.code.trim().to_string(),
            name: input.name.trim().to_string(),
            description: input.description,
            unit_price_cents: input.unit_price_cents,
            unit_cost_cents: input.unit_cost_cents,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(code = %product.code, "Inserting product");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO products (
                id, code, name, description,
                unit_price_cents, unit_cost_cents, is_active,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&product.id)
        .bind(&product.code)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.unit_price_cents)
        .bind(product.unit_cost_cents)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("code", &product.code),
            other => other,
        })?;

        sqlx::query(
            r#"
            INSERT INTO inventory (
                product_id, quantity_on_hand, quantity_reserved,
                reorder_level, reorder_quantity, updated_at
            ) VALUES (?1, ?2, 0, ?3, ?4, ?5)
            "#,
        )
        .bind(&product.id)
        .bind(input.opening_stock)
        .bind(reorder_level)
        .bind(reorder_quantity)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if input.opening_stock > 0 {
            insert_movement(
                &mut *tx,
                &product.id,
                input.opening_stock,
                MovementReason::Restock,
                None,
                Some("opening stock"),
                now,
            )
            .await?;
        }

        tx.commit().await?;

        info!(id = %product.id, code = %product.code, "Product created");
        Ok(product)
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("{PRODUCT_SELECT} WHERE id = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Gets a product by its business code.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Product>> {
        let sql = format!("{PRODUCT_SELECT} WHERE code = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(code.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Lists active products sorted by name.
    pub async fn list_active(&self, limit: Option<u32>) -> DbResult<Vec<Product>> {
        let sql = format!("{PRODUCT_SELECT} WHERE is_active = 1 ORDER BY name, code LIMIT ?1");
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(list_limit(limit))
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    /// Applies a partial update. Absent fields are left untouched.
    ///
    /// Price and cost changes only affect future sales.
    pub async fn update(&self, id: &str, patch: ProductPatch) -> DbResult<Product> {
        if let Some(name) = &patch.name {
            validate_name("name", name)?;
        }
        validate_notes(patch.description.as_deref())?;
        if let Some(price) = patch.unit_price_cents {
            validate_price_cents("unit_price", price)?;
        }
        if let Some(cost) = patch.unit_cost_cents {
            validate_price_cents("unit_cost", cost)?;
        }

        if !patch.is_empty() {
            debug!(id = %id, "Updating product");

            let mut qb: QueryBuilder<Sqlite> =
                QueryBuilder::new("UPDATE products SET updated_at = ");
            qb.push_bind(Utc::now());
            if let Some(name) = patch.name {
                qb.push(", name = ").push_bind(name.trim().to_string());
            }
            if let Some(description) = patch.description {
                qb.push(", description = ").push_bind(description);
            }
            if let Some(price) = patch.unit_price_cents {
                qb.push(", unit_price_cents = ").push_bind(price);
            }
            if let Some(cost) = patch.unit_cost_cents {
                qb.push(", unit_cost_cents = ").push_bind(cost);
            }
            if let Some(active) = patch.is_active {
                qb.push(", is_active = ").push_bind(active);
            }
            qb.push(" WHERE id = ").push_bind(id);

            let result = qb.build().execute(&self.pool).await?;
            if result.rows_affected() == 0 {
                return Err(CoreError::ProductNotFound(id.to_string()).into());
            }
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(id.to_string()).into())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
