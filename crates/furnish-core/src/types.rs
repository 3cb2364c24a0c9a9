//! # Domain Types
//!
//! Core domain types used throughout the back office.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐  1:1  ┌─────────────────┐  1:N  ┌──────────────┐  │
//! │  │    Product      │──────►│ InventoryRecord │──────►│  Inventory   │  │
//! │  │  code, price,   │       │ on_hand ≥ 0     │       │  Movement    │  │
//! │  │  cost, active   │       │ reorder level   │       │ (append-only)│  │
//! │  └────────┬────────┘       └─────────────────┘       └──────┬───────┘  │
//! │           │ snapshot                                        │ sale_id  │
//! │  ┌────────▼────────┐  N:1  ┌─────────────────┐  1:N  ┌──────▼───────┐  │
//! │  │    SaleItem     │──────►│      Sale       │◄──────│   Payment    │  │
//! │  │  qty, price,    │       │ status          │       │ amount,      │  │
//! │  │  line_total     │       │ payment_status  │       │ method,      │  │
//! │  └─────────────────┘       │ (derived)       │       │ status       │  │
//! │                            └─────────────────┘       └──────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (product `code`, sale `invoice_number`) - human-readable

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::INVOICE_PREFIX;

// =============================================================================
// Customer
// =============================================================================

/// A customer that sales are billed to.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Input for creating a customer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewCustomer {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

// =============================================================================
// Product
// =============================================================================

/// A catalog product.
///
/// Price and cost are copied onto each sale line at sale time; editing them
/// here never rewrites history.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Business identifier printed on tags (e.g. `SOFA-3S-GRY`).
    pub code: String,

    pub name: String,

    pub description: Option<String>,

    /// Selling price in cents.
    pub unit_price_cents: i64,

    /// Purchase cost in cents (for margin reporting).
    pub unit_cost_cents: i64,

    /// Inactive products stay referenced by old sales but cannot be sold.
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn unit_cost(&self) -> Money {
        Money::from_cents(self.unit_cost_cents)
    }
}

/// Input for creating a product together with its inventory record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewProduct {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub unit_price_cents: i64,
    pub unit_cost_cents: i64,
    /// Stock on hand when the product is added; recorded as a restock.
    pub opening_stock: i64,
    /// Defaults to [`crate::DEFAULT_REORDER_LEVEL`].
    pub reorder_level: Option<i64>,
    /// Defaults to [`crate::DEFAULT_REORDER_QUANTITY`].
    pub reorder_quantity: Option<i64>,
}

/// Partial product update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub unit_price_cents: Option<i64>,
    pub unit_cost_cents: Option<i64>,
    pub is_active: Option<bool>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.unit_price_cents.is_none()
            && self.unit_cost_cents.is_none()
            && self.is_active.is_none()
    }
}

// =============================================================================
// Inventory
// =============================================================================

/// Current stock state for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryRecord {
    pub product_id: String,
    /// Never negative at the end of a transaction.
    pub quantity_on_hand: i64,
    pub quantity_reserved: i64,
    pub reorder_level: i64,
    pub reorder_quantity: i64,
    /// When the stock was last physically counted.
    #[ts(as = "Option<String>")]
    pub last_count_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl InventoryRecord {
    /// Units below the reorder level (negative when comfortably stocked).
    #[inline]
    pub fn shortfall(&self) -> i64 {
        self.reorder_level - self.quantity_on_hand
    }

    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.quantity_on_hand <= self.reorder_level
    }
}

/// Partial update of inventory thresholds. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventorySettingsPatch {
    pub reorder_level: Option<i64>,
    pub reorder_quantity: Option<i64>,
    pub quantity_reserved: Option<i64>,
}

impl InventorySettingsPatch {
    pub fn is_empty(&self) -> bool {
        self.reorder_level.is_none()
            && self.reorder_quantity.is_none()
            && self.quantity_reserved.is_none()
    }
}

/// Why stock moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementReason {
    /// Units left with a sale.
    Sale,
    /// Units came back because their sale was cancelled.
    Cancellation,
    /// Stock count or correction.
    Adjustment,
    /// Goods received.
    Restock,
}

impl MovementReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementReason::Sale => "sale",
            MovementReason::Cancellation => "cancellation",
            MovementReason::Adjustment => "adjustment",
            MovementReason::Restock => "restock",
        }
    }

    /// Reasons an operator may use for a manual adjustment. Sale and
    /// cancellation movements are written only by the sale workflow.
    pub fn is_manual(&self) -> bool {
        matches!(self, MovementReason::Adjustment | MovementReason::Restock)
    }
}

impl fmt::Display for MovementReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable audit entry for one change to `quantity_on_hand`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryMovement {
    pub id: String,
    pub product_id: String,
    /// Signed change: negative for sales, positive for restores and restocks.
    pub delta: i64,
    pub reason: MovementReason,
    pub sale_id: Option<String>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// How a manual adjustment expresses the new stock level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StockAdjustment {
    /// Add (or with a negative value, remove) units.
    Delta(i64),
    /// Set the counted quantity.
    Absolute(i64),
}

impl StockAdjustment {
    /// Signed change this adjustment makes to `current`.
    pub fn delta_from(&self, current: i64) -> i64 {
        match *self {
            StockAdjustment::Delta(d) => d,
            StockAdjustment::Absolute(n) => n - current,
        }
    }
}

/// Filters for the movement log. Results are always newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MovementFilter {
    pub product_id: Option<String>,
    pub reason: Option<MovementReason>,
    pub sale_id: Option<String>,
    pub limit: Option<u32>,
}

// =============================================================================
// Sale Status
// =============================================================================

/// Lifecycle state of a sale.
///
/// ```text
///   pending ──► completed ──► cancelled
///      │                          ▲
///      └──────────────────────────┘
/// ```
/// `cancelled` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Pending,
    Completed,
    Cancelled,
}

impl Default for SaleStatus {
    fn default() -> Self {
        SaleStatus::Completed
    }
}

impl SaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Pending => "pending",
            SaleStatus::Completed => "completed",
            SaleStatus::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(&self, next: SaleStatus) -> bool {
        matches!(
            (self, next),
            (SaleStatus::Pending, SaleStatus::Completed)
                | (SaleStatus::Pending, SaleStatus::Cancelled)
                | (SaleStatus::Completed, SaleStatus::Cancelled)
        )
    }

    /// Validates a lifecycle transition and returns the new status.
    pub fn transition_to(&self, next: SaleStatus) -> CoreResult<SaleStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidTransition {
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payment Status (derived)
// =============================================================================

/// Paid-vs-owed classification of a sale. Always derived from the payment
/// ledger, see [`crate::ledger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Partial,
    Paid,
    Refunded,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A customer sale with its line items.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    /// Human-presentable, unique (`ORD20240115A1B2C3D4`).
    pub invoice_number: String,
    pub customer_id: String,
    pub status: SaleStatus,
    pub payment_status: PaymentStatus,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    /// subtotal − discount + tax.
    pub final_amount_cents: i64,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub completed_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Line items in line order. Loaded separately from the header row.
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub items: Vec<SaleItem>,
}

impl Sale {
    #[inline]
    pub fn final_amount(&self) -> Money {
        Money::from_cents(self.final_amount_cents)
    }
}

/// Builds an invoice number: `ORD` + `YYYYMMDD` + 8 upper-case hex digits.
///
/// ## Example
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use furnish_core::types::invoice_number;
///
/// let at = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
/// let token = uuid::Uuid::parse_str("a1b2c3d4-0000-4000-8000-000000000000").unwrap();
/// assert_eq!(invoice_number(at, token), "ORD20240115A1B2C3D4");
/// ```
pub fn invoice_number(at: DateTime<Utc>, token: Uuid) -> String {
    let hex = token.simple().to_string();
    format!(
        "{}{}{}",
        INVOICE_PREFIX,
        at.format("%Y%m%d"),
        hex[..8].to_uppercase()
    )
}

// =============================================================================
// Sale Item
// =============================================================================

/// A line item in a sale.
/// Uses snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    /// 1-based position; insertion order of the request.
    pub line_number: i64,
    pub product_id: String,
    /// Product name at time of sale (frozen).
    pub name_snapshot: String,
    pub quantity: i64,
    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,
    /// Unit cost in cents at time of sale (frozen).
    pub unit_cost_cents: i64,
    pub discount_cents: i64,
    /// quantity × unit_price − discount.
    pub line_total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

/// Input for one sale line.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewSaleItem {
    pub product_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub discount_cents: i64,
}

impl NewSaleItem {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        NewSaleItem {
            product_id: product_id.into(),
            quantity,
            discount_cents: 0,
        }
    }
}

/// Input for creating a sale.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewSale {
    pub customer_id: String,
    pub items: Vec<NewSaleItem>,
    #[serde(default)]
    pub discount_cents: i64,
    #[serde(default)]
    pub tax_cents: i64,
    pub notes: Option<String>,
    /// `pending` or `completed`; defaults to `completed`.
    pub status: Option<SaleStatus>,
}

/// Partial sale update. Lines are immutable; only notes can change.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalePatch {
    pub notes: Option<String>,
}

/// Filters for listing sales. Results are newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleFilter {
    pub customer_id: Option<String>,
    pub status: Option<SaleStatus>,
    pub payment_status: Option<PaymentStatus>,
    #[ts(as = "Option<String>")]
    pub from: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    Other,
}

// =============================================================================
// Payment Record Status
// =============================================================================

/// Status of one payment record. Only `completed` payments count towards
/// the amount paid on a sale.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentRecordStatus {
    Completed,
    Pending,
    Failed,
    Refunded,
}

impl PaymentRecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentRecordStatus::Completed => "completed",
            PaymentRecordStatus::Pending => "pending",
            PaymentRecordStatus::Failed => "failed",
            PaymentRecordStatus::Refunded => "refunded",
        }
    }
}

// =============================================================================
// Payment
// =============================================================================

/// A payment towards a sale.
/// A sale can have multiple payments (deposit now, balance on delivery).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub sale_id: String,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub status: PaymentRecordStatus,
    /// External reference (card auth code, bank transfer id).
    pub reference: Option<String>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

/// Input for recording a payment.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewPayment {
    pub sale_id: String,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

/// Filters for listing payments. Results are newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentFilter {
    pub sale_id: Option<String>,
    pub method: Option<PaymentMethod>,
    pub status: Option<PaymentRecordStatus>,
    #[ts(as = "Option<String>")]
    pub from: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

// =============================================================================
// Unit Tests
// =============================================================================
