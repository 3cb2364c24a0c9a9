//! # Sale Pricing
//!
//! Line totals and sale totals, computed once at sale creation and then
//! frozen on the persisted rows.
//!
//! ```text
//! line_total   = quantity × unit_price − line_discount
//! subtotal     = Σ line_total
//! final_amount = subtotal − discount + tax
//! ```
//!
//! Discounts and tax arrive as absolute cent amounts; no percentages are
//! applied here.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreResult, ValidationError};
use crate::money::Money;
use crate::validation::{validate_price_cents, validate_quantity};
use crate::MAX_AMOUNT_CENTS;

fn amount_overflow(field: &str) -> ValidationError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min: 0,
        max: MAX_AMOUNT_CENTS,
    }
}

// =============================================================================
// Line Pricing
// =============================================================================

/// A sale line with its price snapshot, ready to be totalled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub quantity: i64,
    pub unit_price: Money,
    pub discount: Money,
}

impl PricedLine {
    pub fn new(quantity: i64, unit_price: Money, discount: Money) -> Self {
        PricedLine {
            quantity,
            unit_price,
            discount,
        }
    }

    /// Computes `quantity × unit_price − discount`.
    ///
    /// ## Errors
    /// - quantity not in `1..=MAX_LINE_QUANTITY`
    /// - negative discount, or a discount larger than the gross line amount
    /// - a unit price or discount above `MAX_AMOUNT_CENTS`
    pub fn line_total(&self) -> CoreResult<Money> {
        validate_quantity(self.quantity)?;
        validate_price_cents("unit price", self.unit_price.cents())?;
        validate_price_cents("line discount", self.discount.cents())?;

        let gross = self
            .unit_price
            .checked_mul(self.quantity)
            .ok_or_else(|| amount_overflow("line amount"))?;
        if self.discount > gross {
            return Err(ValidationError::OutOfRange {
                field: "line discount".to_string(),
                min: 0,
                max: gross.cents(),
            }
            .into());
        }

        Ok(gross - self.discount)
    }
}

// =============================================================================
// Sale Totals
// =============================================================================

/// Header totals of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub final_amount: Money,
}

impl SaleTotals {
    /// Totals the lines and applies the sale-level discount and tax.
    ///
    /// Returns the per-line totals (same order as `lines`) alongside the
    /// header totals.
    ///
    /// ## Example
    /// ```rust
    /// use furnish_core::money::Money;
    /// use furnish_core::pricing::{PricedLine, SaleTotals};
    ///
    /// let lines = [PricedLine::new(3, Money::from_cents(100), Money::zero())];
    /// let (line_totals, totals) =
    ///     SaleTotals::compute(&lines, Money::zero(), Money::zero()).unwrap();
    /// assert_eq!(line_totals, vec![Money::from_cents(300)]);
    /// assert_eq!(totals.final_amount.cents(), 300);
    /// ```
    pub fn compute(
        lines: &[PricedLine],
        discount: Money,
        tax: Money,
    ) -> CoreResult<(Vec<Money>, SaleTotals)> {
        validate_price_cents("discount", discount.cents())?;
        validate_price_cents("tax", tax.cents())?;

        let line_totals = lines
            .iter()
            .map(PricedLine::line_total)
            .collect::<CoreResult<Vec<_>>>()?;

        let subtotal = Money::checked_sum(line_totals.iter().copied())
            .ok_or_else(|| amount_overflow("subtotal"))?;
        let final_amount = subtotal
            .checked_sub(discount)
            .and_then(|m| m.checked_add(tax))
            .ok_or_else(|| amount_overflow("final amount"))?;

        if final_amount.is_negative() {
            return Err(ValidationError::MustNotBeNegative {
                field: "final amount".to_string(),
            }
            .into());
        }

        Ok((
            line_totals,
            SaleTotals {
                subtotal,
                discount,
                tax,
                final_amount,
            },
        ))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
