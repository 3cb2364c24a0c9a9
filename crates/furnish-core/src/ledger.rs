//! # Payment Ledger Rules
//!
//! Pure rules behind a sale's `payment_status`.
//!
//! ## Derivation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  paid = Σ amount of COMPLETED payments                                  │
//! │                                                                         │
//! │  paid == 0 ─┬─ any refunded payment? ──► refunded                       │
//! │             └─ otherwise ──────────────► pending                        │
//! │  paid >= final_amount ─────────────────► paid                           │
//! │  otherwise ────────────────────────────► partial                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `pending` and `failed` payments never count. The status is a function of
//! the current set of payments only, so the order they were recorded or
//! deleted in does not matter.

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Payment, PaymentRecordStatus, PaymentStatus};

/// What the payment ledger of one sale adds up to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerSummary {
    /// Sum of completed payments.
    pub paid: Money,
    /// Whether any payment on the sale has been refunded.
    pub has_refund: bool,
}

impl LedgerSummary {
    pub fn from_payments<'a, I>(payments: I) -> Self
    where
        I: IntoIterator<Item = &'a Payment>,
    {
        payments
            .into_iter()
            .fold(LedgerSummary::default(), |mut acc, payment| {
                match payment.status {
                    PaymentRecordStatus::Completed => {
                        acc.paid = acc.paid.saturating_add(payment.amount())
                    }
                    PaymentRecordStatus::Refunded => acc.has_refund = true,
                    PaymentRecordStatus::Pending | PaymentRecordStatus::Failed => {}
                }
                acc
            })
    }

    /// Derives the sale's payment status against its final amount.
    pub fn status(&self, final_amount: Money) -> PaymentStatus {
        derive_payment_status(final_amount, self.paid, self.has_refund)
    }

    pub fn remaining(&self, final_amount: Money) -> Money {
        final_amount.saturating_sub(self.paid)
    }
}

/// Derives a sale's payment status.
///
/// A sale whose final amount is zero stays `pending` until a payment exists,
/// which cannot happen since payments must be positive.
pub fn derive_payment_status(final_amount: Money, paid: Money, has_refund: bool) -> PaymentStatus {
    if paid.is_zero() {
        if has_refund {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::Pending
        }
    } else if paid >= final_amount {
        PaymentStatus::Paid
    } else {
        PaymentStatus::Partial
    }
}

/// Checks that `amount` fits in the balance left on a sale.
///
/// ## Errors
/// `Overpayment` carrying the remaining balance when
/// `already_paid + amount > final_amount`, including when that sum does not
/// fit in an `i64`.
pub fn ensure_within_balance(
    sale_id: &str,
    final_amount: Money,
    already_paid: Money,
    amount: Money,
) -> CoreResult<()> {
    match already_paid.checked_add(amount) {
        Some(total) if total <= final_amount => Ok(()),
        _ => Err(CoreError::Overpayment {
            sale_id: sale_id.to_string(),
            amount_cents: amount.cents(),
            remaining_cents: final_amount.saturating_sub(already_paid).cents(),
        }),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PaymentMethod;
    use chrono::Utc;
    use proptest::prelude::*;

    fn payment(amount: i64, status: PaymentRecordStatus) -> Payment {
        Payment {
            id: uuid::Uuid::new_v4().to_string(),
            sale_id: "sale".into(),
            amount_cents: amount,
            method: PaymentMethod::Cash,
            status,
            reference: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_derivation_rule() {
        let total = Money::from_cents(300);
        assert_eq!(
            derive_payment_status(total, Money::zero(), false),
            PaymentStatus::Pending
        );
        assert_eq!(
            derive_payment_status(total, Money::from_cents(200), false),
            PaymentStatus::Partial
        );
        assert_eq!(
            derive_payment_status(total, Money::from_cents(300), false),
            PaymentStatus::Paid
        );
        assert_eq!(
            derive_payment_status(total, Money::zero(), true),
            PaymentStatus::Refunded
        );
        // A partial refund still leaves completed money on the sale.
        assert_eq!(
            derive_payment_status(total, Money::from_cents(100), true),
            PaymentStatus::Partial
        );
    }

    #[test]
    fn test_zero_total_sale_stays_pending() {
        assert_eq!(
            derive_payment_status(Money::zero(), Money::zero(), false),
            PaymentStatus::Pending
        );
    }

    #[test]
    fn test_failed_and_pending_payments_do_not_count() {
        let payments = vec![
            payment(200, PaymentRecordStatus::Completed),
            payment(100, PaymentRecordStatus::Failed),
            payment(50, PaymentRecordStatus::Pending),
        ];
        let summary = LedgerSummary::from_payments(&payments);
        assert_eq!(summary.paid, Money::from_cents(200));
        assert!(!summary.has_refund);
        assert_eq!(summary.status(Money::from_cents(300)), PaymentStatus::Partial);
        assert_eq!(summary.remaining(Money::from_cents(300)).cents(), 100);
    }

    #[test]
    fn test_overpayment_check() {
        let total = Money::from_cents(300);
        let paid = Money::from_cents(200);

        assert!(ensure_within_balance("s", total, paid, Money::from_cents(100)).is_ok());

        match ensure_within_balance("s", total, paid, Money::from_cents(150)) {
            Err(CoreError::Overpayment {
                remaining_cents,
                amount_cents,
                ..
            }) => {
                assert_eq!(remaining_cents, 100);
                assert_eq!(amount_cents, 150);
            }
            other => panic!("expected overpayment, got {other:?}"),
        }

        match ensure_within_balance("s", total, paid, Money::from_cents(i64::MAX)) {
            Err(CoreError::Overpayment {
                remaining_cents, ..
            }) => assert_eq!(remaining_cents, 100),
            other => panic!("expected overpayment, got {other:?}"),
        }
    }

    fn status_strategy() -> impl Strategy<Value = PaymentRecordStatus> {
        prop_oneof![
            Just(PaymentRecordStatus::Completed),
            Just(PaymentRecordStatus::Pending),
            Just(PaymentRecordStatus::Failed),
            Just(PaymentRecordStatus::Refunded),
        ]
    }

    proptest! {
        #[test]
        fn prop_status_is_order_independent(
            (raw, shuffled_raw) in prop::collection::vec((1i64..10_000, status_strategy()), 0..12)
                .prop_flat_map(|raw| (Just(raw.clone()), Just(raw).prop_shuffle())),
            final_amount in 0i64..50_000,
        ) {
            let payments: Vec<Payment> =
                raw.iter().map(|&(a, s)| payment(a, s)).collect();
            let shuffled: Vec<Payment> =
                shuffled_raw.iter().map(|&(a, s)| payment(a, s)).collect();

            let total = Money::from_cents(final_amount);
            let a = LedgerSummary::from_payments(&payments);
            let b = LedgerSummary::from_payments(&shuffled);
            prop_assert_eq!(a, b);
            prop_assert_eq!(a.status(total), b.status(total));
        }
    }
}
