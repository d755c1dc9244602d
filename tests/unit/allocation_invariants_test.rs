/// Property-based tests for allocation clamping and invoice balance invariants
///
/// An allocation never takes more than the invoice owes, the balance never
/// goes negative, and status/paid_at always agree with the resulting balance.

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use wreckpay::core::money;
use wreckpay::invoices::{BalanceChange, Invoice, InvoiceStatus, NewInvoice};
use wreckpay::payments::Allocation;

fn invoice(total: Decimal, balance: Decimal) -> Invoice {
    let mut invoice = Invoice::new(NewInvoice {
        invoice_number: "INV-0100".to_string(),
        user_id: "user-1".to_string(),
        customer_id: None,
        customer_name: "Blackrock Demo".to_string(),
        customer_email: None,
        total_amount: total,
        due_date: None,
    })
    .unwrap();
    invoice.balance_due = balance;
    invoice.invoice_status = InvoiceStatus::Sent;
    invoice
}

/// Cents to a two-place decimal
fn cents(value: u32) -> Decimal {
    Decimal::new(value as i64, 2)
}

proptest! {
    /// Property: applied = min(requested, balance) and the balance identity holds
    #[test]
    fn test_allocation_is_clamped_to_balance(
        total_cents in 1u32..10_000_000u32,
        balance_fraction in 0u32..=100u32,
        requested_cents in 1u32..20_000_000u32,
    ) {
        let total = cents(total_cents);
        let balance = money::round(total * Decimal::from(balance_fraction) / dec!(100));
        let requested = cents(requested_cents);

        let allocation = Allocation::clamped(&invoice(total, balance), requested);

        prop_assert_eq!(allocation.amount_applied, requested.min(balance));
        prop_assert_eq!(allocation.balance_before, balance);
        prop_assert_eq!(allocation.balance_after, balance - allocation.amount_applied);
        prop_assert!(allocation.balance_after >= Decimal::ZERO);
        prop_assert!(allocation.is_consistent());
    }

    /// Property: a balance change keeps the invoice consistent
    #[test]
    fn test_balance_change_keeps_invoice_consistent(
        total_cents in 1u32..10_000_000u32,
        requested_cents in 1u32..20_000_000u32,
    ) {
        let total = cents(total_cents);
        let mut inv = invoice(total, total);
        let allocation = Allocation::clamped(&inv, cents(requested_cents));
        let change = BalanceChange::reduce(&inv, allocation.amount_applied, Utc::now());

        prop_assert_eq!(change.expected_balance, total);
        prop_assert_eq!(change.new_balance, allocation.balance_after);

        inv.balance_due = change.new_balance;
        inv.invoice_status = change.new_status;
        inv.paid_at = change.paid_at;

        prop_assert!(inv.is_consistent());
        prop_assert_eq!(inv.is_paid(), inv.balance_due == Decimal::ZERO);
        prop_assert_eq!(inv.paid_at.is_some(), inv.is_paid());
    }

    /// Property: sequential allocations never drive the balance below zero
    #[test]
    fn test_repeated_allocations_never_overdraw(
        total_cents in 1u32..1_000_000u32,
        requests in proptest::collection::vec(1u32..500_000u32, 1..8),
    ) {
        let total = cents(total_cents);
        let mut inv = invoice(total, total);
        let mut applied_total = Decimal::ZERO;

        for requested in requests {
            if inv.balance_due <= Decimal::ZERO {
                break;
            }
            let allocation = Allocation::clamped(&inv, cents(requested));
            let change = BalanceChange::reduce(&inv, allocation.amount_applied, Utc::now());
            inv.balance_due = change.new_balance;
            inv.invoice_status = change.new_status;
            applied_total += allocation.amount_applied;
        }

        prop_assert!(inv.balance_due >= Decimal::ZERO);
        prop_assert_eq!(applied_total + inv.balance_due, total);
        prop_assert!(applied_total <= total);
    }

    /// Property: minor-unit conversion matches round(amount * 100)
    #[test]
    fn test_minor_units_match_cents(value in 0u32..100_000_000u32) {
        prop_assert_eq!(money::to_minor_units(cents(value)).unwrap(), value as i64);
        prop_assert_eq!(money::from_minor_units(value as i64), cents(value));
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_exact_payment_marks_paid() {
        let inv = invoice(dec!(500.00), dec!(500.00));
        let allocation = Allocation::clamped(&inv, dec!(500.00));
        let change = BalanceChange::reduce(&inv, allocation.amount_applied, Utc::now());

        assert_eq!(change.new_balance, dec!(0.00));
        assert_eq!(change.new_status, InvoiceStatus::Paid);
        assert!(change.paid_at.is_some());
    }

    #[test]
    fn test_partial_payment_stays_sent() {
        let inv = invoice(dec!(500.00), dec!(500.00));
        let change = BalanceChange::reduce(&inv, dec!(125.00), Utc::now());

        assert_eq!(change.new_balance, dec!(375.00));
        assert_eq!(change.new_status, InvoiceStatus::Sent);
        assert!(change.paid_at.is_none());
    }

    #[test]
    fn test_overpayment_clamps_200_balance() {
        let inv = invoice(dec!(500.00), dec!(200.00));
        let allocation = Allocation::clamped(&inv, dec!(300.00));

        assert_eq!(allocation.amount_applied, dec!(200.00));
        assert_eq!(allocation.balance_after, dec!(0.00));
    }
}
