use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::modules::invoices::models::Invoice;

/// Portion of a payment applied to one invoice.
///
/// `invoice_number` is a snapshot taken when the allocation is made so
/// historical payment views stay stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub invoice_id: String,
    pub invoice_number: String,
    pub amount_applied: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
}

impl Allocation {
    /// Allocate up to `requested` against the invoice's current balance.
    ///
    /// The applied amount never exceeds what is owed, so `balance_after`
    /// never goes negative.
    pub fn clamped(invoice: &Invoice, requested: Decimal) -> Self {
        let balance_before = invoice.balance_due.max(Decimal::ZERO);
        let amount_applied = requested.max(Decimal::ZERO).min(balance_before);

        Self {
            invoice_id: invoice.id.clone(),
            invoice_number: invoice.invoice_number.clone(),
            amount_applied,
            balance_before,
            balance_after: balance_before - amount_applied,
        }
    }

    /// Allocation clearing whatever the invoice still owes.
    pub fn settle_in_full(invoice: &Invoice) -> Self {
        Self::clamped(invoice, invoice.balance_due)
    }

    pub fn is_consistent(&self) -> bool {
        self.balance_after == self.balance_before - self.amount_applied
            && self.amount_applied <= self.balance_before
            && self.balance_after >= Decimal::ZERO
    }
}

/// One `(invoice_id, amount_applied)` pair in a manual payment request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationRequest {
    pub invoice_id: String,
    pub amount_applied: Decimal,
}

/// Why a requested allocation was not applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    InvoiceNotFound,
    NoBalanceDue,
    ConcurrentUpdate,
    PersistenceError,
}

/// Requested allocation that did not land on its invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedAllocation {
    pub invoice_id: String,
    pub requested_amount: Decimal,
    pub reason: SkipReason,
}
