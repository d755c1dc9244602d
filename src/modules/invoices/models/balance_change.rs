use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::invoice::{Invoice, InvoiceStatus};

/// Compare-and-set update of an invoice balance.
///
/// Applies only while the stored `balance_due` still equals `expected_balance`,
/// so two payments racing on one invoice cannot both write from the same read.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceChange {
    pub invoice_id: String,
    pub expected_balance: Decimal,
    pub new_balance: Decimal,
    pub new_status: InvoiceStatus,
    pub paid_at: Option<DateTime<Utc>>,
}

impl BalanceChange {
    /// Reduce the invoice's current balance by `amount_applied`.
    ///
    /// The caller clamps `amount_applied` to the balance beforehand.
    pub fn reduce(invoice: &Invoice, amount_applied: Decimal, at: DateTime<Utc>) -> Self {
        let new_balance = (invoice.balance_due - amount_applied).max(Decimal::ZERO);
        let new_status = Invoice::status_for_balance(new_balance);

        Self {
            invoice_id: invoice.id.clone(),
            expected_balance: invoice.balance_due,
            new_balance,
            new_status,
            paid_at: (new_status == InvoiceStatus::Paid).then_some(at),
        }
    }
}
