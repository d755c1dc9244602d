use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::allocation::Allocation;
use super::payment::{Payment, PaymentStatus};
use crate::modules::invoices::models::{Invoice, InvoiceStatus};

/// A `payment_intent.succeeded` event reduced to what the stores need
#[derive(Debug, Clone, PartialEq)]
pub struct IntentSettlement {
    pub intent_id: String,
    pub invoice_id: String,
    pub payment_method: String,
    /// Amount the processor reports as received, when present
    pub amount_received: Option<Decimal>,
    /// Paying user from intent metadata
    pub user_id: Option<String>,
    pub settled_at: DateTime<Utc>,
}

/// Result of applying a processor event to the stores
#[derive(Debug, Clone, PartialEq)]
pub enum SettlementOutcome {
    /// State changed; the invoice is absent when the event named an unknown invoice
    Applied {
        payment: Payment,
        invoice: Option<Invoice>,
    },
    /// Event was already reflected in the stores
    AlreadyProcessed,
    /// No local payment matches the intent
    Unmatched,
}

impl IntentSettlement {
    /// Payment for an intent with no local record, e.g. one removed while
    /// self-healing a stale intent. Filled in by [`IntentSettlement::apply`].
    pub fn orphan_payment(&self, invoice: Option<&Invoice>) -> Payment {
        let user_id = self
            .user_id
            .clone()
            .or_else(|| invoice.map(|i| i.user_id.clone()))
            .unwrap_or_else(|| "system".to_string());
        let amount = self
            .amount_received
            .or_else(|| invoice.map(|i| i.total_amount))
            .unwrap_or(Decimal::ZERO);

        Payment {
            id: Uuid::new_v4().to_string(),
            payment_number: Payment::gateway_number(&self.intent_id),
            user_id,
            invoice_id: Some(self.invoice_id.clone()),
            customer_name: invoice.map(|i| i.customer_name.clone()),
            customer_email: invoice.and_then(|i| i.customer_email.clone()),
            amount,
            status: PaymentStatus::Pending,
            payment_method: self.payment_method.clone(),
            payment_date: self.settled_at.date_naive(),
            reference_number: None,
            notes: None,
            stripe_payment_intent_id: Some(self.intent_id.clone()),
            allocations: Vec::new(),
            created_at: self.settled_at,
            updated_at: self.settled_at,
        }
    }

    /// Mark the payment succeeded and the invoice paid, materialising the
    /// single allocation so gateway payments read like manual ones.
    pub fn apply(&self, payment: &mut Payment, invoice: Option<&mut Invoice>) {
        payment.status = PaymentStatus::Succeeded;
        payment.payment_method = self.payment_method.clone();
        payment.invoice_id = Some(self.invoice_id.clone());
        payment.updated_at = self.settled_at;

        if let Some(invoice) = invoice {
            payment.allocations = vec![Allocation::settle_in_full(invoice)];

            invoice.balance_due = Decimal::ZERO;
            invoice.invoice_status = InvoiceStatus::Paid;
            invoice.paid_at = Some(invoice.paid_at.unwrap_or(self.settled_at));
            invoice.stripe_payment_intent_id = Some(self.intent_id.clone());
            invoice.updated_at = self.settled_at;
        }
    }
}
