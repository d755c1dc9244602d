use std::sync::Arc;

use super::email_sender::EmailSender;
use crate::modules::invoices::Invoice;
use crate::modules::payments::models::Payment;

/// Customer-facing receipts for settled payments
pub struct PaymentNotifier {
    sender: Arc<dyn EmailSender>,
    base_url: String,
}

impl PaymentNotifier {
    pub fn new(sender: Arc<dyn EmailSender>, base_url: impl Into<String>) -> Self {
        Self {
            sender,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Send the receipt for `payment` against `invoice`.
    ///
    /// Delivery failures are logged and swallowed; the payment is already final.
    pub async fn payment_received(&self, invoice: &Invoice, payment: &Payment) {
        let Some(to) = invoice.customer_email.as_deref() else {
            tracing::debug!(invoice_id = %invoice.id, "No customer email, receipt skipped");
            return;
        };

        let subject = format!("Payment received for invoice {}", invoice.invoice_number);
        let html = self.receipt_html(invoice, payment);

        match self.sender.send(to, &subject, &html).await {
            Ok(receipt) => tracing::info!(
                invoice_id = %invoice.id,
                payment_id = %payment.id,
                message_id = %receipt.message_id,
                "Payment receipt sent"
            ),
            Err(e) => tracing::warn!(
                invoice_id = %invoice.id,
                payment_id = %payment.id,
                error = %e,
                "Failed to send payment receipt"
            ),
        }
    }

    pub fn invoice_link(&self, invoice: &Invoice) -> String {
        format!("{}/invoices/{}", self.base_url, invoice.id)
    }

    fn receipt_html(&self, invoice: &Invoice, payment: &Payment) -> String {
        format!(
            "<p>Hello {name},</p>\
             <p>We received your payment of ${amount} for invoice {number}.</p>\
             <p>Payment reference: {payment_number}</p>\
             <p><a href=\"{link}\">View invoice</a></p>",
            name = invoice.customer_name,
            amount = payment.amount,
            number = invoice.invoice_number,
            payment_number = payment.payment_number,
            link = self.invoice_link(invoice),
        )
    }
}
