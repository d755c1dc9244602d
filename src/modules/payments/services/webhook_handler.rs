use chrono::Utc;
use std::sync::Arc;
use tracing::Instrument;

use super::super::models::{IntentSettlement, SettlementOutcome};
use super::super::repositories::PaymentRepository;
use crate::core::{money, AppError, Result};
use crate::modules::gateways::models::{
    IntentEventObject, WebhookEvent, PAYMENT_INTENT_FAILED, PAYMENT_INTENT_SUCCEEDED,
};
use crate::modules::gateways::StripeSignatureVerifier;
use crate::modules::notifications::PaymentNotifier;

/// What a delivery did to the stores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Payment (and invoice, on success) changed state
    Applied,
    /// Delivery repeats one already reflected in the stores
    Duplicate,
    /// Event type not handled, or a payload redelivery can never fix
    Ignored,
    /// Failure event for an intent with no local payment
    Unmatched,
}

/// Reconciles processor webhook deliveries with local payments and invoices
///
/// Every delivery is verified before it is parsed. After that, only genuine
/// persistence errors surface as `Err`, so the processor redelivers those and
/// nothing else.
pub struct WebhookHandler {
    payments: Arc<dyn PaymentRepository>,
    verifier: StripeSignatureVerifier,
    notifier: Arc<PaymentNotifier>,
}

impl WebhookHandler {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        verifier: StripeSignatureVerifier,
        notifier: Arc<PaymentNotifier>,
    ) -> Self {
        Self {
            payments,
            verifier,
            notifier,
        }
    }

    /// Verify and apply one delivery
    ///
    /// # Arguments
    /// * `raw_body` - request body exactly as received
    /// * `signature` - `Stripe-Signature` header value, if present
    ///
    /// # Errors
    /// * `SignatureInvalid` - header missing or not matching; nothing was read
    /// * `Database` / `Internal` - the stores failed and the event should be redelivered
    pub async fn handle_event(
        &self,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome> {
        let signature =
            signature.ok_or_else(|| AppError::signature("Missing Stripe-Signature header"))?;
        self.verifier.verify(raw_body, signature)?;

        let event: WebhookEvent = match serde_json::from_slice(raw_body) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Verified webhook body is not a valid event, acknowledging");
                return Ok(WebhookOutcome::Ignored);
            }
        };

        let span = tracing::info_span!(
            "webhook_event",
            event_id = %event.id,
            event_type = %event.event_type
        );
        self.dispatch(event).instrument(span).await
    }

    async fn dispatch(&self, event: WebhookEvent) -> Result<WebhookOutcome> {
        match event.event_type.as_str() {
            PAYMENT_INTENT_SUCCEEDED => match Self::intent_object(&event) {
                Some(intent) => self.on_succeeded(intent).await,
                None => Ok(WebhookOutcome::Ignored),
            },
            PAYMENT_INTENT_FAILED => match Self::intent_object(&event) {
                Some(intent) => self.on_failed(intent).await,
                None => Ok(WebhookOutcome::Ignored),
            },
            other => {
                tracing::debug!(event_type = %other, "Unhandled webhook event type");
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    fn intent_object(event: &WebhookEvent) -> Option<IntentEventObject> {
        serde_json::from_value(event.data.object.clone())
            .map_err(|e| {
                tracing::warn!(error = %e, "Webhook event carries no usable payment intent");
            })
            .ok()
    }

    async fn on_succeeded(&self, intent: IntentEventObject) -> Result<WebhookOutcome> {
        let Some(invoice_id) = intent.invoice_id() else {
            tracing::warn!(intent_id = %intent.id, "Succeeded intent has no invoice_id metadata, acknowledging");
            return Ok(WebhookOutcome::Ignored);
        };

        let settlement = IntentSettlement {
            intent_id: intent.id.clone(),
            invoice_id: invoice_id.to_string(),
            payment_method: intent.payment_method().to_string(),
            amount_received: intent.amount_received.map(money::from_minor_units),
            user_id: intent.user_id().map(String::from),
            settled_at: Utc::now(),
        };

        match self.payments.settle_intent_succeeded(&settlement).await? {
            SettlementOutcome::Applied { payment, invoice } => {
                tracing::info!(
                    intent_id = %settlement.intent_id,
                    payment_id = %payment.id,
                    invoice_id = %settlement.invoice_id,
                    "Payment intent settled"
                );

                match invoice {
                    Some(invoice) => self.notifier.payment_received(&invoice, &payment).await,
                    None => tracing::warn!(
                        invoice_id = %settlement.invoice_id,
                        "Settled intent names an unknown invoice"
                    ),
                }

                Ok(WebhookOutcome::Applied)
            }
            SettlementOutcome::AlreadyProcessed => {
                tracing::info!(intent_id = %settlement.intent_id, "Duplicate success delivery");
                Ok(WebhookOutcome::Duplicate)
            }
            SettlementOutcome::Unmatched => Ok(WebhookOutcome::Unmatched),
        }
    }

    async fn on_failed(&self, intent: IntentEventObject) -> Result<WebhookOutcome> {
        let outcome = match self.payments.mark_intent_failed(&intent.id).await? {
            SettlementOutcome::Applied { .. } => WebhookOutcome::Applied,
            SettlementOutcome::AlreadyProcessed => WebhookOutcome::Duplicate,
            SettlementOutcome::Unmatched => WebhookOutcome::Unmatched,
        };

        let error = intent.last_payment_error.as_ref();
        tracing::info!(
            intent_id = %intent.id,
            outcome = ?outcome,
            code = error.and_then(|e| e.code.as_deref()).unwrap_or("none"),
            message = error.and_then(|e| e.message.as_deref()).unwrap_or(""),
            "Payment intent failed"
        );

        Ok(outcome)
    }
}
