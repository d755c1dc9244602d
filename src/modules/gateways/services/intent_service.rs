use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::gateway_trait::PaymentGateway;
use crate::core::{money, AppError, Result};
use crate::modules::gateways::models::{
    CreateIntentParams, IntentHandle, IntentStatus, PaymentIntent,
};
use crate::modules::invoices::{Invoice, InvoiceRepository};
use crate::modules::payments::models::Payment;
use crate::modules::payments::repositories::PaymentRepository;

/// Hands out processor intents for invoices, reusing a live one when possible
pub struct IntentService {
    invoices: Arc<dyn InvoiceRepository>,
    payments: Arc<dyn PaymentRepository>,
    gateway: Arc<dyn PaymentGateway>,
    currency: String,
    retrieve_timeout: Duration,
}

impl IntentService {
    pub fn new(
        invoices: Arc<dyn InvoiceRepository>,
        payments: Arc<dyn PaymentRepository>,
        gateway: Arc<dyn PaymentGateway>,
        currency: String,
        retrieve_timeout: Duration,
    ) -> Self {
        Self {
            invoices,
            payments,
            gateway,
            currency,
            retrieve_timeout,
        }
    }

    /// Return a usable intent for the invoice.
    ///
    /// A pending intent still alive at the processor is handed back as-is;
    /// one the processor lost, canceled, or failed to answer for within the
    /// timeout is dropped locally and replaced.
    #[tracing::instrument(skip(self), fields(gateway = self.gateway.name()))]
    pub async fn create_or_reuse_intent(
        &self,
        invoice_id: &str,
        user_id: &str,
    ) -> Result<IntentHandle> {
        let invoice = self
            .invoices
            .find_by_id(invoice_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Invoice '{}' not found", invoice_id)))?;

        if invoice.is_paid() {
            return Err(AppError::invalid_state("Invoice is already paid"));
        }

        if let Some(existing) = self
            .payments
            .find_active_intent_for_invoice(&invoice.id)
            .await?
        {
            if let Some(handle) = self.try_reuse(&existing).await? {
                return Ok(handle);
            }
        }

        let intent = self
            .gateway
            .create_intent(self.intent_params(&invoice, user_id)?)
            .await?;

        let payment = Payment::for_intent(&invoice, user_id, &intent.id);
        self.payments.create(&payment).await?;
        self.invoices
            .set_payment_intent(&invoice.id, &intent.id)
            .await?;

        tracing::info!(
            invoice_id = %invoice.id,
            intent_id = %intent.id,
            payment_number = %payment.payment_number,
            "Created payment intent"
        );

        Self::handle(intent)
    }

    /// `Some(handle)` when the stored intent can be handed out again,
    /// otherwise the stale payment is removed and `None` returned.
    ///
    /// An intent the processor already charged is never handed out again,
    /// and a payment settled while the lookup was in flight is kept.
    async fn try_reuse(&self, existing: &Payment) -> Result<Option<IntentHandle>> {
        let Some(intent_id) = existing.stripe_payment_intent_id.as_deref() else {
            return Ok(None);
        };

        let retrieved =
            tokio::time::timeout(self.retrieve_timeout, self.gateway.retrieve_intent(intent_id))
                .await;

        let reason = match retrieved {
            Ok(Ok(intent)) if intent.status == IntentStatus::Succeeded => {
                tracing::info!(intent_id = %intent.id, "Intent already charged, awaiting webhook");
                return Err(AppError::invalid_state(
                    "Payment already completed, awaiting confirmation",
                ));
            }
            Ok(Ok(intent)) if intent.status.is_reusable() && intent.client_secret.is_some() => {
                tracing::info!(intent_id = %intent.id, "Reusing existing payment intent");
                return Self::handle(intent).map(Some);
            }
            Ok(Ok(intent)) => format!("intent status {:?}", intent.status),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("retrieve timed out after {:?}", self.retrieve_timeout),
        };

        if !self.payments.delete_pending(&existing.id).await? {
            tracing::info!(
                intent_id = %intent_id,
                payment_id = %existing.id,
                "Payment settled while the intent was checked, keeping it"
            );
            return self.ensure_unpaid(existing.invoice_id.as_deref()).await.map(|_| None);
        }

        tracing::warn!(
            intent_id = %intent_id,
            payment_id = %existing.id,
            reason = %reason,
            "Discarded stale payment intent"
        );

        Ok(None)
    }

    /// Re-read the invoice after a concurrent settlement
    async fn ensure_unpaid(&self, invoice_id: Option<&str>) -> Result<()> {
        let Some(invoice_id) = invoice_id else {
            return Ok(());
        };

        match self.invoices.find_by_id(invoice_id).await? {
            Some(invoice) if invoice.is_paid() => {
                Err(AppError::invalid_state("Invoice is already paid"))
            }
            _ => Ok(()),
        }
    }

    fn intent_params(&self, invoice: &Invoice, user_id: &str) -> Result<CreateIntentParams> {
        Ok(CreateIntentParams {
            amount: money::to_minor_units(invoice.total_amount)?,
            currency: self.currency.clone(),
            description: format!("Invoice {}", invoice.invoice_number),
            metadata: HashMap::from([
                ("invoice_id".to_string(), invoice.id.clone()),
                ("user_id".to_string(), user_id.to_string()),
                ("invoice_number".to_string(), invoice.invoice_number.clone()),
            ]),
        })
    }

    fn handle(intent: PaymentIntent) -> Result<IntentHandle> {
        let client_secret = intent.client_secret.ok_or_else(|| {
            AppError::gateway(format!("Intent {} returned without a client secret", intent.id))
        })?;

        Ok(IntentHandle {
            client_secret,
            intent_id: intent.id,
        })
    }
}
