// Manual payment recording.
//
// Requested allocations are applied one at a time, in request order. Each
// invoice write is a compare-and-set on the balance read just before it, so a
// concurrent writer forces a re-read instead of a lost update. A failed
// allocation never aborts the payment: it is reported back as skipped.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

use super::super::models::{
    Allocation, AllocationRequest, Payment, RecordPaymentRequest, SkipReason, SkippedAllocation,
};
use super::super::repositories::PaymentRepository;
use crate::core::{AppError, Result};
use crate::modules::invoices::{BalanceChange, InvoiceRepository};

/// Attempts per invoice before giving up on a contended balance
pub const MAX_BALANCE_ATTEMPTS: usize = 3;

/// Attempts at claiming a free `PAY-000N` number
pub const MAX_NUMBER_ATTEMPTS: u64 = 5;

/// Stored payment plus the allocations that could not be applied
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedPayment {
    pub payment: Payment,
    pub skipped: Vec<SkippedAllocation>,
}

pub struct AllocationEngine {
    invoices: Arc<dyn InvoiceRepository>,
    payments: Arc<dyn PaymentRepository>,
}

impl AllocationEngine {
    pub fn new(invoices: Arc<dyn InvoiceRepository>, payments: Arc<dyn PaymentRepository>) -> Self {
        Self { invoices, payments }
    }

    /// Record a manual payment and spread it over the requested invoices
    ///
    /// # Errors
    /// * `Validation` - amount, method or allocation totals are invalid; nothing is written
    /// * `Conflict` - no free payment number after several attempts
    #[tracing::instrument(skip(self, request), fields(amount = %request.amount, method = %request.payment_method))]
    pub async fn record_payment(
        &self,
        user_id: &str,
        request: RecordPaymentRequest,
    ) -> Result<RecordedPayment> {
        request.validate()?;

        let mut allocations = Vec::with_capacity(request.allocations.len());
        let mut skipped = Vec::new();

        for requested in &request.allocations {
            match self.allocate(requested).await {
                Ok(allocation) => allocations.push(allocation),
                Err(reason) => {
                    tracing::warn!(
                        invoice_id = %requested.invoice_id,
                        requested = %requested.amount_applied,
                        reason = ?reason,
                        "Allocation skipped"
                    );
                    skipped.push(SkippedAllocation {
                        invoice_id: requested.invoice_id.clone(),
                        requested_amount: requested.amount_applied,
                        reason,
                    });
                }
            }
        }

        let mut payment = Payment::manual(user_id, &request, String::new(), allocations);
        self.persist_with_number(&mut payment).await?;

        tracing::info!(
            payment_id = %payment.id,
            payment_number = %payment.payment_number,
            allocated = %payment.allocated_total(),
            skipped = skipped.len(),
            "Manual payment recorded"
        );

        Ok(RecordedPayment { payment, skipped })
    }

    /// Apply one requested allocation, re-reading the invoice on CAS conflicts
    async fn allocate(&self, requested: &AllocationRequest) -> std::result::Result<Allocation, SkipReason> {
        for attempt in 1..=MAX_BALANCE_ATTEMPTS {
            let invoice = match self.invoices.find_by_id(&requested.invoice_id).await {
                Ok(Some(invoice)) => invoice,
                Ok(None) => return Err(SkipReason::InvoiceNotFound),
                Err(e) => {
                    tracing::error!(invoice_id = %requested.invoice_id, error = %e, "Failed to load invoice");
                    return Err(SkipReason::PersistenceError);
                }
            };

            if invoice.balance_due <= Decimal::ZERO {
                return Err(SkipReason::NoBalanceDue);
            }

            let allocation = Allocation::clamped(&invoice, requested.amount_applied);
            let change = BalanceChange::reduce(&invoice, allocation.amount_applied, Utc::now());

            match self.invoices.apply_balance_change(&change).await {
                Ok(true) => return Ok(allocation),
                Ok(false) => {
                    tracing::debug!(
                        invoice_id = %invoice.id,
                        attempt,
                        "Invoice balance changed underneath, retrying"
                    );
                }
                Err(e) => {
                    tracing::error!(invoice_id = %invoice.id, error = %e, "Failed to update invoice balance");
                    return Err(SkipReason::PersistenceError);
                }
            }
        }

        Err(SkipReason::ConcurrentUpdate)
    }

    /// Claim the next count-based number, moving on when one is taken
    async fn persist_with_number(&self, payment: &mut Payment) -> Result<()> {
        let base = self.payments.count().await? + 1;

        for offset in 0..MAX_NUMBER_ATTEMPTS {
            payment.payment_number = Payment::sequence_number(base + offset);

            match self.payments.create(payment).await {
                Ok(_) => return Ok(()),
                Err(AppError::Conflict(msg)) => {
                    tracing::debug!(payment_number = %payment.payment_number, %msg, "Payment number taken");
                }
                Err(e) => {
                    tracing::error!(
                        payment_id = %payment.id,
                        error = %e,
                        "Failed to store payment after invoices were updated"
                    );
                    return Err(e);
                }
            }
        }

        Err(AppError::Conflict(format!(
            "No free payment number after {} attempts",
            MAX_NUMBER_ATTEMPTS
        )))
    }
}
