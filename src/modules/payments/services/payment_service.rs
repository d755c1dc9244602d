use std::sync::Arc;

use super::super::models::{Payment, PaymentFilter, RecordPaymentRequest};
use super::super::repositories::PaymentRepository;
use super::allocation_engine::{AllocationEngine, RecordedPayment};
use crate::core::Result;
use crate::middleware::AuthenticatedUser;

/// Payment listing and manual recording on behalf of a signed-in user
pub struct PaymentService {
    payments: Arc<dyn PaymentRepository>,
    engine: AllocationEngine,
}

impl PaymentService {
    pub fn new(payments: Arc<dyn PaymentRepository>, engine: AllocationEngine) -> Self {
        Self { payments, engine }
    }

    /// Admins see every payment, everyone else only the ones they made
    pub fn visibility(user: &AuthenticatedUser) -> PaymentFilter {
        if user.is_admin() {
            PaymentFilter::All
        } else {
            PaymentFilter::OwnedBy(user.user_id.clone())
        }
    }

    pub async fn list_payments(&self, user: &AuthenticatedUser) -> Result<Vec<Payment>> {
        self.payments.list(&Self::visibility(user)).await
    }

    pub async fn record_payment(
        &self,
        user: &AuthenticatedUser,
        request: RecordPaymentRequest,
    ) -> Result<RecordedPayment> {
        self.engine.record_payment(&user.user_id, request).await
    }
}
