use crate::core::Result;
use async_trait::async_trait;

use super::super::models::{CreateIntentParams, PaymentIntent};

/// Payment processor seam for intent creation and lookup
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a new intent for the given amount and metadata
    async fn create_intent(&self, params: CreateIntentParams) -> Result<PaymentIntent>;

    /// Fetch a live intent; errors when the processor no longer knows it
    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent>;

    /// Get gateway name
    fn name(&self) -> &str;
}
