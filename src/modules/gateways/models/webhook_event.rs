use serde::Deserialize;
use std::collections::HashMap;

pub const PAYMENT_INTENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const PAYMENT_INTENT_FAILED: &str = "payment_intent.payment_failed";

/// Envelope of a processor webhook delivery
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

/// The intent object carried by `payment_intent.*` events
#[derive(Debug, Clone, Deserialize)]
pub struct IntentEventObject {
    pub id: String,
    #[serde(default)]
    pub amount_received: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub payment_method_types: Vec<String>,
    #[serde(default)]
    pub last_payment_error: Option<PaymentError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl IntentEventObject {
    pub fn invoice_id(&self) -> Option<&str> {
        self.metadata
            .get("invoice_id")
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }

    pub fn user_id(&self) -> Option<&str> {
        self.metadata.get("user_id").map(String::as_str)
    }

    /// Method type used, e.g. `card`
    pub fn payment_method(&self) -> &str {
        self.payment_method_types
            .first()
            .map(String::as_str)
            .unwrap_or("card")
    }
}
