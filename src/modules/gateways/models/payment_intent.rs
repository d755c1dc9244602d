use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Processor-side lifecycle of an intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Succeeded,
    Canceled,
    /// Status strings this build does not know about
    #[serde(other)]
    Unknown,
}

impl IntentStatus {
    /// Canceled intents can never complete and succeeded ones are already
    /// charged; neither may be handed out again
    pub fn is_reusable(&self) -> bool {
        !matches!(self, IntentStatus::Canceled | IntentStatus::Succeeded)
    }
}

/// Processor-owned payment intent; only the id is persisted locally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    /// Amount in minor units
    pub amount: i64,
    pub currency: String,
    pub status: IntentStatus,
    pub client_secret: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Parameters for creating an intent
#[derive(Debug, Clone, PartialEq)]
pub struct CreateIntentParams {
    /// Amount in minor units
    pub amount: i64,
    pub currency: String,
    pub description: String,
    pub metadata: HashMap<String, String>,
}

impl CreateIntentParams {
    /// Form fields in the processor's bracketed metadata encoding
    pub fn form_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("amount".to_string(), self.amount.to_string()),
            ("currency".to_string(), self.currency.clone()),
            ("description".to_string(), self.description.clone()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];

        let mut keys: Vec<&String> = self.metadata.keys().collect();
        keys.sort();
        for key in keys {
            fields.push((format!("metadata[{}]", key), self.metadata[key].clone()));
        }

        fields
    }
}

/// What the client needs to complete payment off-system
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentHandle {
    pub client_secret: String,
    pub intent_id: String,
}
