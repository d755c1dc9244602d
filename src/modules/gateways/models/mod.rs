pub mod payment_intent;
pub mod webhook_event;

pub use payment_intent::{CreateIntentParams, IntentHandle, IntentStatus, PaymentIntent};
pub use webhook_event::{
    IntentEventObject, WebhookEvent, PAYMENT_INTENT_FAILED, PAYMENT_INTENT_SUCCEEDED,
};
