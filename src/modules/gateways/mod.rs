pub mod models;
pub mod services;

pub use models::{CreateIntentParams, IntentHandle, IntentStatus, PaymentIntent};
pub use services::{IntentService, PaymentGateway, StripeClient, StripeSignatureVerifier};
