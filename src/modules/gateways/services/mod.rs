pub mod gateway_trait;
pub mod intent_service;
pub mod stripe;
pub mod webhook_signature;

pub use gateway_trait::PaymentGateway;
pub use intent_service::IntentService;
pub use stripe::StripeClient;
pub use webhook_signature::StripeSignatureVerifier;
