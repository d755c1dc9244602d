pub mod allocation_engine;
pub mod payment_service;
pub mod webhook_handler;

pub use allocation_engine::{AllocationEngine, RecordedPayment};
pub use payment_service::PaymentService;
pub use webhook_handler::{WebhookHandler, WebhookOutcome};
