pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;

pub use controllers::configure;
pub use models::{
    Allocation, AllocationRequest, Payment, PaymentFilter, PaymentStatus, RecordPaymentRequest,
    SkipReason, SkippedAllocation,
};
pub use repositories::{MySqlPaymentRepository, PaymentRepository};
pub use services::{
    AllocationEngine, PaymentService, RecordedPayment, WebhookHandler, WebhookOutcome,
};
