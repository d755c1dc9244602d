pub mod allocation;
pub mod payment;
pub mod settlement;

pub use allocation::{Allocation, AllocationRequest, SkipReason, SkippedAllocation};
pub use payment::{
    CreateIntentRequest, Payment, PaymentFilter, PaymentStatus, RecordPaymentRequest,
    GATEWAY_PAYMENT_METHOD, MANUAL_PAYMENT_METHODS,
};
pub use settlement::{IntentSettlement, SettlementOutcome};
