pub mod balance_change;
pub mod invoice;

pub use balance_change::BalanceChange;
pub use invoice::{Invoice, InvoiceStatus, NewInvoice};
