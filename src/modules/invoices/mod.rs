pub mod models;
pub mod repositories;

pub use models::{BalanceChange, Invoice, InvoiceStatus, NewInvoice};
pub use repositories::{InvoiceRepository, MySqlInvoiceRepository};
