pub mod services;

pub use services::{EmailReceipt, EmailSender, HttpEmailSender, LogEmailSender, PaymentNotifier};
