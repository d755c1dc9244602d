pub mod email_sender;
pub mod payment_notifier;

pub use email_sender::{EmailReceipt, EmailSender, HttpEmailSender, LogEmailSender};
pub use payment_notifier::PaymentNotifier;
