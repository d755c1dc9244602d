// Invoice ledger record.
//
// `balance_due` only moves down through payment allocation or gateway
// settlement, and `total_amount` never changes after creation.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{money, AppError, Result};

/// Invoice status lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    /// Created, not yet delivered to the customer
    #[default]
    Draft,

    /// Delivered, balance outstanding
    Sent,

    /// Balance fully settled
    Paid,
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvoiceStatus::Draft => write!(f, "draft"),
            InvoiceStatus::Sent => write!(f, "sent"),
            InvoiceStatus::Paid => write!(f, "paid"),
        }
    }
}

impl std::str::FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "draft" => Ok(InvoiceStatus::Draft),
            "sent" => Ok(InvoiceStatus::Sent),
            "paid" => Ok(InvoiceStatus::Paid),
            _ => Err(format!("Invalid invoice status: {}", s)),
        }
    }
}

/// Represents a customer invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub invoice_number: String,
    pub user_id: String,
    pub customer_id: Option<String>,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub total_amount: Decimal,
    pub balance_due: Decimal,
    pub invoice_status: InvoiceStatus,
    pub due_date: Option<NaiveDate>,
    pub paid_at: Option<DateTime<Utc>>,
    pub stripe_payment_intent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to open a new invoice
#[derive(Debug, Clone, Deserialize)]
pub struct NewInvoice {
    pub invoice_number: String,
    pub user_id: String,
    pub customer_id: Option<String>,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub total_amount: Decimal,
    pub due_date: Option<NaiveDate>,
}

impl Invoice {
    /// Create a new draft invoice with its full amount outstanding
    pub fn new(new_invoice: NewInvoice) -> Result<Self> {
        if new_invoice.invoice_number.trim().is_empty() {
            return Err(AppError::validation("Invoice number cannot be empty"));
        }

        if new_invoice.customer_name.trim().is_empty() {
            return Err(AppError::validation("Customer name cannot be empty"));
        }

        if new_invoice.total_amount < Decimal::ZERO {
            return Err(AppError::validation("Invoice total cannot be negative"));
        }

        let total_amount = money::round(new_invoice.total_amount);
        let now = Utc::now();

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            invoice_number: new_invoice.invoice_number,
            user_id: new_invoice.user_id,
            customer_id: new_invoice.customer_id,
            customer_name: new_invoice.customer_name,
            customer_email: new_invoice.customer_email,
            total_amount,
            balance_due: total_amount,
            invoice_status: InvoiceStatus::Draft,
            due_date: new_invoice.due_date,
            paid_at: None,
            stripe_payment_intent_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Status implied by a balance after a payment lands on the invoice
    pub fn status_for_balance(balance: Decimal) -> InvoiceStatus {
        if balance <= Decimal::ZERO {
            InvoiceStatus::Paid
        } else {
            InvoiceStatus::Sent
        }
    }

    pub fn is_paid(&self) -> bool {
        self.invoice_status == InvoiceStatus::Paid
    }

    /// `0 <= balance_due <= total_amount`, and paid implies a zero balance
    pub fn is_consistent(&self) -> bool {
        let in_range =
            self.balance_due >= Decimal::ZERO && self.balance_due <= self.total_amount;
        let paid_has_zero_balance = !self.is_paid() || self.balance_due == Decimal::ZERO;
        in_range && paid_has_zero_balance
    }

    /// Formats the count-based invoice number, e.g. `INV-0001`
    pub fn format_number(sequence: u64) -> String {
        format!("INV-{:04}", sequence)
    }
}
