use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::allocation::{Allocation, AllocationRequest};
use crate::core::{money, AppError, Result};
use crate::modules::invoices::models::Invoice;

/// Payment method recorded while a gateway payment is still pending
pub const GATEWAY_PAYMENT_METHOD: &str = "stripe";

/// Methods staff may pick when recording a payment by hand
pub const MANUAL_PAYMENT_METHODS: &[&str] = &["cash", "check", "bank_transfer", "card", "other"];

/// Payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Gateway intent created, outcome unknown
    #[default]
    Pending,

    /// Funds received
    Succeeded,

    /// Processor reported the attempt failed
    Failed,
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Succeeded => write!(f, "succeeded"),
            PaymentStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "succeeded" => Ok(PaymentStatus::Succeeded),
            "failed" => Ok(PaymentStatus::Failed),
            _ => Err(format!("Invalid payment status: {}", s)),
        }
    }
}

/// Recorded transfer of funds, possibly split across invoices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub payment_number: String,
    pub user_id: String,
    /// Target invoice for gateway payments
    pub invoice_id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub payment_method: String,
    pub payment_date: NaiveDate,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
    pub stripe_payment_intent_id: Option<String>,
    pub allocations: Vec<Allocation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Pending payment backing a freshly created processor intent.
    ///
    /// The payment number embeds the intent id, which the processor
    /// guarantees unique, so no counter is involved.
    pub fn for_intent(invoice: &Invoice, user_id: &str, intent_id: &str) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4().to_string(),
            payment_number: Self::gateway_number(intent_id),
            user_id: user_id.to_string(),
            invoice_id: Some(invoice.id.clone()),
            customer_name: Some(invoice.customer_name.clone()),
            customer_email: invoice.customer_email.clone(),
            amount: invoice.total_amount,
            status: PaymentStatus::Pending,
            payment_method: GATEWAY_PAYMENT_METHOD.to_string(),
            payment_date: now.date_naive(),
            reference_number: None,
            notes: None,
            stripe_payment_intent_id: Some(intent_id.to_string()),
            allocations: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Manually recorded payment; manual payments are final on entry
    pub fn manual(
        user_id: &str,
        request: &RecordPaymentRequest,
        payment_number: String,
        allocations: Vec<Allocation>,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4().to_string(),
            payment_number,
            user_id: user_id.to_string(),
            invoice_id: None,
            customer_name: request.customer_name.clone(),
            customer_email: request.customer_email.clone(),
            amount: money::round(request.amount),
            status: PaymentStatus::Succeeded,
            payment_method: request.payment_method.clone(),
            payment_date: request.payment_date.unwrap_or_else(|| now.date_naive()),
            reference_number: request.reference_number.clone(),
            notes: request.notes.clone(),
            stripe_payment_intent_id: None,
            allocations,
            created_at: now,
            updated_at: now,
        }
    }

    /// `PAY-<intent id>`
    pub fn gateway_number(intent_id: &str) -> String {
        format!("PAY-{}", intent_id)
    }

    /// Count-based manual payment number, e.g. `PAY-0001`
    pub fn sequence_number(sequence: u64) -> String {
        format!("PAY-{:04}", sequence)
    }

    pub fn allocated_total(&self) -> Decimal {
        self.allocations.iter().map(|a| a.amount_applied).sum()
    }

    pub fn is_succeeded(&self) -> bool {
        self.status == PaymentStatus::Succeeded
    }
}

/// Body of `POST /payments`
#[derive(Debug, Clone, Deserialize)]
pub struct RecordPaymentRequest {
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub amount: Decimal,
    pub payment_method: String,
    pub payment_date: Option<NaiveDate>,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub allocations: Vec<AllocationRequest>,
}

impl RecordPaymentRequest {
    /// Checks made before any invoice is touched
    pub fn validate(&self) -> Result<()> {
        money::validate_positive(self.amount, "amount")?;

        if !MANUAL_PAYMENT_METHODS.contains(&self.payment_method.as_str()) {
            return Err(AppError::validation(format!(
                "Unsupported payment method '{}', expected one of: {}",
                self.payment_method,
                MANUAL_PAYMENT_METHODS.join(", ")
            )));
        }

        for allocation in &self.allocations {
            if allocation.invoice_id.trim().is_empty() {
                return Err(AppError::validation("Allocation invoice_id cannot be empty"));
            }
            money::validate_positive(allocation.amount_applied, "amount_applied")?;
        }

        let requested: Decimal = self.allocations.iter().map(|a| a.amount_applied).sum();
        if requested > self.amount {
            return Err(AppError::validation(format!(
                "Allocations total {} exceeds payment amount {}",
                requested, self.amount
            )));
        }

        Ok(())
    }
}

/// Body of `POST /payments/create-intent`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateIntentRequest {
    pub invoice_id: String,
}

/// Visibility applied when listing payments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentFilter {
    All,
    OwnedBy(String),
}

impl PaymentFilter {
    pub fn matches(&self, payment: &Payment) -> bool {
        match self {
            PaymentFilter::All => true,
            PaymentFilter::OwnedBy(user_id) => &payment.user_id == user_id,
        }
    }
}
