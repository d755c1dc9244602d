// Invoice ledger persistence.
//
// Balance writes go through `apply_balance_change`, a conditional UPDATE keyed
// on the balance the caller read. Plain read-then-write of `balance_due` is
// not offered.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, MySqlPool};
use std::str::FromStr;

use crate::core::{AppError, Result};
use crate::modules::invoices::models::{BalanceChange, Invoice, InvoiceStatus};

/// Invoice store seam; MySQL in production, in-memory in tests
#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// Persist a new invoice
    async fn create(&self, invoice: &Invoice) -> Result<Invoice>;

    /// Find invoice by ID
    async fn find_by_id(&self, id: &str) -> Result<Option<Invoice>>;

    /// Next count-based invoice number (`INV-000N`)
    async fn next_invoice_number(&self) -> Result<String>;

    /// Record the latest processor intent for cross-reference
    async fn set_payment_intent(&self, id: &str, intent_id: &str) -> Result<()>;

    /// Apply a balance change if the stored balance is still the expected one.
    ///
    /// Returns `Ok(false)` when another writer got there first.
    async fn apply_balance_change(&self, change: &BalanceChange) -> Result<bool>;
}

pub(crate) const INVOICE_COLUMNS: &str = r#"
    id, invoice_number, user_id, customer_id, customer_name, customer_email,
    total_amount, balance_due, invoice_status, due_date, paid_at,
    stripe_payment_intent_id, created_at, updated_at
"#;

#[derive(Debug, FromRow)]
pub(crate) struct InvoiceRow {
    id: String,
    invoice_number: String,
    user_id: String,
    customer_id: Option<String>,
    customer_name: String,
    customer_email: Option<String>,
    total_amount: Decimal,
    balance_due: Decimal,
    invoice_status: String,
    due_date: Option<NaiveDate>,
    paid_at: Option<DateTime<Utc>>,
    stripe_payment_intent_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = AppError;

    fn try_from(row: InvoiceRow) -> Result<Self> {
        let invoice_status = InvoiceStatus::from_str(&row.invoice_status)
            .map_err(|e| AppError::Internal(format!("Invoice {}: {}", row.id, e)))?;

        Ok(Invoice {
            id: row.id,
            invoice_number: row.invoice_number,
            user_id: row.user_id,
            customer_id: row.customer_id,
            customer_name: row.customer_name,
            customer_email: row.customer_email,
            total_amount: row.total_amount,
            balance_due: row.balance_due,
            invoice_status,
            due_date: row.due_date,
            paid_at: row.paid_at,
            stripe_payment_intent_id: row.stripe_payment_intent_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// MySQL-backed invoice repository
pub struct MySqlInvoiceRepository {
    pool: MySqlPool,
}

impl MySqlInvoiceRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InvoiceRepository for MySqlInvoiceRepository {
    async fn create(&self, invoice: &Invoice) -> Result<Invoice> {
        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, invoice_number, user_id, customer_id, customer_name, customer_email,
                total_amount, balance_due, invoice_status, due_date, paid_at,
                stripe_payment_intent_id, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.invoice_number)
        .bind(&invoice.user_id)
        .bind(&invoice.customer_id)
        .bind(&invoice.customer_name)
        .bind(&invoice.customer_email)
        .bind(invoice.total_amount)
        .bind(invoice.balance_due)
        .bind(invoice.invoice_status.to_string())
        .bind(invoice.due_date)
        .bind(invoice.paid_at)
        .bind(&invoice.stripe_payment_intent_id)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.is_unique_violation() {
                    return AppError::Conflict(format!(
                        "Invoice number '{}' already exists",
                        invoice.invoice_number
                    ));
                }
            }
            AppError::Database(e)
        })?;

        Ok(invoice.clone())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Invoice>> {
        let query = format!("SELECT {} FROM invoices WHERE id = ?", INVOICE_COLUMNS);

        sqlx::query_as::<_, InvoiceRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Invoice::try_from)
            .transpose()
    }

    async fn next_invoice_number(&self) -> Result<String> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices")
            .fetch_one(&self.pool)
            .await?;

        Ok(Invoice::format_number(count as u64 + 1))
    }

    async fn set_payment_intent(&self, id: &str, intent_id: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET stripe_payment_intent_id = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(intent_id)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Invoice '{}' not found", id)));
        }

        Ok(())
    }

    async fn apply_balance_change(&self, change: &BalanceChange) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET balance_due = ?,
                invoice_status = ?,
                paid_at = COALESCE(?, paid_at),
                updated_at = ?
            WHERE id = ? AND balance_due = ?
            "#,
        )
        .bind(change.new_balance)
        .bind(change.new_status.to_string())
        .bind(change.paid_at)
        .bind(Utc::now())
        .bind(&change.invoice_id)
        .bind(change.expected_balance)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
