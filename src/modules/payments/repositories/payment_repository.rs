use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{FromRow, MySql, MySqlPool};
use std::str::FromStr;

use super::super::models::{
    Allocation, IntentSettlement, Payment, PaymentFilter, PaymentStatus, SettlementOutcome,
};
use crate::core::{AppError, Result};
use crate::modules::invoices::models::Invoice;
use crate::modules::invoices::repositories::invoice_repository::{InvoiceRow, INVOICE_COLUMNS};

/// Payment store seam
///
/// The intent id (`stripe_payment_intent_id`) is unique and doubles as the
/// dedup key for gateway-driven payments.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Persist a new payment; a taken payment number or intent id is a `Conflict`
    async fn create(&self, payment: &Payment) -> Result<Payment>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Payment>>;

    async fn find_by_intent_id(&self, intent_id: &str) -> Result<Option<Payment>>;

    /// Newest payment for the invoice that has an intent and has not failed
    async fn find_active_intent_for_invoice(&self, invoice_id: &str) -> Result<Option<Payment>>;

    /// Remove a payment only while it is still `pending`; `false` when a
    /// concurrent settlement got there first
    async fn delete_pending(&self, id: &str) -> Result<bool>;

    /// Payments visible under `filter`, newest first
    async fn list(&self, filter: &PaymentFilter) -> Result<Vec<Payment>>;

    async fn count(&self) -> Result<u64>;

    /// Payment succeeded and invoice paid, applied together or not at all
    async fn settle_intent_succeeded(
        &self,
        settlement: &IntentSettlement,
    ) -> Result<SettlementOutcome>;

    /// `pending -> failed`; the invoice is not touched
    async fn mark_intent_failed(&self, intent_id: &str) -> Result<SettlementOutcome>;
}

const PAYMENT_COLUMNS: &str = r#"
    id, payment_number, user_id, invoice_id, customer_name, customer_email,
    amount, status, payment_method, payment_date, reference_number, notes,
    stripe_payment_intent_id, allocations, created_at, updated_at
"#;

#[derive(Debug, FromRow)]
struct PaymentRow {
    id: String,
    payment_number: String,
    user_id: String,
    invoice_id: Option<String>,
    customer_name: Option<String>,
    customer_email: Option<String>,
    amount: Decimal,
    status: String,
    payment_method: String,
    payment_date: NaiveDate,
    reference_number: Option<String>,
    notes: Option<String>,
    stripe_payment_intent_id: Option<String>,
    allocations: Json<Vec<Allocation>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = AppError;

    fn try_from(row: PaymentRow) -> Result<Self> {
        let status = PaymentStatus::from_str(&row.status)
            .map_err(|e| AppError::Internal(format!("Payment {}: {}", row.id, e)))?;

        Ok(Payment {
            id: row.id,
            payment_number: row.payment_number,
            user_id: row.user_id,
            invoice_id: row.invoice_id,
            customer_name: row.customer_name,
            customer_email: row.customer_email,
            amount: row.amount,
            status,
            payment_method: row.payment_method,
            payment_date: row.payment_date,
            reference_number: row.reference_number,
            notes: row.notes,
            stripe_payment_intent_id: row.stripe_payment_intent_id,
            allocations: row.allocations.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// MySQL-backed payment repository
pub struct MySqlPaymentRepository {
    pool: MySqlPool,
}

impl MySqlPaymentRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(&self, clause: &str, value: &str) -> Result<Option<Payment>> {
        let query = format!("SELECT {} FROM payments WHERE {}", PAYMENT_COLUMNS, clause);

        sqlx::query_as::<_, PaymentRow>(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?
            .map(Payment::try_from)
            .transpose()
    }
}

/// Insert within a pool or an open transaction
async fn insert_payment<'e, E>(executor: E, payment: &Payment) -> Result<()>
where
    E: sqlx::Executor<'e, Database = MySql>,
{
    sqlx::query(
        r#"
        INSERT INTO payments (
            id, payment_number, user_id, invoice_id, customer_name, customer_email,
            amount, status, payment_method, payment_date, reference_number, notes,
            stripe_payment_intent_id, allocations, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&payment.id)
    .bind(&payment.payment_number)
    .bind(&payment.user_id)
    .bind(&payment.invoice_id)
    .bind(&payment.customer_name)
    .bind(&payment.customer_email)
    .bind(payment.amount)
    .bind(payment.status.to_string())
    .bind(&payment.payment_method)
    .bind(payment.payment_date)
    .bind(&payment.reference_number)
    .bind(&payment.notes)
    .bind(&payment.stripe_payment_intent_id)
    .bind(Json(&payment.allocations))
    .bind(payment.created_at)
    .bind(payment.updated_at)
    .execute(executor)
    .await
    .map_err(|e| {
        if let Some(db_err) = e.as_database_error() {
            if db_err.is_unique_violation() {
                return AppError::Conflict(format!(
                    "Payment '{}' already exists",
                    payment.payment_number
                ));
            }
        }
        AppError::Database(e)
    })?;

    Ok(())
}

#[async_trait]
impl PaymentRepository for MySqlPaymentRepository {
    async fn create(&self, payment: &Payment) -> Result<Payment> {
        insert_payment(&self.pool, payment).await?;
        Ok(payment.clone())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Payment>> {
        self.fetch_one_where("id = ?", id).await
    }

    async fn find_by_intent_id(&self, intent_id: &str) -> Result<Option<Payment>> {
        self.fetch_one_where("stripe_payment_intent_id = ?", intent_id)
            .await
    }

    async fn find_active_intent_for_invoice(&self, invoice_id: &str) -> Result<Option<Payment>> {
        let query = format!(
            r#"
            SELECT {} FROM payments
            WHERE invoice_id = ?
              AND stripe_payment_intent_id IS NOT NULL
              AND status <> 'failed'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            PAYMENT_COLUMNS
        );

        sqlx::query_as::<_, PaymentRow>(&query)
            .bind(invoice_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Payment::try_from)
            .transpose()
    }

    async fn delete_pending(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM payments WHERE id = ? AND status = 'pending'")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list(&self, filter: &PaymentFilter) -> Result<Vec<Payment>> {
        let rows = match filter {
            PaymentFilter::All => {
                let query = format!(
                    "SELECT {} FROM payments ORDER BY created_at DESC",
                    PAYMENT_COLUMNS
                );
                sqlx::query_as::<_, PaymentRow>(&query)
                    .fetch_all(&self.pool)
                    .await?
            }
            PaymentFilter::OwnedBy(user_id) => {
                let query = format!(
                    "SELECT {} FROM payments WHERE user_id = ? ORDER BY created_at DESC",
                    PAYMENT_COLUMNS
                );
                sqlx::query_as::<_, PaymentRow>(&query)
                    .bind(user_id)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter().map(Payment::try_from).collect()
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.max(0) as u64)
    }

    async fn settle_intent_succeeded(
        &self,
        settlement: &IntentSettlement,
    ) -> Result<SettlementOutcome> {
        let mut tx = self.pool.begin().await?;

        // Row lock on the payment serialises redeliveries of the same event
        let payment_query = format!(
            "SELECT {} FROM payments WHERE stripe_payment_intent_id = ? FOR UPDATE",
            PAYMENT_COLUMNS
        );
        let existing = sqlx::query_as::<_, PaymentRow>(&payment_query)
            .bind(&settlement.intent_id)
            .fetch_optional(&mut *tx)
            .await?
            .map(Payment::try_from)
            .transpose()?;

        if existing.as_ref().is_some_and(Payment::is_succeeded) {
            tx.rollback().await?;
            return Ok(SettlementOutcome::AlreadyProcessed);
        }

        let invoice_query = format!(
            "SELECT {} FROM invoices WHERE id = ? FOR UPDATE",
            INVOICE_COLUMNS
        );
        let mut invoice = sqlx::query_as::<_, InvoiceRow>(&invoice_query)
            .bind(&settlement.invoice_id)
            .fetch_optional(&mut *tx)
            .await?
            .map(Invoice::try_from)
            .transpose()?;

        let is_new = existing.is_none();
        let mut payment = match existing {
            Some(payment) => payment,
            None => settlement.orphan_payment(invoice.as_ref()),
        };

        settlement.apply(&mut payment, invoice.as_mut());

        if is_new {
            insert_payment(&mut *tx, &payment).await?;
        } else {
            sqlx::query(
                r#"
                UPDATE payments
                SET status = ?, payment_method = ?, invoice_id = ?, allocations = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(payment.status.to_string())
            .bind(&payment.payment_method)
            .bind(&payment.invoice_id)
            .bind(Json(&payment.allocations))
            .bind(payment.updated_at)
            .bind(&payment.id)
            .execute(&mut *tx)
            .await?;
        }

        if let Some(invoice) = &invoice {
            sqlx::query(
                r#"
                UPDATE invoices
                SET balance_due = ?, invoice_status = ?, paid_at = ?,
                    stripe_payment_intent_id = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(invoice.balance_due)
            .bind(invoice.invoice_status.to_string())
            .bind(invoice.paid_at)
            .bind(&invoice.stripe_payment_intent_id)
            .bind(invoice.updated_at)
            .bind(&invoice.id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(SettlementOutcome::Applied { payment, invoice })
    }

    async fn mark_intent_failed(&self, intent_id: &str) -> Result<SettlementOutcome> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'failed', updated_at = ?
            WHERE stripe_payment_intent_id = ? AND status = 'pending'
            "#,
        )
        .bind(Utc::now())
        .bind(intent_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(match self.find_by_intent_id(intent_id).await? {
                Some(_) => SettlementOutcome::AlreadyProcessed,
                None => SettlementOutcome::Unmatched,
            });
        }

        let payment = self.find_by_intent_id(intent_id).await?.ok_or_else(|| {
            AppError::Internal(format!("Payment for intent '{}' vanished", intent_id))
        })?;

        Ok(SettlementOutcome::Applied {
            payment,
            invoice: None,
        })
    }
}
