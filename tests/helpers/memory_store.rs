// In-memory stores
//
// One `MemoryStore` backs both repository traits so settlement can touch the
// payment and its invoice under the same lock, the way the MySQL version does
// inside one transaction. Fault hooks let tests force CAS conflicts and
// persistence failures.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use wreckpay::core::{AppError, Result};
use wreckpay::invoices::{BalanceChange, Invoice, InvoiceRepository};
use wreckpay::middleware::{hash_session_token, SessionRecord, SessionRepository, UserRole};
use wreckpay::payments::models::{IntentSettlement, PaymentStatus, SettlementOutcome};
use wreckpay::payments::{Payment, PaymentFilter, PaymentRepository};

#[derive(Default)]
struct State {
    invoices: HashMap<String, Invoice>,
    /// Insertion order doubles as creation order
    payments: Vec<Payment>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    /// Invoice id -> number of balance writes to reject as if raced
    forced_conflicts: Mutex<HashMap<String, usize>>,
    /// Invoice ids whose balance writes fail outright
    broken_invoices: Mutex<Vec<String>>,
    fail_settlement: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_invoice(&self, invoice: Invoice) {
        self.state
            .lock()
            .unwrap()
            .invoices
            .insert(invoice.id.clone(), invoice);
    }

    pub fn invoice(&self, id: &str) -> Invoice {
        self.state
            .lock()
            .unwrap()
            .invoices
            .get(id)
            .cloned()
            .unwrap_or_else(|| panic!("invoice {} not in store", id))
    }

    pub fn payments(&self) -> Vec<Payment> {
        self.state.lock().unwrap().payments.clone()
    }

    pub fn payment_for_intent(&self, intent_id: &str) -> Option<Payment> {
        self.state
            .lock()
            .unwrap()
            .payments
            .iter()
            .find(|p| p.stripe_payment_intent_id.as_deref() == Some(intent_id))
            .cloned()
    }

    pub fn insert_payment(&self, payment: Payment) {
        self.state.lock().unwrap().payments.push(payment);
    }

    /// Reject the next `times` balance writes on `invoice_id`
    pub fn force_conflicts(&self, invoice_id: &str, times: usize) {
        self.forced_conflicts
            .lock()
            .unwrap()
            .insert(invoice_id.to_string(), times);
    }

    pub fn break_invoice(&self, invoice_id: &str) {
        self.broken_invoices
            .lock()
            .unwrap()
            .push(invoice_id.to_string());
    }

    pub fn fail_settlements(&self, fail: bool) {
        self.fail_settlement.store(fail, Ordering::SeqCst);
    }

    fn take_forced_conflict(&self, invoice_id: &str) -> bool {
        let mut forced = self.forced_conflicts.lock().unwrap();
        match forced.get_mut(invoice_id) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl InvoiceRepository for MemoryStore {
    async fn create(&self, invoice: &Invoice) -> Result<Invoice> {
        let mut state = self.state.lock().unwrap();
        if state
            .invoices
            .values()
            .any(|i| i.invoice_number == invoice.invoice_number)
        {
            return Err(AppError::Conflict(format!(
                "Invoice number '{}' already exists",
                invoice.invoice_number
            )));
        }
        state.invoices.insert(invoice.id.clone(), invoice.clone());
        Ok(invoice.clone())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Invoice>> {
        Ok(self.state.lock().unwrap().invoices.get(id).cloned())
    }

    async fn next_invoice_number(&self) -> Result<String> {
        let count = self.state.lock().unwrap().invoices.len() as u64;
        Ok(Invoice::format_number(count + 1))
    }

    async fn set_payment_intent(&self, id: &str, intent_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let invoice = state
            .invoices
            .get_mut(id)
            .ok_or_else(|| AppError::not_found(format!("Invoice '{}' not found", id)))?;
        invoice.stripe_payment_intent_id = Some(intent_id.to_string());
        invoice.updated_at = Utc::now();
        Ok(())
    }

    async fn apply_balance_change(&self, change: &BalanceChange) -> Result<bool> {
        if self
            .broken_invoices
            .lock()
            .unwrap()
            .contains(&change.invoice_id)
        {
            return Err(AppError::internal("simulated write failure"));
        }

        if self.take_forced_conflict(&change.invoice_id) {
            return Ok(false);
        }

        let mut state = self.state.lock().unwrap();
        let Some(invoice) = state.invoices.get_mut(&change.invoice_id) else {
            return Ok(false);
        };
        if invoice.balance_due != change.expected_balance {
            return Ok(false);
        }

        invoice.balance_due = change.new_balance;
        invoice.invoice_status = change.new_status;
        if change.paid_at.is_some() {
            invoice.paid_at = change.paid_at;
        }
        invoice.updated_at = Utc::now();
        Ok(true)
    }
}

#[async_trait]
impl PaymentRepository for MemoryStore {
    async fn create(&self, payment: &Payment) -> Result<Payment> {
        let mut state = self.state.lock().unwrap();
        let taken = state.payments.iter().any(|p| {
            p.payment_number == payment.payment_number
                || (payment.stripe_payment_intent_id.is_some()
                    && p.stripe_payment_intent_id == payment.stripe_payment_intent_id)
        });
        if taken {
            return Err(AppError::Conflict(format!(
                "Payment '{}' already exists",
                payment.payment_number
            )));
        }
        state.payments.push(payment.clone());
        Ok(payment.clone())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Payment>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .payments
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn find_by_intent_id(&self, intent_id: &str) -> Result<Option<Payment>> {
        Ok(self.payment_for_intent(intent_id))
    }

    async fn find_active_intent_for_invoice(&self, invoice_id: &str) -> Result<Option<Payment>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .payments
            .iter()
            .rev()
            .find(|p| {
                p.invoice_id.as_deref() == Some(invoice_id)
                    && p.stripe_payment_intent_id.is_some()
                    && p.status != PaymentStatus::Failed
            })
            .cloned())
    }

    async fn delete_pending(&self, id: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let before = state.payments.len();
        state
            .payments
            .retain(|p| !(p.id == id && p.status == PaymentStatus::Pending));
        Ok(state.payments.len() < before)
    }

    async fn list(&self, filter: &PaymentFilter) -> Result<Vec<Payment>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .payments
            .iter()
            .rev()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.state.lock().unwrap().payments.len() as u64)
    }

    async fn settle_intent_succeeded(
        &self,
        settlement: &IntentSettlement,
    ) -> Result<SettlementOutcome> {
        if self.fail_settlement.load(Ordering::SeqCst) {
            return Err(AppError::internal("simulated settlement failure"));
        }

        let mut state = self.state.lock().unwrap();
        let State { invoices, payments } = &mut *state;

        let existing = payments
            .iter()
            .position(|p| p.stripe_payment_intent_id.as_deref() == Some(settlement.intent_id.as_str()));

        if let Some(index) = existing {
            if payments[index].is_succeeded() {
                return Ok(SettlementOutcome::AlreadyProcessed);
            }
        }

        let mut invoice = invoices.get(&settlement.invoice_id).cloned();
        let mut payment = match existing {
            Some(index) => payments[index].clone(),
            None => settlement.orphan_payment(invoice.as_ref()),
        };

        settlement.apply(&mut payment, invoice.as_mut());

        match existing {
            Some(index) => payments[index] = payment.clone(),
            None => payments.push(payment.clone()),
        }
        if let Some(invoice) = &invoice {
            invoices.insert(invoice.id.clone(), invoice.clone());
        }

        Ok(SettlementOutcome::Applied { payment, invoice })
    }

    async fn mark_intent_failed(&self, intent_id: &str) -> Result<SettlementOutcome> {
        let mut state = self.state.lock().unwrap();
        let Some(payment) = state
            .payments
            .iter_mut()
            .find(|p| p.stripe_payment_intent_id.as_deref() == Some(intent_id))
        else {
            return Ok(SettlementOutcome::Unmatched);
        };

        if payment.status != PaymentStatus::Pending {
            return Ok(SettlementOutcome::AlreadyProcessed);
        }

        payment.status = PaymentStatus::Failed;
        payment.updated_at = Utc::now();

        Ok(SettlementOutcome::Applied {
            payment: payment.clone(),
            invoice: None,
        })
    }
}

/// Session table stand-in
#[derive(Default)]
pub struct MemorySessions {
    sessions: Mutex<HashMap<String, SessionRecord>>,
}

impl MemorySessions {
    /// Register `token` for `user_id`, valid for an hour
    pub fn issue(&self, token: &str, user_id: &str, role: UserRole) {
        let role = match role {
            UserRole::Admin => "admin",
            UserRole::Staff => "staff",
            UserRole::Customer => "customer",
        };
        self.sessions.lock().unwrap().insert(
            hash_session_token(token),
            SessionRecord {
                user_id: user_id.to_string(),
                role: role.to_string(),
                expires_at: Utc::now() + chrono::Duration::hours(1),
            },
        );
    }
}

#[async_trait]
impl SessionRepository for MemorySessions {
    async fn find_active(&self, token_hash: &str) -> Result<Option<SessionRecord>> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .get(token_hash)
            .filter(|s| s.expires_at > Utc::now())
            .cloned())
    }
}
