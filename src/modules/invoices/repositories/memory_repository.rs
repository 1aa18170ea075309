// In-memory invoice store
//
// Same contract as the MySQL store. A per-invoice async mutex plays the part
// of the row lock and is held by the unit of work until it commits or drops;
// writes are staged on the unit and applied to the shared state on commit.
// Lock table entries are removed once no unit of work holds or awaits them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OwnedMutexGuard;

use crate::core::traits::{InvoiceStore, InvoiceUnitOfWork};
use crate::core::{AppError, Result};
use crate::middleware::auth::{hash_api_key, Owner};
use crate::modules::invoices::models::Invoice;
use crate::modules::payments::models::PaymentRecord;
use crate::modules::reminders::models::ReminderRecord;

#[derive(Default)]
struct MemoryState {
    invoices: HashMap<String, Invoice>,
    payments: Vec<PaymentRecord>,
    reminders: Vec<ReminderRecord>,
    milestones_paid: HashMap<String, DateTime<Utc>>,
    owners_by_key_hash: HashMap<String, Owner>,
}

impl MemoryState {
    fn ledger_sum(&self, invoice_id: &str) -> i64 {
        self.payments
            .iter()
            .filter(|p| p.invoice_id == invoice_id)
            .map(|p| p.amount)
            .sum()
    }

    fn find_by_external_ref(&self, invoice_id: &str, external_ref: &str) -> Option<&PaymentRecord> {
        self.payments
            .iter()
            .find(|p| p.invoice_id == invoice_id && p.external_ref.as_deref() == Some(external_ref))
    }
}

type LockTable = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// Held invoice lock; drops its lock table entry when nobody else wants it
struct InvoiceLockGuard {
    guard: Option<OwnedMutexGuard<()>>,
    table: Arc<LockTable>,
    invoice_id: String,
}

impl Drop for InvoiceLockGuard {
    fn drop(&mut self) {
        self.guard.take();

        if let Ok(mut locks) = self.table.lock() {
            let unused = locks
                .get(&self.invoice_id)
                .is_some_and(|lock| Arc::strong_count(lock) == 1);
            if unused {
                locks.remove(&self.invoice_id);
            }
        }
    }
}

fn lock_state(state: &Mutex<MemoryState>) -> Result<MutexGuard<'_, MemoryState>> {
    state
        .lock()
        .map_err(|_| AppError::internal("In-memory store lock poisoned"))
}

/// Invoice store kept in process memory
#[derive(Default, Clone)]
pub struct InMemoryInvoiceRepository {
    state: Arc<Mutex<MemoryState>>,
    invoice_locks: Arc<LockTable>,
}

impl InMemoryInvoiceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an API key for an owner
    pub fn register_api_key(&self, api_key: &str, owner: Owner) -> Result<()> {
        lock_state(&self.state)?
            .owners_by_key_hash
            .insert(hash_api_key(api_key), owner);
        Ok(())
    }

    /// When the milestone was marked paid, if ever
    pub fn milestone_paid_at(&self, milestone_id: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(lock_state(&self.state)?
            .milestones_paid
            .get(milestone_id)
            .copied())
    }

    fn invoice_lock(&self, invoice_id: &str) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .invoice_locks
            .lock()
            .map_err(|_| AppError::internal("In-memory lock table poisoned"))?;

        Ok(locks
            .entry(invoice_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone())
    }
}

#[async_trait]
impl InvoiceStore for InMemoryInvoiceRepository {
    async fn insert_invoice(&self, invoice: &Invoice) -> Result<()> {
        let mut state = lock_state(&self.state)?;

        let duplicate_number = state.invoices.values().any(|existing| {
            existing.owner_id == invoice.owner_id && existing.invoice_number == invoice.invoice_number
        });
        if duplicate_number {
            return Err(AppError::validation(format!(
                "Invoice number '{}' already exists",
                invoice.invoice_number
            )));
        }

        state.invoices.insert(invoice.id.clone(), invoice.clone());
        Ok(())
    }

    async fn find_invoice(&self, owner_id: &str, invoice_id: &str) -> Result<Option<Invoice>> {
        Ok(lock_state(&self.state)?
            .invoices
            .get(invoice_id)
            .filter(|invoice| invoice.owner_id == owner_id)
            .cloned())
    }

    async fn find_invoice_by_token(&self, token: &str) -> Result<Option<Invoice>> {
        Ok(lock_state(&self.state)?
            .invoices
            .values()
            .find(|invoice| invoice.access_token.as_deref() == Some(token))
            .cloned())
    }

    async fn list_invoices(&self, owner_id: &str, limit: i64, offset: i64) -> Result<Vec<Invoice>> {
        let state = lock_state(&self.state)?;

        let mut invoices: Vec<Invoice> = state
            .invoices
            .values()
            .filter(|invoice| invoice.owner_id == owner_id)
            .cloned()
            .collect();
        invoices.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(invoices
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(0))
            .take(usize::try_from(limit).unwrap_or(0))
            .collect())
    }

    async fn list_reminder_candidates(&self) -> Result<Vec<Invoice>> {
        let state = lock_state(&self.state)?;

        let mut candidates: Vec<Invoice> = state
            .invoices
            .values()
            .filter(|invoice| invoice.auto_remind && invoice.status.accepts_payments())
            .cloned()
            .collect();
        candidates.sort_by_key(|invoice| invoice.sent_at);

        Ok(candidates)
    }

    async fn list_payments(&self, invoice_id: &str) -> Result<Vec<PaymentRecord>> {
        Ok(lock_state(&self.state)?
            .payments
            .iter()
            .filter(|p| p.invoice_id == invoice_id)
            .cloned()
            .collect())
    }

    async fn list_reminders(&self, invoice_id: &str) -> Result<Vec<ReminderRecord>> {
        Ok(lock_state(&self.state)?
            .reminders
            .iter()
            .filter(|r| r.invoice_id == invoice_id)
            .cloned()
            .collect())
    }

    async fn find_owner_by_key_hash(&self, key_hash: &str) -> Result<Option<Owner>> {
        Ok(lock_state(&self.state)?
            .owners_by_key_hash
            .get(key_hash)
            .cloned())
    }

    async fn ping(&self) -> Result<()> {
        lock_state(&self.state).map(|_| ())
    }

    async fn begin(&self, invoice_id: &str) -> Result<Option<Box<dyn InvoiceUnitOfWork>>> {
        let guard = self.invoice_lock(invoice_id)?.lock_owned().await;
        let lock = InvoiceLockGuard {
            guard: Some(guard),
            table: Arc::clone(&self.invoice_locks),
            invoice_id: invoice_id.to_string(),
        };

        let (invoice, committed_sum) = {
            let state = lock_state(&self.state)?;
            match state.invoices.get(invoice_id) {
                Some(invoice) => (invoice.clone(), state.ledger_sum(invoice_id)),
                None => return Ok(None),
            }
        };

        Ok(Some(Box::new(MemoryUnitOfWork {
            _lock: lock,
            state: Arc::clone(&self.state),
            invoice,
            invoice_dirty: false,
            committed_sum,
            staged_payments: Vec::new(),
            staged_reminders: Vec::new(),
            staged_milestones: Vec::new(),
        })))
    }
}

struct MemoryUnitOfWork {
    _lock: InvoiceLockGuard,
    state: Arc<Mutex<MemoryState>>,
    invoice: Invoice,
    invoice_dirty: bool,
    committed_sum: i64,
    staged_payments: Vec<PaymentRecord>,
    staged_reminders: Vec<ReminderRecord>,
    staged_milestones: Vec<(String, DateTime<Utc>)>,
}

#[async_trait]
impl InvoiceUnitOfWork for MemoryUnitOfWork {
    fn invoice(&self) -> &Invoice {
        &self.invoice
    }

    async fn sum_payments(&mut self) -> Result<i64> {
        let staged: i64 = self.staged_payments.iter().map(|p| p.amount).sum();
        Ok(self.committed_sum + staged)
    }

    async fn find_payment_by_external_ref(
        &mut self,
        external_ref: &str,
    ) -> Result<Option<PaymentRecord>> {
        if let Some(staged) = self
            .staged_payments
            .iter()
            .find(|p| p.external_ref.as_deref() == Some(external_ref))
        {
            return Ok(Some(staged.clone()));
        }

        Ok(lock_state(&self.state)?
            .find_by_external_ref(&self.invoice.id, external_ref)
            .cloned())
    }

    async fn insert_payment(&mut self, payment: &PaymentRecord) -> Result<()> {
        if let Some(external_ref) = payment.external_ref.as_deref() {
            let staged_dup = self
                .staged_payments
                .iter()
                .any(|p| p.external_ref.as_deref() == Some(external_ref));
            let committed_dup = lock_state(&self.state)?
                .find_by_external_ref(&payment.invoice_id, external_ref)
                .is_some();
            if staged_dup || committed_dup {
                return Err(AppError::validation("External reference is already recorded"));
            }
        }

        self.staged_payments.push(payment.clone());
        Ok(())
    }

    async fn insert_reminder(&mut self, reminder: &ReminderRecord) -> Result<()> {
        self.staged_reminders.push(reminder.clone());
        Ok(())
    }

    async fn update_invoice(&mut self, invoice: &Invoice) -> Result<()> {
        self.invoice = invoice.clone();
        self.invoice_dirty = true;
        Ok(())
    }

    async fn mark_milestone_paid(&mut self, milestone_id: &str, paid_at: DateTime<Utc>) -> Result<()> {
        self.staged_milestones.push((milestone_id.to_string(), paid_at));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let this = *self;
        let mut state = lock_state(&this.state)?;

        for payment in &this.staged_payments {
            if let Some(external_ref) = payment.external_ref.as_deref() {
                if state
                    .find_by_external_ref(&payment.invoice_id, external_ref)
                    .is_some()
                {
                    return Err(AppError::validation("External reference is already recorded"));
                }
            }
        }

        if this.invoice_dirty {
            state
                .invoices
                .insert(this.invoice.id.clone(), this.invoice.clone());
        }
        state.payments.extend(this.staged_payments);
        state.reminders.extend(this.staged_reminders);
        state.milestones_paid.extend(this.staged_milestones);

        Ok(())
    }
}
