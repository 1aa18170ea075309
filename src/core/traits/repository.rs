use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::core::{AppError, Result};
use crate::middleware::auth::Owner;
use crate::modules::invoices::models::Invoice;
use crate::modules::payments::models::PaymentRecord;
use crate::modules::reminders::models::ReminderRecord;

/// Persistence contract consumed by the engine.
///
/// Reads outside a unit of work are snapshots. Every mutation of an invoice,
/// its ledger, or its reminder history goes through [`InvoiceUnitOfWork`],
/// which holds the invoice's single-writer lock until commit or drop.
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Insert a freshly created invoice with its line items
    async fn insert_invoice(&self, invoice: &Invoice) -> Result<()>;

    /// Find an invoice scoped to its owner
    async fn find_invoice(&self, owner_id: &str, invoice_id: &str) -> Result<Option<Invoice>>;

    /// Find an invoice through its public access token
    async fn find_invoice_by_token(&self, token: &str) -> Result<Option<Invoice>>;

    /// List an owner's invoices, newest first
    async fn list_invoices(&self, owner_id: &str, limit: i64, offset: i64) -> Result<Vec<Invoice>>;

    /// Invoices with auto-remind enabled in a status that can still be chased
    async fn list_reminder_candidates(&self) -> Result<Vec<Invoice>>;

    /// Ledger entries of an invoice, oldest first
    async fn list_payments(&self, invoice_id: &str) -> Result<Vec<PaymentRecord>>;

    /// Reminder history of an invoice, oldest first
    async fn list_reminders(&self, invoice_id: &str) -> Result<Vec<ReminderRecord>>;

    /// Resolve an API key hash to the owning account
    async fn find_owner_by_key_hash(&self, key_hash: &str) -> Result<Option<Owner>>;

    /// Readiness probe
    async fn ping(&self) -> Result<()>;

    /// Lock the invoice row and open an atomic unit of work on it.
    ///
    /// Returns `Ok(None)` when the invoice does not exist.
    async fn begin(&self, invoice_id: &str) -> Result<Option<Box<dyn InvoiceUnitOfWork>>>;
}

/// Atomic unit of work scoped to one invoice.
///
/// Dropping without [`commit`](InvoiceUnitOfWork::commit) discards every
/// staged write.
#[async_trait]
pub trait InvoiceUnitOfWork: Send {
    /// Invoice as read under the lock, including updates staged so far
    fn invoice(&self) -> &Invoice;

    /// Sum of all ledger entries, including entries staged in this unit
    async fn sum_payments(&mut self) -> Result<i64>;

    /// Look up this invoice's ledger entry by its processor reference
    async fn find_payment_by_external_ref(
        &mut self,
        external_ref: &str,
    ) -> Result<Option<PaymentRecord>>;

    async fn insert_payment(&mut self, payment: &PaymentRecord) -> Result<()>;

    async fn insert_reminder(&mut self, reminder: &ReminderRecord) -> Result<()>;

    /// Persist the invoice's mutable fields and derived cache
    async fn update_invoice(&mut self, invoice: &Invoice) -> Result<()>;

    /// Mark the project milestone billed by this invoice as paid
    async fn mark_milestone_paid(&mut self, milestone_id: &str, paid_at: DateTime<Utc>)
        -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
}

/// How a caller reaches an invoice
#[derive(Debug, Clone, Copy)]
pub enum InvoiceAccess<'a> {
    /// Authenticated owner
    Owner { owner_id: &'a str, invoice_id: &'a str },
    /// Client holding the public access token
    Token(&'a str),
    /// Trusted internal caller (signed notifier, sweep)
    System { invoice_id: &'a str },
}

/// Open a unit of work on the invoice the caller is allowed to see.
///
/// An invoice that exists but belongs to someone else is reported exactly
/// like a missing one.
pub async fn lock_invoice(
    store: &dyn InvoiceStore,
    access: InvoiceAccess<'_>,
) -> Result<Box<dyn InvoiceUnitOfWork>> {
    let invoice_id = match access {
        InvoiceAccess::Owner { invoice_id, .. } | InvoiceAccess::System { invoice_id } => {
            invoice_id.to_string()
        }
        InvoiceAccess::Token(token) => {
            store
                .find_invoice_by_token(token)
                .await?
                .ok_or_else(|| AppError::not_found("Invoice not found"))?
                .id
        }
    };

    let uow = store
        .begin(&invoice_id)
        .await?
        .ok_or_else(|| AppError::not_found("Invoice not found"))?;

    let visible = match access {
        InvoiceAccess::Owner { owner_id, .. } => uow.invoice().owner_id == owner_id,
        InvoiceAccess::Token(token) => uow.invoice().access_token.as_deref() == Some(token),
        InvoiceAccess::System { .. } => true,
    };

    if !visible {
        return Err(AppError::not_found("Invoice not found"));
    }

    Ok(uow)
}
