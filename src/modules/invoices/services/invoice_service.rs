use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::access_token::mint_access_token;
use super::status_machine::{derive_status, recompute};
use crate::core::traits::{lock_invoice, InvoiceAccess, InvoiceStore};
use crate::core::{AppError, Clock, Result};
use crate::middleware::auth::Owner;
use crate::modules::invoices::models::{
    CreateInvoiceRequest, Invoice, InvoiceResponse, InvoiceStatus, PublicInvoiceView,
    UpdateInvoiceRequest,
};
use crate::modules::notifications::models::{InvoiceIssuedNotice, PublicLinks};
use crate::modules::notifications::services::NotificationDispatcher;
use crate::modules::payments::models::PaymentRecord;
use crate::modules::payments::services::ensure_partial_config_mutable;
use crate::modules::reminders::models::ReminderRecord;

/// Default and maximum page size for invoice listings
pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 100;

const MAX_NOTES_CHARS: usize = 2000;

/// Invoice with its ledger and reminder history
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: InvoiceResponse,
    pub payments: Vec<PaymentRecord>,
    pub reminders: Vec<ReminderRecord>,
}

/// Service for invoice lifecycle operations
pub struct InvoiceService {
    store: Arc<dyn InvoiceStore>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    links: PublicLinks,
}

impl InvoiceService {
    pub fn new(
        store: Arc<dyn InvoiceStore>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        clock: Arc<dyn Clock>,
        links: PublicLinks,
    ) -> Self {
        Self {
            store,
            dispatcher,
            clock,
            links,
        }
    }

    /// Create a draft invoice
    pub async fn create_invoice(&self, owner: &Owner, request: CreateInvoiceRequest) -> Result<Invoice> {
        let invoice = Invoice::new(owner, request, self.clock.now())?;
        Self::validate_notes(invoice.notes.as_deref())?;

        self.store.insert_invoice(&invoice).await?;

        tracing::info!(
            invoice_id = %invoice.id,
            owner_id = %owner.id,
            invoice_number = %invoice.invoice_number,
            total = invoice.total,
            "Invoice created"
        );

        Ok(invoice)
    }

    /// Invoice with payments and reminders
    pub async fn get_invoice(&self, owner_id: &str, invoice_id: &str) -> Result<InvoiceDetail> {
        let invoice = self
            .store
            .find_invoice(owner_id, invoice_id)
            .await?
            .ok_or_else(|| AppError::not_found("Invoice not found"))?;

        let payments = self.store.list_payments(invoice_id).await?;
        let reminders = self.store.list_reminders(invoice_id).await?;

        Ok(InvoiceDetail {
            invoice: self.current_view(invoice).into(),
            payments,
            reminders,
        })
    }

    /// Page through an owner's invoices, newest first
    pub async fn list_invoices(
        &self,
        owner_id: &str,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Invoice>> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = offset.unwrap_or(0).max(0);

        let invoices = self.store.list_invoices(owner_id, limit, offset).await?;
        Ok(invoices
            .into_iter()
            .map(|invoice| self.current_view(invoice))
            .collect())
    }

    /// Issue a draft: mint the public token and move it to `sent`.
    /// Happens exactly once per invoice.
    pub async fn send_invoice(&self, owner_id: &str, invoice_id: &str) -> Result<Invoice> {
        let now = self.clock.now();
        let mut uow = lock_invoice(
            self.store.as_ref(),
            InvoiceAccess::Owner { owner_id, invoice_id },
        )
        .await?;

        let mut invoice = uow.invoice().clone();

        if invoice.is_sent() || invoice.status != InvoiceStatus::Draft {
            return Err(AppError::invalid_state(format!(
                "Only draft invoices can be sent; invoice is {}",
                invoice.status
            )));
        }

        invoice.access_token = Some(mint_access_token(&invoice.id));
        invoice.sent_at = Some(now);

        let ledger_sum = uow.sum_payments().await?;
        recompute(&mut invoice, ledger_sum, now, None)?;
        invoice.updated_at = now;

        uow.update_invoice(&invoice).await?;
        uow.commit().await?;

        tracing::info!(invoice_id = %invoice.id, status = %invoice.status, "Invoice sent");

        let notice = InvoiceIssuedNotice::new(&invoice, &self.links);
        if let Err(e) = self.dispatcher.send_invoice_issued(&notice).await {
            tracing::warn!(
                invoice_id = %invoice.id,
                dispatcher = self.dispatcher.name(),
                error = %e,
                "Invoice issued notification failed"
            );
        }

        Ok(invoice)
    }

    /// Resolve the public access token. The first resolution stamps
    /// `viewed_at`, taking a `sent` invoice to `viewed`.
    pub async fn resolve_public_token(&self, token: &str) -> Result<PublicInvoiceView> {
        let snapshot = self
            .store
            .find_invoice_by_token(token)
            .await?
            .ok_or_else(|| AppError::not_found("Invoice not found"))?;

        if snapshot.viewed_at.is_some() || snapshot.status.is_terminal() {
            return Ok(self.current_view(snapshot).into());
        }

        let now = self.clock.now();
        let mut uow = lock_invoice(self.store.as_ref(), InvoiceAccess::Token(token)).await?;
        let mut invoice = uow.invoice().clone();

        if invoice.viewed_at.is_none() && !invoice.status.is_terminal() {
            invoice.viewed_at = Some(now);
            let ledger_sum = uow.sum_payments().await?;
            recompute(&mut invoice, ledger_sum, now, None)?;
            invoice.updated_at = now;

            uow.update_invoice(&invoice).await?;
            uow.commit().await?;

            tracing::info!(invoice_id = %invoice.id, status = %invoice.status, "Invoice viewed");
        }

        Ok(invoice.into())
    }

    /// Turn automatic reminders on or off, in any status
    pub async fn toggle_auto_remind(&self, owner_id: &str, invoice_id: &str, enabled: bool) -> Result<Invoice> {
        let now = self.clock.now();
        let mut uow = lock_invoice(
            self.store.as_ref(),
            InvoiceAccess::Owner { owner_id, invoice_id },
        )
        .await?;

        let mut invoice = uow.invoice().clone();
        if invoice.auto_remind != enabled {
            invoice.auto_remind = enabled;
            invoice.updated_at = now;
            uow.update_invoice(&invoice).await?;
            uow.commit().await?;
        }

        Ok(invoice)
    }

    /// Change the partial-payment configuration.
    ///
    /// Only while draft, sent or viewed with an empty ledger.
    pub async fn toggle_partial_payments(
        &self,
        owner_id: &str,
        invoice_id: &str,
        allow: bool,
        minimum_payment_amount: Option<i64>,
    ) -> Result<Invoice> {
        let now = self.clock.now();
        let mut uow = lock_invoice(
            self.store.as_ref(),
            InvoiceAccess::Owner { owner_id, invoice_id },
        )
        .await?;

        let mut invoice = uow.invoice().clone();
        let ledger_sum = uow.sum_payments().await?;
        recompute(&mut invoice, ledger_sum, now, None)?;

        ensure_partial_config_mutable(invoice.status, ledger_sum)?;

        let minimum = if allow { minimum_payment_amount } else { None };
        Invoice::validate_partial_config(allow, minimum, invoice.total)?;

        invoice.allow_partial_payments = allow;
        invoice.minimum_payment_amount = minimum;
        invoice.updated_at = now;

        uow.update_invoice(&invoice).await?;
        uow.commit().await?;

        tracing::info!(
            invoice_id = %invoice.id,
            allow_partial_payments = allow,
            minimum_payment_amount = ?minimum,
            "Partial payment settings changed"
        );

        Ok(invoice)
    }

    /// Edit due date and notes of a non-terminal invoice
    pub async fn update_invoice(
        &self,
        owner_id: &str,
        invoice_id: &str,
        request: UpdateInvoiceRequest,
    ) -> Result<Invoice> {
        Self::validate_notes(request.notes.as_deref())?;

        let now = self.clock.now();
        let mut uow = lock_invoice(
            self.store.as_ref(),
            InvoiceAccess::Owner { owner_id, invoice_id },
        )
        .await?;

        let mut invoice = uow.invoice().clone();
        if invoice.status.is_terminal() {
            return Err(AppError::invalid_state(format!(
                "A {} invoice cannot be edited",
                invoice.status
            )));
        }

        if let Some(due_date) = request.due_date {
            invoice.due_date = due_date;
        }
        if let Some(notes) = request.notes {
            invoice.notes = (!notes.trim().is_empty()).then_some(notes);
        }
        invoice.updated_at = now;

        let ledger_sum = uow.sum_payments().await?;
        recompute(&mut invoice, ledger_sum, now, None)?;

        uow.update_invoice(&invoice).await?;
        uow.commit().await?;

        Ok(invoice)
    }

    /// Cancel an invoice nobody has paid anything on
    pub async fn cancel_invoice(&self, owner_id: &str, invoice_id: &str) -> Result<Invoice> {
        let now = self.clock.now();
        let mut uow = lock_invoice(
            self.store.as_ref(),
            InvoiceAccess::Owner { owner_id, invoice_id },
        )
        .await?;

        let mut invoice = uow.invoice().clone();
        let ledger_sum = uow.sum_payments().await?;
        recompute(&mut invoice, ledger_sum, now, None)?;

        let cancellable = matches!(
            invoice.status,
            InvoiceStatus::Draft | InvoiceStatus::Sent | InvoiceStatus::Viewed | InvoiceStatus::Overdue
        );
        if !cancellable || ledger_sum > 0 {
            return Err(AppError::invalid_state(format!(
                "A {} invoice cannot be cancelled",
                invoice.status
            )));
        }

        invoice.cancelled_at = Some(now);
        recompute(&mut invoice, ledger_sum, now, None)?;

        uow.update_invoice(&invoice).await?;
        uow.commit().await?;

        tracing::info!(invoice_id = %invoice.id, "Invoice cancelled");

        Ok(invoice)
    }

    /// Present the status as of now without persisting it
    fn current_view(&self, mut invoice: Invoice) -> Invoice {
        let now: DateTime<Utc> = self.clock.now();
        let derived = derive_status(&invoice, invoice.amount_paid, now);
        if invoice.status.can_transition_to(derived) {
            invoice.status = derived;
        }
        invoice
    }

    fn validate_notes(notes: Option<&str>) -> Result<()> {
        if notes.is_some_and(|n| n.chars().count() > MAX_NOTES_CHARS) {
            return Err(AppError::validation(format!(
                "Notes cannot exceed {} characters",
                MAX_NOTES_CHARS
            )));
        }
        Ok(())
    }
}
