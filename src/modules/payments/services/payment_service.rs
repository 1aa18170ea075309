use std::sync::Arc;

use super::partial_payment_policy::validate_payment;
use crate::core::traits::{lock_invoice, InvoiceAccess, InvoiceStore, InvoiceUnitOfWork};
use crate::core::{AppError, Clock, Result};
use crate::modules::invoices::models::Invoice;
use crate::modules::invoices::services::status_machine::{recompute, StatusChange};
use crate::modules::notifications::models::PaymentReceivedNotice;
use crate::modules::notifications::services::NotificationDispatcher;
use crate::modules::payments::models::{
    normalize_external_ref, PaymentMethod, PaymentRecord, PaymentResponse, PaymentSource,
};

/// Amount of a payment about to be recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentAmount {
    Exact(i64),
    /// Whatever is still owed, computed under the invoice lock
    RemainingBalance,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub amount: PaymentAmount,
    pub method: PaymentMethod,
    pub notes: Option<String>,
    pub external_ref: Option<String>,
    pub source: PaymentSource,
}

/// Result of a record-payment call
#[derive(Debug, Clone)]
pub struct PaymentOutcome {
    pub payment: PaymentRecord,
    /// Invoice as committed
    pub invoice: Invoice,
    /// The processor reference was already on this invoice's ledger;
    /// nothing was written
    pub duplicate: bool,
}

impl From<PaymentOutcome> for PaymentResponse {
    fn from(outcome: PaymentOutcome) -> Self {
        Self {
            invoice_id: outcome.invoice.id.clone(),
            status: outcome.invoice.status,
            total_paid: outcome.invoice.amount_paid,
            remaining_balance: outcome.invoice.remaining_balance(),
            payment: outcome.payment,
        }
    }
}

/// Payment service
///
/// Appends ledger entries under the invoice's unit of work, recomputes the
/// status from the new ledger sum and fires the post-commit side effects.
///
/// Only signed processor deliveries carry an external reference. It is the
/// idempotency key for that invoice's ledger and is never matched against
/// other invoices.
pub struct PaymentService {
    store: Arc<dyn InvoiceStore>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    clock: Arc<dyn Clock>,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn InvoiceStore>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            clock,
        }
    }

    /// Record a payment on behalf of the invoice owner
    pub async fn record_payment(
        &self,
        owner_id: &str,
        invoice_id: &str,
        payment: NewPayment,
    ) -> Result<PaymentOutcome> {
        self.record(InvoiceAccess::Owner { owner_id, invoice_id }, payment)
            .await
    }

    /// Record a payment submitted by the client through the public link
    pub async fn record_public_payment(
        &self,
        access_token: &str,
        payment: NewPayment,
    ) -> Result<PaymentOutcome> {
        self.record(InvoiceAccess::Token(access_token), payment).await
    }

    /// Record a payment reported by the signed payment notifier
    pub async fn record_processor_payment(
        &self,
        invoice_id: &str,
        payment: NewPayment,
    ) -> Result<PaymentOutcome> {
        if payment.external_ref.is_none() {
            return Err(AppError::validation(
                "Processor payments require an external reference",
            ));
        }

        self.record(InvoiceAccess::System { invoice_id }, payment)
            .await
    }

    /// Settle the invoice by recording exactly the remaining balance
    pub async fn mark_fully_paid(
        &self,
        owner_id: &str,
        invoice_id: &str,
        method: PaymentMethod,
        notes: Option<String>,
    ) -> Result<PaymentOutcome> {
        let payment = NewPayment {
            amount: PaymentAmount::RemainingBalance,
            method,
            notes,
            external_ref: None,
            source: PaymentSource::Staff,
        };

        self.record(InvoiceAccess::Owner { owner_id, invoice_id }, payment)
            .await
    }

    /// Ledger of an owner's invoice, oldest first
    pub async fn list_payments(&self, owner_id: &str, invoice_id: &str) -> Result<Vec<PaymentRecord>> {
        self.store
            .find_invoice(owner_id, invoice_id)
            .await?
            .ok_or_else(|| AppError::not_found("Invoice not found"))?;

        self.store.list_payments(invoice_id).await
    }

    async fn record(&self, access: InvoiceAccess<'_>, mut payment: NewPayment) -> Result<PaymentOutcome> {
        payment.external_ref = normalize_external_ref(payment.external_ref.take())?;

        if payment.external_ref.is_some() && payment.source != PaymentSource::Processor {
            return Err(AppError::validation(
                "External references are only accepted from the payment processor",
            ));
        }

        let mut uow = lock_invoice(self.store.as_ref(), access).await?;

        // Replayed notifier deliveries are answered before any other check
        if let Some(external_ref) = payment.external_ref.as_deref() {
            if let Some(existing) = uow.find_payment_by_external_ref(external_ref).await? {
                return Self::replay(uow.invoice(), existing, payment.amount);
            }
        }

        let (payment, invoice, change) = self.append(uow.as_mut(), payment).await?;
        uow.commit().await?;

        tracing::info!(
            invoice_id = %invoice.id,
            payment_id = %payment.id,
            amount = payment.amount,
            source = payment.source.as_str(),
            status = %invoice.status,
            "Payment recorded"
        );

        // Entries that leave the status where it was send nothing
        if change.changed() {
            self.notify(&invoice, &payment, change.became_paid()).await;
        }

        Ok(PaymentOutcome {
            payment,
            invoice,
            duplicate: false,
        })
    }

    fn replay(invoice: &Invoice, existing: PaymentRecord, amount: PaymentAmount) -> Result<PaymentOutcome> {
        if amount != PaymentAmount::Exact(existing.amount) {
            tracing::warn!(
                invoice_id = %invoice.id,
                payment_id = %existing.id,
                recorded_amount = existing.amount,
                "External reference replayed with a different amount"
            );
            return Err(AppError::validation(
                "External reference is already recorded with a different amount",
            ));
        }

        tracing::info!(
            invoice_id = %invoice.id,
            payment_id = %existing.id,
            external_ref = ?existing.external_ref,
            "Payment already recorded (idempotent request)"
        );

        Ok(PaymentOutcome {
            payment: existing,
            invoice: invoice.clone(),
            duplicate: true,
        })
    }

    /// Validate, insert and recompute inside the unit of work.
    /// Returns the new entry, the updated invoice and the status change the
    /// entry caused.
    async fn append(
        &self,
        uow: &mut dyn InvoiceUnitOfWork,
        payment: NewPayment,
    ) -> Result<(PaymentRecord, Invoice, StatusChange)> {
        let now = self.clock.now();
        let mut invoice = uow.invoice().clone();
        let ledger_sum = uow.sum_payments().await?;

        // Bring the cached status up to date before judging it
        recompute(&mut invoice, ledger_sum, now, None)?;

        if !invoice.status.accepts_payments() {
            return Err(AppError::invalid_state(format!(
                "Payments cannot be recorded for a {} invoice",
                invoice.status
            )));
        }

        let amount = match payment.amount {
            PaymentAmount::Exact(amount) => amount,
            PaymentAmount::RemainingBalance => invoice.total - ledger_sum,
        };

        validate_payment(&invoice, ledger_sum, amount)?;

        let record = PaymentRecord::new(
            invoice.id.clone(),
            amount,
            payment.method,
            payment.notes,
            payment.external_ref,
            payment.source,
            now,
        )?;
        uow.insert_payment(&record).await?;

        let new_sum = uow.sum_payments().await?;
        let change = recompute(&mut invoice, new_sum, now, Some(record.method.label()))?;

        if change.became_paid() {
            if let Some(milestone_id) = invoice.milestone_id.as_deref() {
                uow.mark_milestone_paid(milestone_id, now).await?;
                tracing::info!(
                    invoice_id = %invoice.id,
                    milestone_id = milestone_id,
                    "Milestone unlocked"
                );
            }
        }

        uow.update_invoice(&invoice).await?;

        Ok((record, invoice, change))
    }

    /// Receipt or partial-payment update, best-effort after commit
    async fn notify(&self, invoice: &Invoice, payment: &PaymentRecord, settled: bool) {
        let notice = PaymentReceivedNotice::new(invoice, payment);

        let result = if settled {
            self.dispatcher.send_payment_received_full(&notice).await
        } else {
            self.dispatcher.send_payment_received_partial(&notice).await
        };

        if let Err(e) = result {
            tracing::warn!(
                invoice_id = %invoice.id,
                payment_id = %payment.id,
                dispatcher = self.dispatcher.name(),
                error = %e,
                "Payment notification failed"
            );
        }
    }
}
