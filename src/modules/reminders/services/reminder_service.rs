use std::sync::Arc;

use super::reminder_scheduler::ReminderPolicy;
use crate::core::traits::{lock_invoice, InvoiceAccess, InvoiceStore, InvoiceUnitOfWork};
use crate::core::{AppError, Clock, Result};
use crate::modules::invoices::services::status_machine::recompute;
use crate::modules::notifications::models::{PublicLinks, ReminderNotice};
use crate::modules::notifications::services::NotificationDispatcher;
use crate::modules::reminders::models::{
    normalize_custom_message, ReminderDecision, ReminderDenial, ReminderRecord, ReminderTrigger,
    SweepReport, SweptInvoice,
};

/// Reminder service
///
/// Manual reminders and the batch sweep share one path: lock the invoice,
/// refresh its status, ask the scheduler, dispatch and record atomically.
pub struct ReminderService {
    store: Arc<dyn InvoiceStore>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    policy: ReminderPolicy,
    links: PublicLinks,
}

impl ReminderService {
    pub fn new(
        store: Arc<dyn InvoiceStore>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        clock: Arc<dyn Clock>,
        policy: ReminderPolicy,
        links: PublicLinks,
    ) -> Self {
        Self {
            store,
            dispatcher,
            clock,
            policy,
            links,
        }
    }

    /// Send a manual reminder for an owner's invoice
    ///
    /// # Errors
    /// * `RateLimited` - cooldown still active, with the hours remaining
    /// * `InvalidState` - invoice status does not take reminders
    /// * `Upstream` - dispatch failed; nothing was recorded
    pub async fn request_reminder(
        &self,
        owner_id: &str,
        invoice_id: &str,
        custom_message: Option<String>,
    ) -> Result<ReminderRecord> {
        let custom_message =
            normalize_custom_message(custom_message, self.policy.max_message_chars)?;

        let uow = lock_invoice(
            self.store.as_ref(),
            InvoiceAccess::Owner { owner_id, invoice_id },
        )
        .await?;

        match self
            .remind_locked(uow, ReminderTrigger::Manual, custom_message)
            .await?
        {
            Ok(record) => Ok(record),
            Err(denial) => {
                tracing::info!(invoice_id = invoice_id, denial = ?denial, "Reminder denied");
                Err(denial.into())
            }
        }
    }

    /// Reminder history of an owner's invoice
    pub async fn list_reminders(&self, owner_id: &str, invoice_id: &str) -> Result<Vec<ReminderRecord>> {
        self.store
            .find_invoice(owner_id, invoice_id)
            .await?
            .ok_or_else(|| AppError::not_found("Invoice not found"))?;

        self.store.list_reminders(invoice_id).await
    }

    /// Batch sweep over every auto-remind candidate.
    ///
    /// Each invoice is handled in its own unit of work; one failure is
    /// counted and logged without aborting the rest.
    pub async fn run_reminder_sweep(&self) -> Result<SweepReport> {
        let candidates = self.store.list_reminder_candidates().await?;
        let mut report = SweepReport::default();

        for candidate in candidates {
            report.examined += 1;

            let outcome = match self.store.begin(&candidate.id).await {
                Ok(Some(uow)) => self.remind_locked(uow, ReminderTrigger::Sweep, None).await,
                Ok(None) => {
                    report.skipped += 1;
                    continue;
                }
                Err(e) => Err(e),
            };

            match outcome {
                Ok(Ok(record)) => report.sent.push(SweptInvoice {
                    invoice_id: candidate.id,
                    invoice_number: candidate.invoice_number,
                    reminder_type: record.reminder_type,
                }),
                Ok(Err(_)) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        invoice_id = %candidate.id,
                        error = %e,
                        "Reminder sweep failed for invoice"
                    );
                }
            }
        }

        tracing::info!(
            examined = report.examined,
            sent = report.sent.len(),
            skipped = report.skipped,
            failed = report.failed,
            "Reminder sweep finished"
        );

        Ok(report)
    }

    /// Decide and, when allowed, send and record one reminder.
    ///
    /// A denial still commits the refreshed status cache.
    async fn remind_locked(
        &self,
        mut uow: Box<dyn InvoiceUnitOfWork>,
        trigger: ReminderTrigger,
        custom_message: Option<String>,
    ) -> Result<std::result::Result<ReminderRecord, ReminderDenial>> {
        let now = self.clock.now();
        let mut invoice = uow.invoice().clone();
        let ledger_sum = uow.sum_payments().await?;
        let refreshed = recompute(&mut invoice, ledger_sum, now, None)?;

        let reminder_type = match self.policy.evaluate(&invoice, now, trigger) {
            ReminderDecision::Send(reminder_type) => reminder_type,
            ReminderDecision::Deny(denial) => {
                if refreshed.changed() {
                    uow.update_invoice(&invoice).await?;
                    uow.commit().await?;
                }
                return Ok(Err(denial));
            }
        };

        let record = ReminderRecord::new(
            invoice.id.clone(),
            reminder_type,
            custom_message.clone(),
            invoice.client_name.clone(),
            invoice.client_email.clone(),
            now,
        );
        uow.insert_reminder(&record).await?;

        let notice = ReminderNotice::new(&invoice, reminder_type, custom_message, &self.links, now);
        if let Err(e) = self.dispatcher.send_reminder(&notice).await {
            tracing::error!(
                invoice_id = %invoice.id,
                reminder_type = %reminder_type,
                dispatcher = self.dispatcher.name(),
                error = %e,
                "Reminder dispatch failed"
            );
            return Err(match e {
                AppError::Upstream(_) => e,
                other => AppError::upstream(other.to_string()),
            });
        }

        invoice.last_reminder_at = Some(now);
        invoice.reminder_count += 1;
        invoice.updated_at = now;
        uow.update_invoice(&invoice).await?;
        uow.commit().await?;

        tracing::info!(
            invoice_id = %invoice.id,
            reminder_type = %reminder_type,
            reminder_count = invoice.reminder_count,
            "Reminder sent"
        );

        Ok(Ok(record))
    }
}
