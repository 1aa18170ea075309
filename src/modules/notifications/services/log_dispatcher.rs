use async_trait::async_trait;

use super::dispatcher::NotificationDispatcher;
use crate::core::Result;
use crate::modules::notifications::models::{
    InvoiceIssuedNotice, PaymentReceivedNotice, ReminderNotice,
};

/// Writes notices to the log instead of delivering them.
/// Used when no notification service is configured.
#[derive(Debug, Default, Clone)]
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn send_invoice_issued(&self, notice: &InvoiceIssuedNotice) -> Result<()> {
        tracing::info!(
            invoice_id = %notice.invoice_id,
            invoice_number = %notice.invoice_number,
            to = %notice.recipient.email,
            total = %notice.total,
            "Invoice issued"
        );
        Ok(())
    }

    async fn send_payment_received_full(&self, notice: &PaymentReceivedNotice) -> Result<()> {
        tracing::info!(
            invoice_id = %notice.invoice_id,
            payment_id = %notice.payment_id,
            amount = %notice.amount,
            recipients = notice.recipients.len(),
            "Payment received, invoice settled"
        );
        Ok(())
    }

    async fn send_payment_received_partial(&self, notice: &PaymentReceivedNotice) -> Result<()> {
        tracing::info!(
            invoice_id = %notice.invoice_id,
            payment_id = %notice.payment_id,
            amount = %notice.amount,
            remaining = %notice.remaining_balance,
            "Partial payment received"
        );
        Ok(())
    }

    async fn send_reminder(&self, notice: &ReminderNotice) -> Result<()> {
        tracing::info!(
            invoice_id = %notice.invoice_id,
            reminder_type = %notice.reminder_type,
            to = %notice.recipient.email,
            remaining = %notice.remaining_balance,
            days_overdue = ?notice.days_overdue,
            "Payment reminder"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
