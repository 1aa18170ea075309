use async_trait::async_trait;

use crate::core::Result;
use crate::modules::notifications::models::{
    InvoiceIssuedNotice, PaymentReceivedNotice, ReminderNotice,
};

/// Outbound notification channel
///
/// Implementations deliver each notice or return `AppError::Upstream`.
/// Retrying is the implementation's concern; callers decide whether a
/// failure aborts the surrounding operation.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Invoice issued to the client
    async fn send_invoice_issued(&self, notice: &InvoiceIssuedNotice) -> Result<()>;

    /// Receipt for the payment that settled the invoice
    async fn send_payment_received_full(&self, notice: &PaymentReceivedNotice) -> Result<()>;

    /// Update for an installment that left a balance outstanding
    async fn send_payment_received_partial(&self, notice: &PaymentReceivedNotice) -> Result<()>;

    /// Payment reminder
    async fn send_reminder(&self, notice: &ReminderNotice) -> Result<()>;

    /// Channel name for logs
    fn name(&self) -> &str;
}
