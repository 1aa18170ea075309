// Status machine
//
// Status is never set directly: it is derived from the invoice configuration,
// the ledger sum and the current instant, and the cached copy on the invoice
// is rewritten only through `recompute`, which enforces the transition table
// in `InvoiceStatus::can_transition_to`.

use chrono::{DateTime, Utc};

use crate::core::{AppError, Result};
use crate::modules::invoices::models::{Invoice, InvoiceStatus};

/// Derive the status of an invoice. Pure: same inputs, same answer.
///
/// Rules, first match wins:
/// 1. explicitly cancelled → `Cancelled`
/// 2. ledger covers the total → `Paid`
/// 3. something paid → `PartiallyPaid`
/// 4. sent and past the due date → `Overdue`
/// 5. opened by the client → `Viewed`
/// 6. sent → `Sent`
/// 7. otherwise `Draft`
pub fn derive_status(invoice: &Invoice, ledger_sum: i64, now: DateTime<Utc>) -> InvoiceStatus {
    if invoice.cancelled_at.is_some() {
        return InvoiceStatus::Cancelled;
    }

    if ledger_sum >= invoice.total {
        return InvoiceStatus::Paid;
    }

    if ledger_sum > 0 {
        return InvoiceStatus::PartiallyPaid;
    }

    if invoice.is_sent() && invoice.due_date < now.date_naive() {
        return InvoiceStatus::Overdue;
    }

    if invoice.viewed_at.is_some() {
        return InvoiceStatus::Viewed;
    }

    if invoice.is_sent() {
        return InvoiceStatus::Sent;
    }

    InvoiceStatus::Draft
}

/// Outcome of a recomputation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub previous: InvoiceStatus,
    pub current: InvoiceStatus,
}

impl StatusChange {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }

    /// True only on the transition into `Paid`, never on a re-derivation
    pub fn became_paid(&self) -> bool {
        self.current == InvoiceStatus::Paid && self.previous != InvoiceStatus::Paid
    }
}

/// Rewrite the invoice's derived cache from the ledger sum.
///
/// `closing_method` is the method of the payment being recorded, stored as
/// the invoice-level payment method on the first transition into `Paid`.
pub fn recompute(
    invoice: &mut Invoice,
    ledger_sum: i64,
    now: DateTime<Utc>,
    closing_method: Option<&str>,
) -> Result<StatusChange> {
    if ledger_sum < 0 || ledger_sum > invoice.total {
        return Err(AppError::internal(format!(
            "Ledger sum {} is outside 0..={} for invoice {}",
            ledger_sum, invoice.total, invoice.id
        )));
    }

    let previous = invoice.status;
    let current = derive_status(invoice, ledger_sum, now);

    if !previous.can_transition_to(current) {
        return Err(AppError::invalid_state(format!(
            "Invoice {} cannot move from {} to {}",
            invoice.invoice_number, previous, current
        )));
    }

    let change = StatusChange { previous, current };

    if change.became_paid() {
        invoice.paid_at.get_or_insert(now);
        if let Some(method) = closing_method {
            invoice.payment_method = Some(method.to_string());
        }
    }

    if change.changed() || invoice.amount_paid != ledger_sum {
        invoice.updated_at = now;
    }

    invoice.amount_paid = ledger_sum;
    invoice.status = current;

    Ok(change)
}
