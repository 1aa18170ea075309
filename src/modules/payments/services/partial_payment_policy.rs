// Partial-payment policy
//
// Decides whether a proposed amount may be appended to an invoice's ledger.
// The minimum payment amount governs installment size only: a payment that
// exactly settles the remaining balance is accepted even when it is smaller
// than the configured minimum.

use crate::core::{AppError, Result};
use crate::modules::invoices::models::{Invoice, InvoiceStatus};

/// Why a payment amount was refused. Amounts are minor units.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentRejection {
    #[error("payment amount must be greater than zero")]
    NonPositiveAmount,

    #[error("payment of {amount} exceeds the remaining balance of {remaining}")]
    ExceedsBalance { amount: i64, remaining: i64 },

    #[error(
        "partial payments are not allowed for this invoice; the full remaining balance of {remaining} is required"
    )]
    PartialNotAllowed { amount: i64, remaining: i64 },

    #[error("payment of {amount} is below the minimum payment amount of {minimum}")]
    BelowMinimum { amount: i64, minimum: i64 },
}

/// Validate a proposed payment against the invoice configuration and the
/// current ledger sum.
pub fn validate_payment(
    invoice: &Invoice,
    ledger_sum: i64,
    proposed_amount: i64,
) -> std::result::Result<(), PaymentRejection> {
    if proposed_amount <= 0 {
        return Err(PaymentRejection::NonPositiveAmount);
    }

    let remaining = invoice.total - ledger_sum;

    if proposed_amount > remaining {
        return Err(PaymentRejection::ExceedsBalance {
            amount: proposed_amount,
            remaining,
        });
    }

    let settles_balance = proposed_amount == remaining;

    if !invoice.allow_partial_payments && !settles_balance {
        return Err(PaymentRejection::PartialNotAllowed {
            amount: proposed_amount,
            remaining,
        });
    }

    if let Some(minimum) = invoice.minimum_payment_amount {
        if invoice.allow_partial_payments && proposed_amount < minimum && !settles_balance {
            return Err(PaymentRejection::BelowMinimum {
                amount: proposed_amount,
                minimum,
            });
        }
    }

    Ok(())
}

/// The partial-payment configuration is frozen once money has moved
pub fn ensure_partial_config_mutable(status: InvoiceStatus, ledger_sum: i64) -> Result<()> {
    let open = matches!(
        status,
        InvoiceStatus::Draft | InvoiceStatus::Sent | InvoiceStatus::Viewed
    );

    if !open || ledger_sum > 0 {
        return Err(AppError::invalid_state(format!(
            "Partial-payment settings cannot be changed once an invoice is {}",
            status
        )));
    }

    Ok(())
}
