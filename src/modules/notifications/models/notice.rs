// Notification payloads
//
// These are the documents handed to the notification dispatcher. Amounts are
// pre-formatted in the invoice currency so delivery channels never do money
// arithmetic.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::modules::invoices::models::Invoice;
use crate::modules::payments::models::PaymentRecord;
use crate::modules::reminders::models::ReminderType;

/// Builds the client-facing links embedded in notices
#[derive(Debug, Clone)]
pub struct PublicLinks {
    base_url: String,
}

impl PublicLinks {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn invoice_url(&self, access_token: &str) -> String {
        format!("{}/public/invoices/{}", self.base_url, access_token)
    }

    fn for_invoice(&self, invoice: &Invoice) -> Option<String> {
        invoice.access_token.as_deref().map(|t| self.invoice_url(t))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub name: String,
    pub email: String,
}

impl Recipient {
    pub fn client(invoice: &Invoice) -> Self {
        Self {
            name: invoice.client_name.clone(),
            email: invoice.client_email.clone(),
        }
    }

    pub fn owner(invoice: &Invoice) -> Self {
        Self {
            name: invoice.owner_name.clone(),
            email: invoice.owner_email.clone(),
        }
    }
}

/// Sent to the client when an invoice is issued
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceIssuedNotice {
    pub invoice_id: String,
    pub recipient: Recipient,
    pub invoice_number: String,
    pub from_name: String,
    pub total: String,
    pub currency: String,
    pub due_date: NaiveDate,
    pub public_url: Option<String>,
}

impl InvoiceIssuedNotice {
    pub fn new(invoice: &Invoice, links: &PublicLinks) -> Self {
        Self {
            invoice_id: invoice.id.clone(),
            recipient: Recipient::client(invoice),
            invoice_number: invoice.invoice_number.clone(),
            from_name: invoice.owner_name.clone(),
            total: invoice.currency.format_minor(invoice.total),
            currency: invoice.currency.code().to_string(),
            due_date: invoice.due_date,
            public_url: links.for_invoice(invoice),
        }
    }
}

/// Sent to both client and owner after a ledger entry is appended
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReceivedNotice {
    pub invoice_id: String,
    pub payment_id: String,
    pub recipients: Vec<Recipient>,
    pub invoice_number: String,
    pub amount: String,
    pub total_paid: String,
    pub remaining_balance: String,
    pub currency: String,
    pub payment_method: String,
    pub received_at: DateTime<Utc>,
}

impl PaymentReceivedNotice {
    /// `invoice` must already carry the recomputed paid amount
    pub fn new(invoice: &Invoice, payment: &PaymentRecord) -> Self {
        let currency = invoice.currency;

        Self {
            invoice_id: invoice.id.clone(),
            payment_id: payment.id.clone(),
            recipients: vec![Recipient::client(invoice), Recipient::owner(invoice)],
            invoice_number: invoice.invoice_number.clone(),
            amount: currency.format_minor(payment.amount),
            total_paid: currency.format_minor(invoice.amount_paid),
            remaining_balance: currency.format_minor(invoice.remaining_balance()),
            currency: currency.code().to_string(),
            payment_method: payment.method.label().to_string(),
            received_at: payment.created_at,
        }
    }
}

/// Payment reminder sent to the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderNotice {
    pub invoice_id: String,
    pub recipient: Recipient,
    pub invoice_number: String,
    pub from_name: String,
    pub reminder_type: ReminderType,
    pub remaining_balance: String,
    pub currency: String,
    pub due_date: NaiveDate,
    pub days_overdue: Option<i64>,
    pub is_partially_paid: bool,
    pub custom_message: Option<String>,
    pub public_url: Option<String>,
}

impl ReminderNotice {
    pub fn new(
        invoice: &Invoice,
        reminder_type: ReminderType,
        custom_message: Option<String>,
        links: &PublicLinks,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            invoice_id: invoice.id.clone(),
            recipient: Recipient::client(invoice),
            invoice_number: invoice.invoice_number.clone(),
            from_name: invoice.owner_name.clone(),
            reminder_type,
            remaining_balance: invoice.currency.format_minor(invoice.remaining_balance()),
            currency: invoice.currency.code().to_string(),
            due_date: invoice.due_date,
            days_overdue: invoice.days_overdue(now),
            is_partially_paid: invoice.amount_paid > 0,
            custom_message,
            public_url: links.for_invoice(invoice),
        }
    }
}
