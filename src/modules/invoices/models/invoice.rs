// Invoice model
//
// An invoice bills one client for a fixed set of line items. Line items,
// currency, tax and totals are frozen at creation. The paid amount and status
// stored on the invoice are a cache of the payment ledger and are only ever
// written by the status machine's recomputation.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::line_item::LineItem;
use crate::core::{AppError, Currency, Result};
use crate::middleware::auth::Owner;

/// Basis points representing 100%
pub const MAX_TAX_RATE_BPS: u32 = 10_000;

/// Invoice status lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Created, editable, not visible to the client
    Draft,
    /// Issued to the client with a public access token
    Sent,
    /// Client opened the public link
    Viewed,
    /// Some, but not all, of the total has been paid
    PartiallyPaid,
    /// Ledger covers the total (terminal)
    Paid,
    /// Due date passed with nothing paid
    Overdue,
    /// Explicitly cancelled (terminal)
    Cancelled,
}

impl Default for InvoiceStatus {
    fn default() -> Self {
        InvoiceStatus::Draft
    }
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Viewed => "viewed",
            InvoiceStatus::PartiallyPaid => "partially_paid",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
    }

    /// Statuses in which payments may be recorded and reminders sent
    pub fn accepts_payments(&self) -> bool {
        matches!(
            self,
            InvoiceStatus::Sent
                | InvoiceStatus::Viewed
                | InvoiceStatus::Overdue
                | InvoiceStatus::PartiallyPaid
        )
    }

    /// Legal transitions between cached statuses.
    ///
    /// Staying in the same status is always legal. Nothing leaves a terminal
    /// status and nothing returns to `Draft`.
    pub fn can_transition_to(&self, next: InvoiceStatus) -> bool {
        use InvoiceStatus::*;

        if *self == next {
            return true;
        }

        match (self, next) {
            (Draft, Sent) | (Draft, Overdue) | (Draft, Cancelled) => true,
            (Draft, _) => false,

            (Sent, Viewed) | (Sent, PartiallyPaid) | (Sent, Paid) | (Sent, Overdue)
            | (Sent, Cancelled) => true,
            (Sent, _) => false,

            (Viewed, PartiallyPaid) | (Viewed, Paid) | (Viewed, Overdue)
            | (Viewed, Cancelled) => true,
            (Viewed, _) => false,

            // A due date moved forward takes an overdue invoice back
            (Overdue, Sent) | (Overdue, Viewed) | (Overdue, PartiallyPaid) | (Overdue, Paid)
            | (Overdue, Cancelled) => true,
            (Overdue, _) => false,

            (PartiallyPaid, Paid) => true,
            (PartiallyPaid, _) => false,

            (Paid, _) | (Cancelled, _) => false,
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "draft" => Ok(InvoiceStatus::Draft),
            "sent" => Ok(InvoiceStatus::Sent),
            "viewed" => Ok(InvoiceStatus::Viewed),
            "partially_paid" => Ok(InvoiceStatus::PartiallyPaid),
            "paid" => Ok(InvoiceStatus::Paid),
            "overdue" => Ok(InvoiceStatus::Overdue),
            "cancelled" => Ok(InvoiceStatus::Cancelled),
            _ => Err(format!("Invalid invoice status: {}", s)),
        }
    }
}

/// Invoice aggregate root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,

    /// Owning account (tenant partition key)
    pub owner_id: String,

    /// Human-readable number, unique per owner
    pub invoice_number: String,

    pub client_name: String,
    pub client_email: String,

    /// Owner contact snapshot used for payment receipts
    pub owner_name: String,
    pub owner_email: String,

    pub currency: Currency,
    pub line_items: Vec<LineItem>,
    pub tax_rate_bps: u32,
    pub subtotal: i64,
    pub tax: i64,
    pub total: i64,

    pub due_date: NaiveDate,
    pub notes: Option<String>,
    pub allow_partial_payments: bool,
    pub minimum_payment_amount: Option<i64>,
    pub auto_remind: bool,

    /// Project milestone this invoice bills, unlocked when paid
    pub milestone_id: Option<String>,

    /// Cache of the ledger sum, rewritten on every recomputation
    pub amount_paid: i64,
    pub status: InvoiceStatus,

    /// Method of the payment that closed the invoice
    pub payment_method: Option<String>,

    /// Public access token minted when the invoice is sent
    pub access_token: Option<String>,

    pub sent_at: Option<DateTime<Utc>>,
    pub viewed_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub last_reminder_at: Option<DateTime<Utc>>,
    pub reminder_count: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Create a draft invoice with computed totals
    pub fn new(owner: &Owner, request: CreateInvoiceRequest, now: DateTime<Utc>) -> Result<Self> {
        Self::validate_client(&request.client_name, &request.client_email)?;

        if request.line_items.is_empty() {
            return Err(AppError::validation(
                "Invoice must have at least one line item",
            ));
        }

        if request.tax_rate_bps > MAX_TAX_RATE_BPS {
            return Err(AppError::validation(
                "Tax rate cannot exceed 10000 basis points",
            ));
        }

        let line_items = request
            .line_items
            .into_iter()
            .map(|item| LineItem::new(item.description, item.quantity, item.unit_price))
            .collect::<Result<Vec<_>>>()?;

        let (subtotal, tax, total) = Self::compute_totals(&line_items, request.tax_rate_bps)?;

        if total <= 0 {
            return Err(AppError::validation("Invoice total must be positive"));
        }

        Self::validate_partial_config(
            request.allow_partial_payments,
            request.minimum_payment_amount,
            total,
        )?;

        let invoice_number = match request.invoice_number {
            Some(number) => {
                let number = number.trim().to_string();
                if number.is_empty() || number.len() > 50 {
                    return Err(AppError::validation(
                        "Invoice number must be between 1 and 50 characters",
                    ));
                }
                number
            }
            None => Self::generate_invoice_number(),
        };

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner.id.clone(),
            invoice_number,
            client_name: request.client_name.trim().to_string(),
            client_email: request.client_email.trim().to_string(),
            owner_name: owner.name.clone(),
            owner_email: owner.email.clone(),
            currency: request.currency,
            line_items,
            tax_rate_bps: request.tax_rate_bps,
            subtotal,
            tax,
            total,
            due_date: request.due_date,
            notes: request.notes,
            allow_partial_payments: request.allow_partial_payments,
            minimum_payment_amount: request.minimum_payment_amount,
            auto_remind: request.auto_remind,
            milestone_id: request.milestone_id,
            amount_paid: 0,
            status: InvoiceStatus::Draft,
            payment_method: None,
            access_token: None,
            sent_at: None,
            viewed_at: None,
            paid_at: None,
            cancelled_at: None,
            last_reminder_at: None,
            reminder_count: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// subtotal = Σ line amounts, tax = round half-up(subtotal × bps / 10000)
    pub fn compute_totals(line_items: &[LineItem], tax_rate_bps: u32) -> Result<(i64, i64, i64)> {
        let subtotal = line_items
            .iter()
            .try_fold(0i64, |acc, item| acc.checked_add(item.amount))
            .ok_or_else(|| AppError::validation("Invoice subtotal is too large"))?;

        let tax = (i128::from(subtotal) * i128::from(tax_rate_bps) + 5_000) / 10_000;
        let tax = i64::try_from(tax).map_err(|_| AppError::validation("Invoice tax is too large"))?;

        let total = subtotal
            .checked_add(tax)
            .ok_or_else(|| AppError::validation("Invoice total is too large"))?;

        Ok((subtotal, tax, total))
    }

    /// Checks a partial-payment configuration against the invoice total
    pub fn validate_partial_config(
        allow_partial_payments: bool,
        minimum_payment_amount: Option<i64>,
        total: i64,
    ) -> Result<()> {
        let Some(minimum) = minimum_payment_amount else {
            return Ok(());
        };

        if !allow_partial_payments {
            return Err(AppError::validation(
                "A minimum payment amount requires partial payments to be allowed",
            ));
        }

        if minimum <= 0 {
            return Err(AppError::validation(
                "Minimum payment amount must be positive",
            ));
        }

        if minimum > total {
            return Err(AppError::validation(
                "Minimum payment amount cannot exceed the invoice total",
            ));
        }

        Ok(())
    }

    pub fn remaining_balance(&self) -> i64 {
        self.total - self.amount_paid
    }

    pub fn is_sent(&self) -> bool {
        self.sent_at.is_some()
    }

    /// Whole days past the due date, `None` when not yet due
    pub fn days_overdue(&self, now: DateTime<Utc>) -> Option<i64> {
        let days = (now.date_naive() - self.due_date).num_days();
        (days > 0).then_some(days)
    }

    fn validate_client(name: &str, email: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(AppError::validation("Client name cannot be empty"));
        }

        let email = email.trim();
        if email.is_empty() || !email.contains('@') || email.len() > 254 {
            return Err(AppError::validation("Client email is invalid"));
        }

        Ok(())
    }

    fn generate_invoice_number() -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("INV-{}", suffix[..8].to_uppercase())
    }
}

fn default_auto_remind() -> bool {
    true
}

/// Request DTO for creating an invoice
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateInvoiceRequest {
    #[serde(default)]
    pub invoice_number: Option<String>,
    pub client_name: String,
    pub client_email: String,
    pub currency: Currency,
    #[serde(default)]
    pub tax_rate_bps: u32,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub allow_partial_payments: bool,
    #[serde(default)]
    pub minimum_payment_amount: Option<i64>,
    #[serde(default = "default_auto_remind")]
    pub auto_remind: bool,
    #[serde(default)]
    pub milestone_id: Option<String>,
    pub line_items: Vec<CreateLineItemRequest>,
}

/// Request DTO for a line item
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateLineItemRequest {
    pub description: String,
    pub quantity: i64,
    pub unit_price: i64,
}

/// Request DTO for editing the mutable invoice details
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateInvoiceRequest {
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Staff-facing invoice representation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceResponse {
    pub id: String,
    pub invoice_number: String,
    pub client_name: String,
    pub client_email: String,
    pub currency: Currency,
    pub line_items: Vec<LineItem>,
    pub tax_rate_bps: u32,
    pub subtotal: i64,
    pub tax: i64,
    pub total: i64,
    pub total_paid: i64,
    pub remaining_balance: i64,
    pub status: InvoiceStatus,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
    pub allow_partial_payments: bool,
    pub minimum_payment_amount: Option<i64>,
    pub auto_remind: bool,
    pub milestone_id: Option<String>,
    pub payment_method: Option<String>,
    pub access_token: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub viewed_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub last_reminder_at: Option<DateTime<Utc>>,
    pub reminder_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Invoice> for InvoiceResponse {
    fn from(invoice: Invoice) -> Self {
        let remaining_balance = invoice.remaining_balance();

        Self {
            id: invoice.id,
            invoice_number: invoice.invoice_number,
            client_name: invoice.client_name,
            client_email: invoice.client_email,
            currency: invoice.currency,
            line_items: invoice.line_items,
            tax_rate_bps: invoice.tax_rate_bps,
            subtotal: invoice.subtotal,
            tax: invoice.tax,
            total: invoice.total,
            total_paid: invoice.amount_paid,
            remaining_balance,
            status: invoice.status,
            due_date: invoice.due_date,
            notes: invoice.notes,
            allow_partial_payments: invoice.allow_partial_payments,
            minimum_payment_amount: invoice.minimum_payment_amount,
            auto_remind: invoice.auto_remind,
            milestone_id: invoice.milestone_id,
            payment_method: invoice.payment_method,
            access_token: invoice.access_token,
            sent_at: invoice.sent_at,
            viewed_at: invoice.viewed_at,
            paid_at: invoice.paid_at,
            cancelled_at: invoice.cancelled_at,
            last_reminder_at: invoice.last_reminder_at,
            reminder_count: invoice.reminder_count,
            created_at: invoice.created_at,
            updated_at: invoice.updated_at,
        }
    }
}

/// Client-facing view reachable through the public token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicInvoiceView {
    pub invoice_number: String,
    pub from_name: String,
    pub client_name: String,
    pub currency: Currency,
    pub line_items: Vec<LineItem>,
    pub subtotal: i64,
    pub tax: i64,
    pub total: i64,
    pub total_paid: i64,
    pub remaining_balance: i64,
    pub status: InvoiceStatus,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
    pub allow_partial_payments: bool,
    pub minimum_payment_amount: Option<i64>,
}

impl From<Invoice> for PublicInvoiceView {
    fn from(invoice: Invoice) -> Self {
        let remaining_balance = invoice.remaining_balance();

        Self {
            invoice_number: invoice.invoice_number,
            from_name: invoice.owner_name,
            client_name: invoice.client_name,
            currency: invoice.currency,
            line_items: invoice.line_items,
            subtotal: invoice.subtotal,
            tax: invoice.tax,
            total: invoice.total,
            total_paid: invoice.amount_paid,
            remaining_balance,
            status: invoice.status,
            due_date: invoice.due_date,
            notes: invoice.notes,
            allow_partial_payments: invoice.allow_partial_payments,
            minimum_payment_amount: invoice.minimum_payment_amount,
        }
    }
}
