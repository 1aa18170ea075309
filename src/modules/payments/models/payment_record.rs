use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{AppError, Result};
use crate::modules::invoices::models::InvoiceStatus;

/// How a payment was made.
///
/// Known methods are enumerated; anything else is kept as a free-text label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PaymentMethod {
    BankTransfer,
    Card,
    Cash,
    Check,
    Paypal,
    Other(String),
}

impl PaymentMethod {
    pub fn label(&self) -> &str {
        match self {
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Card => "card",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Check => "check",
            PaymentMethod::Paypal => "paypal",
            PaymentMethod::Other(label) => label,
        }
    }
}

impl From<String> for PaymentMethod {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "bank_transfer" => PaymentMethod::BankTransfer,
            "card" => PaymentMethod::Card,
            "cash" => PaymentMethod::Cash,
            "check" => PaymentMethod::Check,
            "paypal" => PaymentMethod::Paypal,
            _ => PaymentMethod::Other(value.trim().to_string()),
        }
    }
}

impl From<PaymentMethod> for String {
    fn from(method: PaymentMethod) -> Self {
        method.label().to_string()
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Who submitted the payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentSource {
    /// Recorded by the invoice owner
    Staff,
    /// Submitted by the client through the public link
    Client,
    /// Reported by the external payment processor
    Processor,
}

impl PaymentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentSource::Staff => "staff",
            PaymentSource::Client => "client",
            PaymentSource::Processor => "processor",
        }
    }
}

impl std::str::FromStr for PaymentSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "staff" => Ok(PaymentSource::Staff),
            "client" => Ok(PaymentSource::Client),
            "processor" => Ok(PaymentSource::Processor),
            _ => Err(format!("Invalid payment source: {}", s)),
        }
    }
}

/// Ledger entry. Written once, never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: String,
    pub invoice_id: String,

    /// Amount in minor units, always positive
    pub amount: i64,

    pub method: PaymentMethod,
    pub notes: Option<String>,

    /// Processor reference, the idempotency key for notifier deliveries
    pub external_ref: Option<String>,

    pub source: PaymentSource,
    pub created_at: DateTime<Utc>,
}

impl PaymentRecord {
    /// Build a new ledger entry. The amount itself is checked by the
    /// partial-payment policy before this is called.
    pub fn new(
        invoice_id: String,
        amount: i64,
        method: PaymentMethod,
        notes: Option<String>,
        external_ref: Option<String>,
        source: PaymentSource,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if amount <= 0 {
            return Err(AppError::validation("Payment amount must be positive"));
        }

        if method.label().is_empty() || method.label().len() > 100 {
            return Err(AppError::validation(
                "Payment method must be between 1 and 100 characters",
            ));
        }

        if notes.as_ref().is_some_and(|n| n.chars().count() > 1000) {
            return Err(AppError::validation(
                "Payment notes cannot exceed 1000 characters",
            ));
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            invoice_id,
            amount,
            method,
            notes,
            external_ref,
            source,
            created_at: now,
        })
    }
}

/// Normalise an optional external reference: blank means none
pub fn normalize_external_ref(external_ref: Option<String>) -> Result<Option<String>> {
    match external_ref.map(|r| r.trim().to_string()) {
        None => Ok(None),
        Some(r) if r.is_empty() => Ok(None),
        Some(r) if r.len() > 255 => Err(AppError::validation(
            "External reference cannot exceed 255 characters",
        )),
        Some(r) => Ok(Some(r)),
    }
}

/// Request DTO for recording a payment
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecordPaymentRequest {
    pub amount: i64,
    pub method: PaymentMethod,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Request DTO for settling the remaining balance in one go
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarkPaidRequest {
    pub method: PaymentMethod,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Response DTO after a payment call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub payment: PaymentRecord,
    pub invoice_id: String,
    pub status: InvoiceStatus,
    pub total_paid: i64,
    pub remaining_balance: i64,
}
