use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{AppError, Result};
use crate::modules::invoices::models::InvoiceStatus;

/// Default limit on an owner's custom reminder message, in characters
pub const MAX_CUSTOM_MESSAGE_CHARS: usize = 500;

/// Kind of reminder sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReminderType {
    /// Requested by the owner
    #[serde(rename = "manual")]
    Manual,
    /// First automatic nudge after sending
    #[serde(rename = "escalation_tier_1")]
    FirstAuto,
    /// Second automatic nudge
    #[serde(rename = "escalation_tier_2")]
    SecondAuto,
    /// Past the due date
    #[serde(rename = "overdue")]
    Overdue,
}

impl ReminderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderType::Manual => "manual",
            ReminderType::FirstAuto => "escalation_tier_1",
            ReminderType::SecondAuto => "escalation_tier_2",
            ReminderType::Overdue => "overdue",
        }
    }
}

impl std::fmt::Display for ReminderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReminderType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "manual" => Ok(ReminderType::Manual),
            "escalation_tier_1" => Ok(ReminderType::FirstAuto),
            "escalation_tier_2" => Ok(ReminderType::SecondAuto),
            "overdue" => Ok(ReminderType::Overdue),
            _ => Err(format!("Invalid reminder type: {}", s)),
        }
    }
}

/// What asked for the reminder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderTrigger {
    Manual,
    Sweep,
}

/// Append-only record of a sent reminder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderRecord {
    pub id: String,
    pub invoice_id: String,
    pub reminder_type: ReminderType,
    pub custom_message: Option<String>,
    /// Client contact at send time
    pub recipient_name: String,
    pub recipient_email: String,
    pub created_at: DateTime<Utc>,
}

impl ReminderRecord {
    pub fn new(
        invoice_id: String,
        reminder_type: ReminderType,
        custom_message: Option<String>,
        recipient_name: String,
        recipient_email: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            invoice_id,
            reminder_type,
            custom_message,
            recipient_name,
            recipient_email,
            created_at: now,
        }
    }
}

/// Trim a custom message; blank becomes `None`
pub fn normalize_custom_message(message: Option<String>, limit: usize) -> Result<Option<String>> {
    let Some(message) = message.map(|m| m.trim().to_string()) else {
        return Ok(None);
    };

    if message.is_empty() {
        return Ok(None);
    }

    if message.chars().count() > limit {
        return Err(AppError::validation(format!(
            "Custom message cannot exceed {} characters",
            limit
        )));
    }

    Ok(Some(message))
}

/// Scheduler verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderDecision {
    Send(ReminderType),
    Deny(ReminderDenial),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderDenial {
    /// Invoice status does not take reminders
    NotRemindable(InvoiceStatus),
    /// Last reminder was too recent
    Cooldown { hours_remaining: i64 },
    /// Owner switched automatic reminders off
    AutoRemindDisabled,
    /// No escalation step is due yet
    NothingDue,
}

impl From<ReminderDenial> for AppError {
    fn from(denial: ReminderDenial) -> Self {
        match denial {
            ReminderDenial::NotRemindable(status) => AppError::invalid_state(format!(
                "Reminders cannot be sent for a {} invoice",
                status
            )),
            ReminderDenial::Cooldown { hours_remaining } => {
                AppError::RateLimited { hours_remaining }
            }
            ReminderDenial::AutoRemindDisabled => {
                AppError::invalid_state("Automatic reminders are disabled for this invoice")
            }
            ReminderDenial::NothingDue => AppError::invalid_state("No reminder is due"),
        }
    }
}

/// Request DTO for a manual reminder
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SendReminderRequest {
    #[serde(default)]
    pub custom_message: Option<String>,
}

/// One invoice reminded by a sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweptInvoice {
    pub invoice_id: String,
    pub invoice_number: String,
    pub reminder_type: ReminderType,
}

/// Summary of a reminder sweep
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepReport {
    pub examined: usize,
    pub sent: Vec<SweptInvoice>,
    pub skipped: usize,
    pub failed: usize,
}
