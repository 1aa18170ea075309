use chrono::{DateTime, Utc};
use sqlx::MySql;

use crate::core::{AppError, Result};
use crate::modules::reminders::models::{ReminderRecord, ReminderType};

/// Reminder history persistence (append-only)
pub struct ReminderRepository;

impl ReminderRepository {
    pub async fn insert<'e, E>(executor: E, reminder: &ReminderRecord) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = MySql>,
    {
        sqlx::query(
            r#"
            INSERT INTO reminders (
                id, invoice_id, reminder_type, custom_message,
                recipient_name, recipient_email, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&reminder.id)
        .bind(&reminder.invoice_id)
        .bind(reminder.reminder_type.as_str())
        .bind(&reminder.custom_message)
        .bind(&reminder.recipient_name)
        .bind(&reminder.recipient_email)
        .bind(reminder.created_at)
        .execute(executor)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to record reminder: {}", e)))?;

        Ok(())
    }

    /// Reminder history of an invoice, oldest first
    pub async fn list_for_invoice<'e, E>(executor: E, invoice_id: &str) -> Result<Vec<ReminderRecord>>
    where
        E: sqlx::Executor<'e, Database = MySql>,
    {
        let rows = sqlx::query_as::<_, ReminderRow>(
            r#"
            SELECT id, invoice_id, reminder_type, custom_message,
                   recipient_name, recipient_email, created_at
            FROM reminders
            WHERE invoice_id = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(invoice_id)
        .fetch_all(executor)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch reminders: {}", e)))?;

        rows.into_iter().map(ReminderRow::into_reminder).collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReminderRow {
    id: String,
    invoice_id: String,
    reminder_type: String,
    custom_message: Option<String>,
    recipient_name: String,
    recipient_email: String,
    created_at: DateTime<Utc>,
}

impl ReminderRow {
    fn into_reminder(self) -> Result<ReminderRecord> {
        let reminder_type = self
            .reminder_type
            .parse::<ReminderType>()
            .map_err(|e| AppError::Internal(format!("Invalid reminder type in database: {}", e)))?;

        Ok(ReminderRecord {
            id: self.id,
            invoice_id: self.invoice_id,
            reminder_type,
            custom_message: self.custom_message,
            recipient_name: self.recipient_name,
            recipient_email: self.recipient_email,
            created_at: self.created_at,
        })
    }
}
