use chrono::{DateTime, Utc};
use sqlx::MySql;

use crate::core::{AppError, Result};
use crate::modules::payments::models::{PaymentMethod, PaymentRecord, PaymentSource};

/// Ledger persistence
///
/// Every function takes an executor so the same statements run against the
/// pool for reads and inside an invoice's transaction for writes. There is
/// no update or delete: the ledger is append-only.
pub struct PaymentRepository;

impl PaymentRepository {
    /// Append a ledger entry
    ///
    /// # Errors
    /// * `Validation` - the external reference is already recorded
    pub async fn insert<'e, E>(executor: E, payment: &PaymentRecord) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = MySql>,
    {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, invoice_id, amount, method, notes, external_ref, source, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.invoice_id)
        .bind(payment.amount)
        .bind(payment.method.label())
        .bind(&payment.notes)
        .bind(&payment.external_ref)
        .bind(payment.source.as_str())
        .bind(payment.created_at)
        .execute(executor)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.is_unique_violation() {
                    return AppError::validation("External reference is already recorded");
                }
            }
            AppError::Internal(format!("Failed to record payment: {}", e))
        })?;

        Ok(())
    }

    /// Sum of the ledger for one invoice, in minor units
    pub async fn sum_for_invoice<'e, E>(executor: E, invoice_id: &str) -> Result<i64>
    where
        E: sqlx::Executor<'e, Database = MySql>,
    {
        let sum: i64 = sqlx::query_scalar(
            r#"
            SELECT CAST(COALESCE(SUM(amount), 0) AS SIGNED)
            FROM payments
            WHERE invoice_id = ?
            "#,
        )
        .bind(invoice_id)
        .fetch_one(executor)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to sum payments: {}", e)))?;

        Ok(sum)
    }

    /// Find an invoice's ledger entry by processor reference
    pub async fn find_by_external_ref<'e, E>(
        executor: E,
        invoice_id: &str,
        external_ref: &str,
    ) -> Result<Option<PaymentRecord>>
    where
        E: sqlx::Executor<'e, Database = MySql>,
    {
        let row = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT id, invoice_id, amount, method, notes, external_ref, source, created_at
            FROM payments
            WHERE invoice_id = ? AND external_ref = ?
            "#,
        )
        .bind(invoice_id)
        .bind(external_ref)
        .fetch_optional(executor)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch payment by external ref: {}", e)))?;

        row.map(PaymentRow::into_payment).transpose()
    }

    /// Ledger of an invoice, oldest first
    pub async fn list_for_invoice<'e, E>(executor: E, invoice_id: &str) -> Result<Vec<PaymentRecord>>
    where
        E: sqlx::Executor<'e, Database = MySql>,
    {
        let rows = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT id, invoice_id, amount, method, notes, external_ref, source, created_at
            FROM payments
            WHERE invoice_id = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(invoice_id)
        .fetch_all(executor)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch payments for invoice: {}", e)))?;

        rows.into_iter().map(PaymentRow::into_payment).collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: String,
    invoice_id: String,
    amount: i64,
    method: String,
    notes: Option<String>,
    external_ref: Option<String>,
    source: String,
    created_at: DateTime<Utc>,
}

impl PaymentRow {
    fn into_payment(self) -> Result<PaymentRecord> {
        let source = self
            .source
            .parse::<PaymentSource>()
            .map_err(|e| AppError::Internal(format!("Invalid payment source in database: {}", e)))?;

        Ok(PaymentRecord {
            id: self.id,
            invoice_id: self.invoice_id,
            amount: self.amount,
            method: PaymentMethod::from(self.method),
            notes: self.notes,
            external_ref: self.external_ref,
            source,
            created_at: self.created_at,
        })
    }
}
