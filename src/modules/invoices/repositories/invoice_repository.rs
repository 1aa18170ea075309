// MySQL invoice store
//
// Implements the persistence contract on MySQL:
// - invoices and their line items (line items written once at creation)
// - owner lookup by API key hash
// - per-invoice units of work: `SELECT ... FOR UPDATE` inside a transaction,
//   so concurrent payments and reminders on one invoice are serialized by
//   the row lock and commit or roll back as a whole

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{MySql, MySqlPool, Transaction};

use crate::core::traits::{InvoiceStore, InvoiceUnitOfWork};
use crate::core::{AppError, Currency, Result};
use crate::middleware::auth::Owner;
use crate::modules::invoices::models::{Invoice, InvoiceStatus, LineItem};
use crate::modules::payments::models::PaymentRecord;
use crate::modules::payments::repositories::PaymentRepository;
use crate::modules::reminders::models::ReminderRecord;
use crate::modules::reminders::repositories::ReminderRepository;

const INVOICE_COLUMNS: &str = r#"
    id, owner_id, invoice_number, client_name, client_email, owner_name, owner_email,
    currency, tax_rate_bps, subtotal, tax, total, due_date, notes,
    allow_partial_payments, minimum_payment_amount, auto_remind, milestone_id,
    amount_paid, status, payment_method, access_token,
    sent_at, viewed_at, paid_at, cancelled_at, last_reminder_at, reminder_count,
    created_at, updated_at
"#;

/// Invoice store backed by MySQL
#[derive(Clone)]
pub struct MySqlInvoiceRepository {
    pool: MySqlPool,
}

impl MySqlInvoiceRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    async fn load_line_items<'e, E>(executor: E, invoice_id: &str) -> Result<Vec<LineItem>>
    where
        E: sqlx::Executor<'e, Database = MySql>,
    {
        let rows = sqlx::query_as::<_, LineItemRow>(
            r#"
            SELECT description, quantity, unit_price, amount
            FROM invoice_line_items
            WHERE invoice_id = ?
            ORDER BY position
            "#,
        )
        .bind(invoice_id)
        .fetch_all(executor)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch line items: {}", e)))?;

        Ok(rows.into_iter().map(LineItemRow::into_line_item).collect())
    }

    async fn hydrate(&self, row: InvoiceRow) -> Result<Invoice> {
        let line_items = Self::load_line_items(&self.pool, &row.id).await?;
        row.into_invoice(line_items)
    }
}

#[async_trait]
impl InvoiceStore for MySqlInvoiceRepository {
    async fn insert_invoice(&self, invoice: &Invoice) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to start transaction: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, owner_id, invoice_number, client_name, client_email, owner_name, owner_email,
                currency, tax_rate_bps, subtotal, tax, total, due_date, notes,
                allow_partial_payments, minimum_payment_amount, auto_remind, milestone_id,
                amount_paid, status, payment_method, access_token,
                sent_at, viewed_at, paid_at, cancelled_at, last_reminder_at, reminder_count,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.owner_id)
        .bind(&invoice.invoice_number)
        .bind(&invoice.client_name)
        .bind(&invoice.client_email)
        .bind(&invoice.owner_name)
        .bind(&invoice.owner_email)
        .bind(invoice.currency.code())
        .bind(invoice.tax_rate_bps)
        .bind(invoice.subtotal)
        .bind(invoice.tax)
        .bind(invoice.total)
        .bind(invoice.due_date)
        .bind(&invoice.notes)
        .bind(invoice.allow_partial_payments)
        .bind(invoice.minimum_payment_amount)
        .bind(invoice.auto_remind)
        .bind(&invoice.milestone_id)
        .bind(invoice.amount_paid)
        .bind(invoice.status.as_str())
        .bind(&invoice.payment_method)
        .bind(&invoice.access_token)
        .bind(invoice.sent_at)
        .bind(invoice.viewed_at)
        .bind(invoice.paid_at)
        .bind(invoice.cancelled_at)
        .bind(invoice.last_reminder_at)
        .bind(invoice.reminder_count)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.is_unique_violation() {
                    return AppError::validation(format!(
                        "Invoice number '{}' already exists",
                        invoice.invoice_number
                    ));
                }
            }
            AppError::Internal(format!("Failed to create invoice: {}", e))
        })?;

        for (position, item) in invoice.line_items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO invoice_line_items (
                    invoice_id, position, description, quantity, unit_price, amount
                ) VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&invoice.id)
            .bind(position as i32)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.amount)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create line item: {}", e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to commit transaction: {}", e)))?;

        Ok(())
    }

    async fn find_invoice(&self, owner_id: &str, invoice_id: &str) -> Result<Option<Invoice>> {
        let sql = format!(
            "SELECT {} FROM invoices WHERE id = ? AND owner_id = ?",
            INVOICE_COLUMNS
        );
        let row = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(invoice_id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to fetch invoice: {}", e)))?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_invoice_by_token(&self, token: &str) -> Result<Option<Invoice>> {
        let sql = format!("SELECT {} FROM invoices WHERE access_token = ?", INVOICE_COLUMNS);
        let row = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to fetch invoice by token: {}", e)))?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn list_invoices(&self, owner_id: &str, limit: i64, offset: i64) -> Result<Vec<Invoice>> {
        let sql = format!(
            "SELECT {} FROM invoices WHERE owner_id = ? ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            INVOICE_COLUMNS
        );
        let rows = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(owner_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to list invoices: {}", e)))?;

        let mut invoices = Vec::with_capacity(rows.len());
        for row in rows {
            invoices.push(self.hydrate(row).await?);
        }
        Ok(invoices)
    }

    async fn list_reminder_candidates(&self) -> Result<Vec<Invoice>> {
        let sql = format!(
            r#"SELECT {} FROM invoices
               WHERE auto_remind = TRUE
                 AND status IN ('sent', 'viewed', 'overdue', 'partially_paid')
               ORDER BY sent_at ASC"#,
            INVOICE_COLUMNS
        );
        let rows = sqlx::query_as::<_, InvoiceRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to list reminder candidates: {}", e)))?;

        // The sweep re-reads each invoice under its lock
        rows.into_iter().map(|row| row.into_invoice(Vec::new())).collect()
    }

    async fn list_payments(&self, invoice_id: &str) -> Result<Vec<PaymentRecord>> {
        PaymentRepository::list_for_invoice(&self.pool, invoice_id).await
    }

    async fn list_reminders(&self, invoice_id: &str) -> Result<Vec<ReminderRecord>> {
        ReminderRepository::list_for_invoice(&self.pool, invoice_id).await
    }

    async fn find_owner_by_key_hash(&self, key_hash: &str) -> Result<Option<Owner>> {
        let owner = sqlx::query_as::<_, OwnerRow>(
            r#"
            SELECT o.id, o.name, o.email
            FROM api_keys k
            JOIN owners o ON o.id = k.owner_id
            WHERE k.key_hash = ? AND k.is_active = TRUE
            "#,
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to look up API key: {}", e)))?;

        Ok(owner.map(|row| Owner {
            id: row.id,
            name: row.name,
            email: row.email,
        }))
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("Database not reachable: {}", e)))?;
        Ok(())
    }

    async fn begin(&self, invoice_id: &str) -> Result<Option<Box<dyn InvoiceUnitOfWork>>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to start transaction: {}", e)))?;

        let sql = format!("SELECT {} FROM invoices WHERE id = ? FOR UPDATE", INVOICE_COLUMNS);
        let row = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(invoice_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to lock invoice: {}", e)))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let line_items = Self::load_line_items(&mut *tx, &row.id).await?;
        let invoice = row.into_invoice(line_items)?;

        Ok(Some(Box::new(MySqlUnitOfWork { tx, invoice })))
    }
}

/// Transaction holding the invoice row lock
pub struct MySqlUnitOfWork {
    tx: Transaction<'static, MySql>,
    invoice: Invoice,
}

#[async_trait]
impl InvoiceUnitOfWork for MySqlUnitOfWork {
    fn invoice(&self) -> &Invoice {
        &self.invoice
    }

    async fn sum_payments(&mut self) -> Result<i64> {
        PaymentRepository::sum_for_invoice(&mut *self.tx, &self.invoice.id).await
    }

    async fn find_payment_by_external_ref(
        &mut self,
        external_ref: &str,
    ) -> Result<Option<PaymentRecord>> {
        PaymentRepository::find_by_external_ref(&mut *self.tx, &self.invoice.id, external_ref).await
    }

    async fn insert_payment(&mut self, payment: &PaymentRecord) -> Result<()> {
        PaymentRepository::insert(&mut *self.tx, payment).await
    }

    async fn insert_reminder(&mut self, reminder: &ReminderRecord) -> Result<()> {
        ReminderRepository::insert(&mut *self.tx, reminder).await
    }

    async fn update_invoice(&mut self, invoice: &Invoice) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE invoices
            SET due_date = ?, notes = ?, allow_partial_payments = ?, minimum_payment_amount = ?,
                auto_remind = ?, amount_paid = ?, status = ?, payment_method = ?, access_token = ?,
                sent_at = ?, viewed_at = ?, paid_at = ?, cancelled_at = ?,
                last_reminder_at = ?, reminder_count = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(invoice.due_date)
        .bind(&invoice.notes)
        .bind(invoice.allow_partial_payments)
        .bind(invoice.minimum_payment_amount)
        .bind(invoice.auto_remind)
        .bind(invoice.amount_paid)
        .bind(invoice.status.as_str())
        .bind(&invoice.payment_method)
        .bind(&invoice.access_token)
        .bind(invoice.sent_at)
        .bind(invoice.viewed_at)
        .bind(invoice.paid_at)
        .bind(invoice.cancelled_at)
        .bind(invoice.last_reminder_at)
        .bind(invoice.reminder_count)
        .bind(invoice.updated_at)
        .bind(&self.invoice.id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to update invoice: {}", e)))?;

        self.invoice = invoice.clone();
        Ok(())
    }

    async fn mark_milestone_paid(&mut self, milestone_id: &str, paid_at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE milestones
            SET status = 'paid', paid_at = ?
            WHERE id = ? AND owner_id = ?
            "#,
        )
        .bind(paid_at)
        .bind(milestone_id)
        .bind(&self.invoice.owner_id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to update milestone: {}", e)))?;

        if result.rows_affected() == 0 {
            tracing::warn!(
                invoice_id = %self.invoice.id,
                milestone_id = milestone_id,
                "Milestone not found for paid invoice"
            );
        }

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to commit transaction: {}", e)))
    }
}

// Helper structs for database mapping

#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: String,
    owner_id: String,
    invoice_number: String,
    client_name: String,
    client_email: String,
    owner_name: String,
    owner_email: String,
    currency: String,
    tax_rate_bps: u32,
    subtotal: i64,
    tax: i64,
    total: i64,
    due_date: NaiveDate,
    notes: Option<String>,
    allow_partial_payments: bool,
    minimum_payment_amount: Option<i64>,
    auto_remind: bool,
    milestone_id: Option<String>,
    amount_paid: i64,
    status: String,
    payment_method: Option<String>,
    access_token: Option<String>,
    sent_at: Option<DateTime<Utc>>,
    viewed_at: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    last_reminder_at: Option<DateTime<Utc>>,
    reminder_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl InvoiceRow {
    fn into_invoice(self, line_items: Vec<LineItem>) -> Result<Invoice> {
        let currency = Currency::from_str(&self.currency)
            .map_err(|e| AppError::Internal(format!("Invalid currency in database: {}", e)))?;
        let status = InvoiceStatus::from_str(&self.status)
            .map_err(|e| AppError::Internal(format!("Invalid status in database: {}", e)))?;

        Ok(Invoice {
            id: self.id,
            owner_id: self.owner_id,
            invoice_number: self.invoice_number,
            client_name: self.client_name,
            client_email: self.client_email,
            owner_name: self.owner_name,
            owner_email: self.owner_email,
            currency,
            line_items,
            tax_rate_bps: self.tax_rate_bps,
            subtotal: self.subtotal,
            tax: self.tax,
            total: self.total,
            due_date: self.due_date,
            notes: self.notes,
            allow_partial_payments: self.allow_partial_payments,
            minimum_payment_amount: self.minimum_payment_amount,
            auto_remind: self.auto_remind,
            milestone_id: self.milestone_id,
            amount_paid: self.amount_paid,
            status,
            payment_method: self.payment_method,
            access_token: self.access_token,
            sent_at: self.sent_at,
            viewed_at: self.viewed_at,
            paid_at: self.paid_at,
            cancelled_at: self.cancelled_at,
            last_reminder_at: self.last_reminder_at,
            reminder_count: self.reminder_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LineItemRow {
    description: String,
    quantity: i64,
    unit_price: i64,
    amount: i64,
}

impl LineItemRow {
    fn into_line_item(self) -> LineItem {
        LineItem {
            description: self.description,
            quantity: self.quantity,
            unit_price: self.unit_price,
            amount: self.amount,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OwnerRow {
    id: String,
    name: String,
    email: String,
}
