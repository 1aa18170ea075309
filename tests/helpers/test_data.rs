// Test data builders

use chrono::NaiveDate;
use invoice_ledger::core::Currency;
use invoice_ledger::invoices::models::{CreateInvoiceRequest, CreateLineItemRequest};
use serde_json::{json, Value};

/// Builder for invoice creation requests. Defaults to a single USD line
/// of 10000 minor units, no tax, due 2025-03-31.
#[derive(Debug, Clone)]
pub struct InvoiceBuilder {
    request: CreateInvoiceRequest,
}

impl InvoiceBuilder {
    pub fn new() -> Self {
        Self {
            request: CreateInvoiceRequest {
                invoice_number: None,
                client_name: "Acme Corp".to_string(),
                client_email: "billing@acme.test".to_string(),
                currency: Currency::USD,
                tax_rate_bps: 0,
                due_date: NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
                notes: None,
                allow_partial_payments: false,
                minimum_payment_amount: None,
                auto_remind: true,
                milestone_id: None,
                line_items: vec![CreateLineItemRequest {
                    description: "Design work".to_string(),
                    quantity: 1,
                    unit_price: 10_000,
                }],
            },
        }
    }

    /// Single line whose amount is `total`
    pub fn total(mut self, total: i64) -> Self {
        self.request.line_items = vec![CreateLineItemRequest {
            description: "Design work".to_string(),
            quantity: 1,
            unit_price: total,
        }];
        self
    }

    pub fn partial(mut self, minimum: Option<i64>) -> Self {
        self.request.allow_partial_payments = true;
        self.request.minimum_payment_amount = minimum;
        self
    }

    pub fn due(mut self, due_date: NaiveDate) -> Self {
        self.request.due_date = due_date;
        self
    }

    pub fn auto_remind(mut self, enabled: bool) -> Self {
        self.request.auto_remind = enabled;
        self
    }

    pub fn milestone(mut self, milestone_id: &str) -> Self {
        self.request.milestone_id = Some(milestone_id.to_string());
        self
    }

    pub fn number(mut self, invoice_number: &str) -> Self {
        self.request.invoice_number = Some(invoice_number.to_string());
        self
    }

    pub fn build(self) -> CreateInvoiceRequest {
        self.request
    }
}

impl Default for InvoiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// JSON body for POST /api/invoices
pub fn create_invoice_payload(total: i64) -> Value {
    json!({
        "client_name": "Acme Corp",
        "client_email": "billing@acme.test",
        "currency": "USD",
        "due_date": "2025-03-31",
        "line_items": [
            { "description": "Design work", "quantity": 1, "unit_price": total }
        ]
    })
}
