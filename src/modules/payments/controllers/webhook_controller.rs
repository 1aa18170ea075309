use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::config::SecurityConfig;
use crate::core::error::AppError;
use crate::modules::invoices::models::InvoiceStatus;
use crate::modules::payments::models::{PaymentMethod, PaymentSource};
use crate::modules::payments::services::{verify_signature, NewPayment, PaymentAmount, PaymentService};

pub const SIGNATURE_HEADER: &str = "X-Signature";

/// Payment reported by the processor notifier
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessorPaymentPayload {
    pub invoice_id: String,
    pub amount: i64,
    pub method: PaymentMethod,
    pub external_ref: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Acknowledgement returned to the notifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WebhookAck {
    Recorded {
        payment_id: String,
        invoice_status: InvoiceStatus,
    },
    Duplicate {
        payment_id: String,
    },
}

/// Signed processor notification
/// POST /webhooks/payments
///
/// The signature is the hex HMAC-SHA256 of the raw body.
pub async fn receive_payment(
    service: web::Data<Arc<PaymentService>>,
    security: web::Data<SecurityConfig>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::unauthorized("Missing X-Signature header"))?;

    if let Err(e) = verify_signature(&security.webhook_secret, &body, signature) {
        tracing::warn!("Rejected payment webhook with bad signature");
        return Err(e);
    }

    let payload: ProcessorPaymentPayload = serde_json::from_slice(&body)?;

    let outcome = service
        .record_processor_payment(
            &payload.invoice_id,
            NewPayment {
                amount: PaymentAmount::Exact(payload.amount),
                method: payload.method,
                notes: payload.notes,
                external_ref: Some(payload.external_ref),
                source: PaymentSource::Processor,
            },
        )
        .await?;

    let ack = if outcome.duplicate {
        WebhookAck::Duplicate {
            payment_id: outcome.payment.id,
        }
    } else {
        WebhookAck::Recorded {
            payment_id: outcome.payment.id,
            invoice_status: outcome.invoice.status,
        }
    };

    Ok(HttpResponse::Ok().json(ack))
}

/// Configure webhook routes, mounted under `/webhooks`
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/payments", web::post().to(receive_payment));
}
