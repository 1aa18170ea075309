use std::sync::Arc;

use actix_web::{web, HttpResponse};

use crate::core::error::AppError;
use crate::modules::invoices::services::InvoiceService;
use crate::modules::payments::models::{PaymentResponse, PaymentSource, RecordPaymentRequest};
use crate::modules::payments::services::{NewPayment, PaymentAmount, PaymentService};

/// Client-facing invoice view
/// GET /public/invoices/{token}
pub async fn view_invoice(
    service: web::Data<Arc<InvoiceService>>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let view = service.resolve_public_token(&path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(view))
}

/// Payment submitted by the client through the public link
/// POST /public/invoices/{token}/payments
pub async fn submit_payment(
    service: web::Data<Arc<PaymentService>>,
    path: web::Path<String>,
    request: web::Json<RecordPaymentRequest>,
) -> Result<HttpResponse, AppError> {
    let request = request.into_inner();
    let payment = NewPayment {
        amount: PaymentAmount::Exact(request.amount),
        method: request.method,
        notes: request.notes,
        external_ref: None,
        source: PaymentSource::Client,
    };

    let outcome = service
        .record_public_payment(&path.into_inner(), payment)
        .await?;

    Ok(HttpResponse::Created().json(PaymentResponse::from(outcome)))
}

/// Configure public token routes, mounted under `/public`
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/invoices/{token}", web::get().to(view_invoice))
        .route("/invoices/{token}/payments", web::post().to(submit_payment));
}
