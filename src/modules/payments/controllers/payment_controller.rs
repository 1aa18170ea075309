use std::sync::Arc;

use actix_web::{web, HttpResponse};

use crate::core::error::AppError;
use crate::middleware::auth::Owner;
use crate::modules::payments::models::{
    MarkPaidRequest, PaymentResponse, PaymentSource, RecordPaymentRequest,
};
use crate::modules::payments::services::{NewPayment, PaymentAmount, PaymentService};

/// Record a payment received by the owner
/// POST /invoices/{id}/payments
pub async fn record_payment(
    service: web::Data<Arc<PaymentService>>,
    owner: Owner,
    path: web::Path<String>,
    request: web::Json<RecordPaymentRequest>,
) -> Result<HttpResponse, AppError> {
    let request = request.into_inner();
    let payment = NewPayment {
        amount: PaymentAmount::Exact(request.amount),
        method: request.method,
        notes: request.notes,
        external_ref: None,
        source: PaymentSource::Staff,
    };

    let outcome = service
        .record_payment(&owner.id, &path.into_inner(), payment)
        .await?;

    Ok(HttpResponse::Created().json(PaymentResponse::from(outcome)))
}

/// Settle the remaining balance
/// POST /invoices/{id}/mark-paid
pub async fn mark_paid(
    service: web::Data<Arc<PaymentService>>,
    owner: Owner,
    path: web::Path<String>,
    request: web::Json<MarkPaidRequest>,
) -> Result<HttpResponse, AppError> {
    let request = request.into_inner();
    let outcome = service
        .mark_fully_paid(&owner.id, &path.into_inner(), request.method, request.notes)
        .await?;

    Ok(HttpResponse::Created().json(PaymentResponse::from(outcome)))
}

/// GET /invoices/{id}/payments
pub async fn list_payments(
    service: web::Data<Arc<PaymentService>>,
    owner: Owner,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let payments = service.list_payments(&owner.id, &path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(payments))
}

/// Configure payment routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/invoices/{id}/payments", web::post().to(record_payment))
        .route("/invoices/{id}/payments", web::get().to(list_payments))
        .route("/invoices/{id}/mark-paid", web::post().to(mark_paid));
}
