use std::sync::Arc;

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::core::error::AppError;
use crate::middleware::auth::Owner;
use crate::modules::invoices::models::{CreateInvoiceRequest, InvoiceResponse, UpdateInvoiceRequest};
use crate::modules::invoices::services::InvoiceService;

/// Query parameters for listing invoices
#[derive(Debug, Deserialize)]
pub struct ListInvoicesQuery {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AutoRemindRequest {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct PartialPaymentsRequest {
    pub allow: bool,
    #[serde(default)]
    pub minimum_payment_amount: Option<i64>,
}

/// Create a draft invoice
/// POST /invoices
pub async fn create_invoice(
    service: web::Data<Arc<InvoiceService>>,
    owner: Owner,
    request: web::Json<CreateInvoiceRequest>,
) -> Result<HttpResponse, AppError> {
    let invoice = service.create_invoice(&owner, request.into_inner()).await?;

    Ok(HttpResponse::Created().json(InvoiceResponse::from(invoice)))
}

/// Invoice with its payments and reminders
/// GET /invoices/{id}
pub async fn get_invoice(
    service: web::Data<Arc<InvoiceService>>,
    owner: Owner,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let detail = service.get_invoice(&owner.id, &path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(detail))
}

/// List the owner's invoices
/// GET /invoices
pub async fn list_invoices(
    service: web::Data<Arc<InvoiceService>>,
    owner: Owner,
    query: web::Query<ListInvoicesQuery>,
) -> Result<HttpResponse, AppError> {
    let invoices: Vec<InvoiceResponse> = service
        .list_invoices(&owner.id, query.limit, query.offset)
        .await?
        .into_iter()
        .map(InvoiceResponse::from)
        .collect();

    Ok(HttpResponse::Ok().json(invoices))
}

/// Edit due date or notes
/// PATCH /invoices/{id}
pub async fn update_invoice(
    service: web::Data<Arc<InvoiceService>>,
    owner: Owner,
    path: web::Path<String>,
    request: web::Json<UpdateInvoiceRequest>,
) -> Result<HttpResponse, AppError> {
    let invoice = service
        .update_invoice(&owner.id, &path.into_inner(), request.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(InvoiceResponse::from(invoice)))
}

/// Issue the invoice to the client
/// POST /invoices/{id}/send
pub async fn send_invoice(
    service: web::Data<Arc<InvoiceService>>,
    owner: Owner,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let invoice = service.send_invoice(&owner.id, &path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(InvoiceResponse::from(invoice)))
}

/// POST /invoices/{id}/cancel
pub async fn cancel_invoice(
    service: web::Data<Arc<InvoiceService>>,
    owner: Owner,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let invoice = service.cancel_invoice(&owner.id, &path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(InvoiceResponse::from(invoice)))
}

/// PUT /invoices/{id}/auto-remind
pub async fn toggle_auto_remind(
    service: web::Data<Arc<InvoiceService>>,
    owner: Owner,
    path: web::Path<String>,
    request: web::Json<AutoRemindRequest>,
) -> Result<HttpResponse, AppError> {
    let invoice = service
        .toggle_auto_remind(&owner.id, &path.into_inner(), request.enabled)
        .await?;

    Ok(HttpResponse::Ok().json(InvoiceResponse::from(invoice)))
}

/// PUT /invoices/{id}/partial-payments
pub async fn toggle_partial_payments(
    service: web::Data<Arc<InvoiceService>>,
    owner: Owner,
    path: web::Path<String>,
    request: web::Json<PartialPaymentsRequest>,
) -> Result<HttpResponse, AppError> {
    let request = request.into_inner();
    let invoice = service
        .toggle_partial_payments(
            &owner.id,
            &path.into_inner(),
            request.allow,
            request.minimum_payment_amount,
        )
        .await?;

    Ok(HttpResponse::Ok().json(InvoiceResponse::from(invoice)))
}

/// Configure invoice routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/invoices", web::post().to(create_invoice))
        .route("/invoices", web::get().to(list_invoices))
        .route("/invoices/{id}", web::get().to(get_invoice))
        .route("/invoices/{id}", web::patch().to(update_invoice))
        .route("/invoices/{id}/send", web::post().to(send_invoice))
        .route("/invoices/{id}/cancel", web::post().to(cancel_invoice))
        .route("/invoices/{id}/auto-remind", web::put().to(toggle_auto_remind))
        .route(
            "/invoices/{id}/partial-payments",
            web::put().to(toggle_partial_payments),
        );
}
