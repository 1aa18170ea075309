use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};
use sha2::{Digest, Sha256};

use crate::config::SecurityConfig;
use crate::core::error::AppError;
use crate::middleware::auth::Owner;
use crate::modules::reminders::models::SendReminderRequest;
use crate::modules::reminders::services::ReminderService;

pub const SWEEP_SECRET_HEADER: &str = "X-Sweep-Secret";

/// Send a manual reminder
/// POST /invoices/{id}/reminders
///
/// Denied with 429 and `retry_after_hours` while the cooldown is active.
pub async fn send_reminder(
    service: web::Data<Arc<ReminderService>>,
    owner: Owner,
    path: web::Path<String>,
    request: Option<web::Json<SendReminderRequest>>,
) -> Result<HttpResponse, AppError> {
    let custom_message = request.and_then(|r| r.into_inner().custom_message);
    let reminder = service
        .request_reminder(&owner.id, &path.into_inner(), custom_message)
        .await?;

    Ok(HttpResponse::Created().json(reminder))
}

/// GET /invoices/{id}/reminders
pub async fn list_reminders(
    service: web::Data<Arc<ReminderService>>,
    owner: Owner,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let reminders = service.list_reminders(&owner.id, &path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(reminders))
}

/// Run the batch sweep; called by an external scheduler
/// POST /internal/reminders/sweep
pub async fn run_sweep(
    service: web::Data<Arc<ReminderService>>,
    security: web::Data<SecurityConfig>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let presented = req
        .headers()
        .get(SWEEP_SECRET_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::unauthorized("Missing X-Sweep-Secret header"))?;

    // Compare digests so the check does not leak the secret's prefix
    if Sha256::digest(presented.as_bytes()) != Sha256::digest(security.sweep_secret.as_bytes()) {
        return Err(AppError::unauthorized("Invalid sweep secret"));
    }

    let report = service.run_reminder_sweep().await?;

    Ok(HttpResponse::Ok().json(report))
}

/// Configure owner reminder routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/invoices/{id}/reminders", web::post().to(send_reminder))
        .route("/invoices/{id}/reminders", web::get().to(list_reminders));
}

/// Configure the sweep trigger, mounted under `/internal`
pub fn configure_internal(cfg: &mut web::ServiceConfig) {
    cfg.route("/reminders/sweep", web::post().to(run_sweep));
}
