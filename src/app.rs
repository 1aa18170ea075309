//! Service graph and HTTP route table shared by the server binary and the
//! contract tests.

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{http::header, web};

use crate::config::SecurityConfig;
use crate::core::traits::InvoiceStore;
use crate::core::{AppError, Clock};
use crate::middleware::ApiKeyAuth;
use crate::modules::health;
use crate::modules::invoices::controllers::{invoice_controller, public_controller};
use crate::modules::invoices::InvoiceService;
use crate::modules::notifications::models::PublicLinks;
use crate::modules::notifications::services::NotificationDispatcher;
use crate::modules::payments::controllers::{payment_controller, webhook_controller};
use crate::modules::payments::PaymentService;
use crate::modules::reminders::controllers::reminder_controller;
use crate::modules::reminders::{ReminderPolicy, ReminderService};

/// Engine services wired onto one store and one dispatcher
#[derive(Clone)]
pub struct AppServices {
    pub store: Arc<dyn InvoiceStore>,
    pub invoices: Arc<InvoiceService>,
    pub payments: Arc<PaymentService>,
    pub reminders: Arc<ReminderService>,
    pub security: SecurityConfig,
}

impl AppServices {
    pub fn new(
        store: Arc<dyn InvoiceStore>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        clock: Arc<dyn Clock>,
        policy: ReminderPolicy,
        links: PublicLinks,
        security: SecurityConfig,
    ) -> Self {
        let invoices = Arc::new(InvoiceService::new(
            store.clone(),
            dispatcher.clone(),
            clock.clone(),
            links.clone(),
        ));
        let payments = Arc::new(PaymentService::new(
            store.clone(),
            dispatcher.clone(),
            clock.clone(),
        ));
        let reminders = Arc::new(ReminderService::new(
            store.clone(),
            dispatcher,
            clock,
            policy,
            links,
        ));

        Self {
            store,
            invoices,
            payments,
            reminders,
            security,
        }
    }
}

fn public_cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["GET", "POST"])
        .allowed_header(header::CONTENT_TYPE)
        .max_age(3600)
}

/// Register every route and the shared app data.
///
/// * `/health`, `/ready` - probes
/// * `/public/...` - token access, CORS enabled, no API key
/// * `/webhooks/payments` - HMAC-signed processor notifications
/// * `/internal/reminders/sweep` - sweep trigger guarded by a shared secret
/// * `/api/...` - owner routes behind `X-API-Key`
pub fn configure(services: AppServices) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg: &mut web::ServiceConfig| {
        let json_config = web::JsonConfig::default()
            .limit(64 * 1024)
            .error_handler(|err, _req| AppError::validation(err.to_string()).into());
        let query_config = web::QueryConfig::default()
            .error_handler(|err, _req| AppError::validation(err.to_string()).into());

        cfg.app_data(json_config)
            .app_data(query_config)
            .app_data(web::Data::new(services.store.clone()))
            .app_data(web::Data::new(services.invoices.clone()))
            .app_data(web::Data::new(services.payments.clone()))
            .app_data(web::Data::new(services.reminders.clone()))
            .app_data(web::Data::new(services.security.clone()))
            .configure(health::controllers::configure)
            .service(
                web::scope("/public")
                    .wrap(public_cors())
                    .configure(public_controller::configure),
            )
            .service(web::scope("/webhooks").configure(webhook_controller::configure))
            .service(web::scope("/internal").configure(reminder_controller::configure_internal))
            .service(
                web::scope("/api")
                    .wrap(ApiKeyAuth::new(services.store.clone()))
                    .configure(invoice_controller::configure)
                    .configure(payment_controller::configure)
                    .configure(reminder_controller::configure),
            );
    }
}
