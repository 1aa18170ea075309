use std::sync::Arc;

use actix_web::{App, HttpServer};
use anyhow::Context;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use invoice_ledger::app::{self, AppServices};
use invoice_ledger::config::{database, Config, StorageBackend};
use invoice_ledger::core::traits::InvoiceStore;
use invoice_ledger::core::SystemClock;
use invoice_ledger::middleware::{RateLimiter, RequestId};
use invoice_ledger::modules::invoices::{InMemoryInvoiceRepository, MySqlInvoiceRepository};
use invoice_ledger::modules::notifications::models::PublicLinks;
use invoice_ledger::modules::notifications::services::{
    HttpNotificationDispatcher, LogDispatcher, NotificationDispatcher,
};
use invoice_ledger::modules::reminders::ReminderPolicy;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    init_tracing(&config);

    tracing::info!("Starting Invoice Ledger");
    tracing::info!("Environment: {}", config.app.env);
    tracing::info!("Server binding to: {}", config.server.bind_address());

    let store: Arc<dyn InvoiceStore> = match (config.app.storage, &config.database) {
        (StorageBackend::Mysql, Some(db)) => {
            let pool = db
                .create_pool()
                .await
                .context("Failed to create database pool")?;

            if config.app.run_migrations {
                database::run_migrations(&pool).await?;
                tracing::info!("Database migrations applied");
            }

            tracing::info!(
                "Database pool initialized ({}..{} connections)",
                db.min_connections,
                db.max_connections
            );
            Arc::new(MySqlInvoiceRepository::new(pool))
        }
        (StorageBackend::Mysql, None) => {
            anyhow::bail!("MySQL storage selected without database configuration")
        }
        (StorageBackend::Memory, _) => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Arc::new(InMemoryInvoiceRepository::new())
        }
    };

    let dispatcher: Arc<dyn NotificationDispatcher> =
        match HttpNotificationDispatcher::from_config(&config.notifications)? {
            Some(http) => Arc::new(http),
            None => {
                tracing::warn!("NOTIFICATION_SERVICE_URL not set; notices are only logged");
                Arc::new(LogDispatcher)
            }
        };
    tracing::info!(dispatcher = dispatcher.name(), "Notification dispatcher ready");

    let services = AppServices::new(
        store,
        dispatcher,
        Arc::new(SystemClock),
        ReminderPolicy::from(&config.reminders),
        PublicLinks::new(config.app.public_base_url.clone()),
        config.security.clone(),
    );

    let rate_limiter = RateLimiter::new(config.security.rate_limit_per_minute);

    // Start HTTP server
    let bind_address = config.server.bind_address();
    let server = HttpServer::new(move || {
        App::new()
            .wrap(rate_limiter.clone())
            .wrap(RequestId)
            .wrap(TracingLogger::default())
            .configure(app::configure(services.clone()))
    })
    .workers(config.server.workers)
    .bind(&bind_address)?
    .run();

    tracing::info!("Server started at http://{}", bind_address);

    server.await?;
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("invoice_ledger={},actix_web=info", config.app.log_level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);

    if config.app.env == "production" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
