use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Serialize;

use super::dispatcher::NotificationDispatcher;
use crate::config::NotificationConfig;
use crate::core::{AppError, Result};
use crate::modules::notifications::models::{
    InvoiceIssuedNotice, PaymentReceivedNotice, ReminderNotice,
};

/// Delivers notices to an HTTP notification service
///
/// Every notice is POSTed as JSON to `{base_url}/{kind}`. Transient failures
/// (connect errors, 5xx, 429) are retried with exponential backoff.
pub struct HttpNotificationDispatcher {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: Option<String>,
}

impl HttpNotificationDispatcher {
    pub fn new(base_url: String, api_key: Option<String>, max_retries: u32, timeout_secs: u64) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);
        let client = ClientBuilder::new(inner)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn from_config(config: &NotificationConfig) -> Result<Option<Self>> {
        match &config.service_url {
            Some(url) => Self::new(
                url.clone(),
                config.api_key.clone(),
                config.max_retries,
                config.timeout_secs,
            )
            .map(Some),
            None => Ok(None),
        }
    }

    async fn post<T: Serialize + Sync>(&self, kind: &str, notice: &T) -> Result<()> {
        let url = format!("{}/{}", self.base_url, kind);
        let body = serde_json::to_vec(notice)?;

        let mut request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(body);

        if let Some(key) = &self.api_key {
            request = request.header(AUTHORIZATION, format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::upstream(format!("Notification service unreachable: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            return Err(AppError::upstream(format!(
                "Notification service error {}: {}",
                status, error_body
            )));
        }

        tracing::debug!(kind = kind, "Notification delivered");
        Ok(())
    }
}

#[async_trait]
impl NotificationDispatcher for HttpNotificationDispatcher {
    async fn send_invoice_issued(&self, notice: &InvoiceIssuedNotice) -> Result<()> {
        self.post("invoice-issued", notice).await
    }

    async fn send_payment_received_full(&self, notice: &PaymentReceivedNotice) -> Result<()> {
        self.post("payment-received", notice).await
    }

    async fn send_payment_received_partial(&self, notice: &PaymentReceivedNotice) -> Result<()> {
        self.post("partial-payment-received", notice).await
    }

    async fn send_reminder(&self, notice: &ReminderNotice) -> Result<()> {
        self.post("payment-reminder", notice).await
    }

    fn name(&self) -> &str {
        "http"
    }
}
