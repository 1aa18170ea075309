use crate::core::{AppError, Result};
use serde::Deserialize;
use std::env;
use std::str::FromStr;

pub mod database;
pub mod server;

pub use database::DatabaseConfig;
pub use server::ServerConfig;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    /// Present when `storage` is MySQL
    pub database: Option<DatabaseConfig>,
    pub server: ServerConfig,
    pub reminders: ReminderConfig,
    pub notifications: NotificationConfig,
    pub security: SecurityConfig,
}

/// Where invoices, payments and reminders live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Mysql,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mysql" => Ok(StorageBackend::Mysql),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(format!("Invalid storage backend: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub log_level: String,
    /// Base URL of client-facing invoice links
    pub public_base_url: String,
    pub storage: StorageBackend,
    /// Apply `migrations/` on startup
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReminderConfig {
    pub cooldown_hours: i64,
    pub first_auto_after_days: i64,
    pub second_auto_after_days: i64,
    pub overdue_cap: i32,
    pub max_message_chars: usize,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            cooldown_hours: 24,
            first_auto_after_days: 3,
            second_auto_after_days: 7,
            overdue_cap: 5,
            max_message_chars: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Notification service base URL; notices are only logged when unset
    pub service_url: Option<String>,
    pub api_key: Option<String>,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// HMAC secret shared with the payment notifier
    pub webhook_secret: String,
    /// Shared secret required to trigger the reminder sweep
    pub sweep_secret: String,
    pub rate_limit_per_minute: u32,
}

fn env_or<T: FromStr>(key: &str, default: &str) -> Result<T> {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| AppError::Configuration(format!("Invalid {}", key)))
}

fn required(key: &str) -> Result<String> {
    env::var(key).map_err(|_| AppError::Configuration(format!("{} not set", key)))
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let storage: StorageBackend = env_or("APP_STORAGE", "mysql")?;

        let config = Config {
            app: AppConfig {
                env: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
                public_base_url: env::var("PUBLIC_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:8080".to_string()),
                storage,
                run_migrations: env_or("RUN_MIGRATIONS", "false")?,
            },
            database: match storage {
                StorageBackend::Mysql => Some(DatabaseConfig::from_env()?),
                StorageBackend::Memory => None,
            },
            server: ServerConfig::from_env()?,
            reminders: ReminderConfig {
                cooldown_hours: env_or("REMINDER_COOLDOWN_HOURS", "24")?,
                first_auto_after_days: env_or("REMINDER_FIRST_AFTER_DAYS", "3")?,
                second_auto_after_days: env_or("REMINDER_SECOND_AFTER_DAYS", "7")?,
                overdue_cap: env_or("REMINDER_OVERDUE_CAP", "5")?,
                max_message_chars: env_or("REMINDER_MAX_MESSAGE_CHARS", "500")?,
            },
            notifications: NotificationConfig {
                service_url: optional("NOTIFICATION_SERVICE_URL"),
                api_key: optional("NOTIFICATION_API_KEY"),
                max_retries: env_or("NOTIFICATION_MAX_RETRIES", "3")?,
                timeout_secs: env_or("NOTIFICATION_TIMEOUT_SECS", "10")?,
            },
            security: SecurityConfig {
                webhook_secret: required("PAYMENT_WEBHOOK_SECRET")?,
                sweep_secret: required("REMINDER_SWEEP_SECRET")?,
                rate_limit_per_minute: env_or("RATE_LIMIT_PER_MINUTE", "1000")?,
            },
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.security.rate_limit_per_minute == 0 {
            return Err(AppError::Configuration(
                "Rate limit must be greater than 0".to_string(),
            ));
        }

        if self.security.webhook_secret.len() < 16 || self.security.sweep_secret.len() < 16 {
            return Err(AppError::Configuration(
                "Webhook and sweep secrets must be at least 16 characters".to_string(),
            ));
        }

        let r = &self.reminders;
        if r.cooldown_hours <= 0 || r.first_auto_after_days < 0 || r.overdue_cap < 0 {
            return Err(AppError::Configuration(
                "Reminder cooldown must be positive and thresholds non-negative".to_string(),
            ));
        }

        if r.second_auto_after_days < r.first_auto_after_days {
            return Err(AppError::Configuration(
                "Second auto-reminder cannot come before the first".to_string(),
            ));
        }

        if !self.app.public_base_url.starts_with("http") {
            return Err(AppError::Configuration(
                "PUBLIC_BASE_URL must be an http(s) URL".to_string(),
            ));
        }

        Ok(())
    }
}
