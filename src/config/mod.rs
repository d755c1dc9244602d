use crate::core::{AppError, Result};
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub mod database;
pub mod server;

pub use database::DatabaseConfig;
pub use server::ServerConfig;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub stripe: StripeConfig,
    pub session: SessionConfig,
    pub email: Option<EmailConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub log_level: String,
    pub log_format: LogFormat,
    /// Base URL for customer-facing links; also the allowed CORS origin
    pub base_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(AppError::Configuration(format!(
                "Invalid LOG_FORMAT '{}', expected 'pretty' or 'json'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeConfig {
    pub secret_key: String,
    /// Absent secret means every webhook delivery is rejected
    pub webhook_secret: Option<String>,
    pub api_base: String,
    pub currency: String,
    pub retrieve_timeout_secs: u64,
    pub webhook_tolerance_secs: u64,
}

impl StripeConfig {
    pub fn retrieve_timeout(&self) -> Duration {
        Duration::from_secs(self.retrieve_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub cookie_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = Config {
            app: AppConfig {
                env: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
                log_format: env::var("LOG_FORMAT")
                    .unwrap_or_else(|_| "pretty".to_string())
                    .parse()?,
                base_url: required("APP_BASE_URL")?,
            },
            database: DatabaseConfig::from_env()?,
            server: ServerConfig::from_env()?,
            stripe: StripeConfig {
                secret_key: required("STRIPE_SECRET_KEY")?,
                webhook_secret: optional("STRIPE_WEBHOOK_SECRET"),
                api_base: env::var("STRIPE_API_BASE")
                    .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
                currency: env::var("STRIPE_CURRENCY").unwrap_or_else(|_| "usd".to_string()),
                retrieve_timeout_secs: parse_or("STRIPE_RETRIEVE_TIMEOUT_SECS", 10)?,
                webhook_tolerance_secs: parse_or("STRIPE_WEBHOOK_TOLERANCE_SECS", 300)?,
            },
            session: SessionConfig {
                cookie_name: env::var("SESSION_COOKIE_NAME")
                    .unwrap_or_else(|_| "session_id".to_string()),
            },
            email: EmailConfig::from_parts(
                optional("EMAIL_API_URL"),
                optional("EMAIL_API_KEY"),
                optional("EMAIL_FROM"),
            )?,
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.stripe.retrieve_timeout_secs == 0 {
            return Err(AppError::Configuration(
                "STRIPE_RETRIEVE_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        if self.stripe.webhook_tolerance_secs == 0 {
            return Err(AppError::Configuration(
                "STRIPE_WEBHOOK_TOLERANCE_SECS must be greater than 0".to_string(),
            ));
        }

        if self.stripe.currency.trim().is_empty() {
            return Err(AppError::Configuration(
                "STRIPE_CURRENCY cannot be empty".to_string(),
            ));
        }

        if !self.app.base_url.starts_with("http://") && !self.app.base_url.starts_with("https://")
        {
            return Err(AppError::Configuration(format!(
                "APP_BASE_URL must be an http(s) URL, got '{}'",
                self.app.base_url
            )));
        }

        Ok(())
    }
}

impl EmailConfig {
    /// All three settings or none of them.
    fn from_parts(
        api_url: Option<String>,
        api_key: Option<String>,
        from: Option<String>,
    ) -> Result<Option<Self>> {
        match (api_url, api_key, from) {
            (Some(api_url), Some(api_key), Some(from)) => Ok(Some(EmailConfig {
                api_url,
                api_key,
                from,
            })),
            (None, None, None) => Ok(None),
            _ => Err(AppError::Configuration(
                "EMAIL_API_URL, EMAIL_API_KEY and EMAIL_FROM must be set together".to_string(),
            )),
        }
    }
}

fn required(key: &str) -> Result<String> {
    env::var(key).map_err(|_| AppError::Configuration(format!("{} not set", key)))
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

pub(crate) fn parse_or<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Configuration(format!("Invalid {}", key))),
        Err(_) => Ok(default),
    }
}
