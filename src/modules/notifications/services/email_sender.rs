use crate::config::EmailConfig;
use crate::core::{AppError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Provider acknowledgement for an accepted message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailReceipt {
    pub message_id: String,
}

/// Transactional email seam
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<EmailReceipt>;
}

/// Posts messages to a JSON transactional-email API
pub struct HttpEmailSender {
    client: Client,
    api_url: String,
    api_key: String,
    from: String,
}

#[derive(Debug, Serialize)]
struct OutgoingEmail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    #[serde(alias = "messageId", alias = "message_id")]
    id: String,
}

impl HttpEmailSender {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            from: config.from.clone(),
        })
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<EmailReceipt> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&OutgoingEmail {
                from: &self.from,
                to,
                subject,
                html,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!(
                "Email API returned HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let provider: ProviderResponse = response.json().await?;

        Ok(EmailReceipt {
            message_id: provider.id,
        })
    }
}

/// Used when no email API is configured; messages only reach the log
#[derive(Debug, Default)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, to: &str, subject: &str, _html: &str) -> Result<EmailReceipt> {
        let message_id = format!("log-{}", Uuid::new_v4());
        tracing::info!(to = %to, subject = %subject, message_id = %message_id, "Email not sent (no email API configured)");

        Ok(EmailReceipt { message_id })
    }
}
