use super::gateway_trait::PaymentGateway;
use crate::config::StripeConfig;
use crate::core::{AppError, Result};
use crate::modules::gateways::models::{CreateIntentParams, PaymentIntent};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

/// Stripe PaymentIntents client
///
/// Implements PaymentGateway trait against the Stripe REST API
/// API Documentation: https://docs.stripe.com/api/payment_intents
pub struct StripeClient {
    client: Client,
    secret_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl StripeClient {
    /// Create a new Stripe client
    ///
    /// # Arguments
    /// * `secret_key` - Stripe secret key (from STRIPE_SECRET_KEY env var)
    /// * `base_url` - API base URL, overridable for test doubles
    /// * `timeout` - per-request timeout
    pub fn new(secret_key: String, base_url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            secret_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &StripeConfig) -> Result<Self> {
        Self::new(
            config.secret_key.clone(),
            config.api_base.clone(),
            config.retrieve_timeout(),
        )
    }

    fn map_send_error(operation: &str, e: reqwest::Error) -> AppError {
        if e.is_connect() || e.is_timeout() {
            AppError::gateway(format!(
                "Stripe unavailable during {}: {} ({})",
                operation,
                if e.is_timeout() {
                    "timeout"
                } else {
                    "connection failed"
                },
                e
            ))
        } else {
            AppError::gateway(format!("Stripe {} request failed: {}", operation, e))
        }
    }

    /// Read the body and turn non-2xx responses into descriptive gateway errors
    async fn parse_response(operation: &str, response: reqwest::Response) -> Result<PaymentIntent> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::gateway(format!("Failed to read Stripe response: {}", e)))?;

        if !status.is_success() {
            return Err(Self::describe_error(operation, status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| AppError::gateway(format!("Failed to parse Stripe response: {}", e)))
    }

    fn describe_error(operation: &str, status: StatusCode, body: &str) -> AppError {
        let detail = serde_json::from_str::<StripeErrorBody>(body)
            .ok()
            .map(|b| {
                format!(
                    "{} ({})",
                    b.error.message.unwrap_or_default(),
                    b.error.code.unwrap_or_else(|| "no_code".to_string())
                )
            })
            .unwrap_or_else(|| body.to_string());

        AppError::gateway(format!(
            "Stripe {} failed - HTTP {}: {}",
            operation,
            status.as_u16(),
            detail
        ))
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_intent(&self, params: CreateIntentParams) -> Result<PaymentIntent> {
        let url = format!("{}/v1/payment_intents", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&params.form_fields())
            .send()
            .await
            .map_err(|e| Self::map_send_error("create intent", e))?;

        Self::parse_response("create intent", response).await
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent> {
        let url = format!("{}/v1/payment_intents/{}", self.base_url, intent_id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| Self::map_send_error("retrieve intent", e))?;

        Self::parse_response("retrieve intent", response).await
    }

    fn name(&self) -> &str {
        "stripe"
    }
}
