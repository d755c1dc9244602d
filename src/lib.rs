//! Wreckpay payments core
//!
//! Invoice balances, processor intents, webhook reconciliation and manual
//! payment allocation for the demolition operations backend.

pub mod config;
pub mod core;
pub mod middleware;
pub mod modules;

use actix_web::web;
use std::sync::Arc;

use crate::config::Config;
use crate::middleware::SessionRepository;
use crate::modules::gateways::{IntentService, PaymentGateway, StripeSignatureVerifier};
use crate::modules::invoices::InvoiceRepository;
use crate::modules::notifications::{EmailSender, PaymentNotifier};
use crate::modules::payments::{AllocationEngine, PaymentRepository, PaymentService, WebhookHandler};

// Re-export commonly used types
pub use modules::gateways;
pub use modules::invoices;
pub use modules::notifications;
pub use modules::payments;

/// Collaborators the services are built from
pub struct Backends {
    pub invoices: Arc<dyn InvoiceRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub email: Arc<dyn EmailSender>,
}

/// Shared service graph handed to every worker
#[derive(Clone)]
pub struct AppServices {
    pub intents: web::Data<IntentService>,
    pub payments: web::Data<PaymentService>,
    pub webhooks: web::Data<WebhookHandler>,
    pub sessions: Arc<dyn SessionRepository>,
    pub cookie_name: String,
}

impl AppServices {
    pub fn build(config: &Config, backends: Backends) -> Self {
        let notifier = Arc::new(PaymentNotifier::new(
            backends.email,
            config.app.base_url.clone(),
        ));

        let verifier = StripeSignatureVerifier::new(
            config.stripe.webhook_secret.clone(),
            std::time::Duration::from_secs(config.stripe.webhook_tolerance_secs),
        );

        let intents = IntentService::new(
            backends.invoices.clone(),
            backends.payments.clone(),
            backends.gateway,
            config.stripe.currency.clone(),
            config.stripe.retrieve_timeout(),
        );

        let engine = AllocationEngine::new(backends.invoices, backends.payments.clone());

        Self {
            intents: web::Data::new(intents),
            payments: web::Data::new(PaymentService::new(backends.payments.clone(), engine)),
            webhooks: web::Data::new(WebhookHandler::new(backends.payments, verifier, notifier)),
            sessions: backends.sessions,
            cookie_name: config.session.cookie_name.clone(),
        }
    }

    /// Mount every route and the shared state on an app
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.intents.clone())
            .app_data(self.payments.clone())
            .app_data(self.webhooks.clone())
            .app_data(middleware::json_config());

        modules::health::configure(cfg);

        payments::configure(cfg, self.sessions.clone(), &self.cookie_name);
    }
}
