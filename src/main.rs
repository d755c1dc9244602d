use actix_cors::Cors;
use actix_web::{http::header, web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wreckpay::config::{Config, DatabaseConfig, LogFormat};
use wreckpay::gateways::StripeClient;
use wreckpay::invoices::MySqlInvoiceRepository;
use wreckpay::middleware::MySqlSessionRepository;
use wreckpay::modules::health;
use wreckpay::notifications::{EmailSender, HttpEmailSender, LogEmailSender};
use wreckpay::payments::MySqlPaymentRepository;
use wreckpay::{AppServices, Backends};

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("wreckpay={},actix_web=info", config.app.log_level))
    });

    let registry = tracing_subscriber::registry().with(filter);
    match config.app.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;

    init_tracing(&config);

    tracing::info!(
        env = %config.app.env,
        bind = %config.server.bind_address(),
        "Starting wreckpay payments core"
    );

    if config.stripe.webhook_secret.is_none() {
        tracing::warn!("STRIPE_WEBHOOK_SECRET is not set; every webhook delivery will be rejected");
    }

    // Create database connection pool
    let db_pool = config
        .database
        .create_pool()
        .await
        .context("Failed to create database pool")?;
    DatabaseConfig::migrate(&db_pool)
        .await
        .context("Failed to run migrations")?;

    tracing::info!(
        pool_size = config.database.pool_size,
        max_connections = config.database.max_connections,
        "Database pool initialized"
    );

    let email: Arc<dyn EmailSender> = match &config.email {
        Some(email_config) => Arc::new(
            HttpEmailSender::new(email_config).context("Failed to build email client")?,
        ),
        None => {
            tracing::warn!("Email API not configured; receipts will only be logged");
            Arc::new(LogEmailSender)
        }
    };

    let services = AppServices::build(
        &config,
        Backends {
            invoices: Arc::new(MySqlInvoiceRepository::new(db_pool.clone())),
            payments: Arc::new(MySqlPaymentRepository::new(db_pool.clone())),
            sessions: Arc::new(MySqlSessionRepository::new(db_pool.clone())),
            gateway: Arc::new(
                StripeClient::from_config(&config.stripe).context("Failed to build Stripe client")?,
            ),
            email,
        },
    );

    // Start HTTP server
    let bind_address = config.server.bind_address();
    let allowed_origin = config.app.base_url.clone();
    let pool_data = web::Data::new(db_pool);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&allowed_origin)
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT])
            .supports_credentials()
            .max_age(3600);

        let services = services.clone();

        App::new()
            .wrap(cors)
            .wrap(TracingLogger::default())
            .app_data(pool_data.clone())
            .route("/ready", web::get().to(health::readiness_check))
            .configure(|cfg| services.configure(cfg))
    })
    .workers(config.server.workers)
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?
    .run();

    tracing::info!("Server started at http://{}", bind_address);

    server.await.context("Server error")
}
