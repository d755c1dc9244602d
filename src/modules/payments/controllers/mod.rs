pub mod payment_controller;
pub mod webhook_controller;

use actix_web::web;
use std::sync::Arc;

use crate::middleware::{SessionAuth, SessionRepository};

/// Configure payment routes
///
/// The webhook is registered ahead of the session-guarded scope so the
/// processor's deliveries never hit the cookie check.
pub fn configure(
    cfg: &mut web::ServiceConfig,
    sessions: Arc<dyn SessionRepository>,
    cookie_name: &str,
) {
    cfg.service(
        web::resource("/payments/webhook")
            .route(web::post().to(webhook_controller::receive_webhook)),
    )
    .service(
        web::scope("/payments")
            .wrap(SessionAuth::new(sessions, cookie_name))
            .route(
                "/create-intent",
                web::post().to(payment_controller::create_intent),
            )
            .route("", web::get().to(payment_controller::list_payments))
            .route("", web::post().to(payment_controller::record_payment)),
    );
}
