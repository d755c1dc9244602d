use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;

use crate::core::Result;
use crate::modules::payments::services::WebhookHandler;

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Receive a processor webhook delivery
/// POST /payments/webhook
///
/// The body is taken as raw bytes; the signature covers them exactly.
///
/// # Returns
/// * `200 OK` - applied, duplicate, ignored or unmatched
/// * `400 Bad Request` - signature missing or invalid
/// * `500 Internal Server Error` - stores failed; the processor will redeliver
pub async fn receive_webhook(
    req: HttpRequest,
    body: web::Bytes,
    handler: web::Data<WebhookHandler>,
) -> Result<HttpResponse> {
    let signature = extract_signature(&req);

    let outcome = handler.handle_event(&body, signature).await.map_err(|e| {
        tracing::warn!(error = %e, "Webhook delivery rejected");
        e
    })?;

    tracing::debug!(outcome = ?outcome, "Webhook delivery handled");

    Ok(HttpResponse::Ok().json(json!({ "received": true })))
}

fn extract_signature(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
}
