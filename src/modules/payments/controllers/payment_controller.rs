use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::core::Result;
use crate::middleware::AuthenticatedUser;
use crate::modules::gateways::IntentService;
use crate::modules::payments::models::{CreateIntentRequest, RecordPaymentRequest};
use crate::modules::payments::services::PaymentService;

/// Create or reuse a processor intent for an invoice
/// POST /payments/create-intent
pub async fn create_intent(
    service: web::Data<IntentService>,
    user: AuthenticatedUser,
    body: web::Json<CreateIntentRequest>,
) -> Result<HttpResponse> {
    let handle = service
        .create_or_reuse_intent(&body.invoice_id, &user.user_id)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "client_secret": handle.client_secret,
        "payment_intent_id": handle.intent_id,
    })))
}

/// Record a manual payment with optional invoice allocations
/// POST /payments
pub async fn record_payment(
    service: web::Data<PaymentService>,
    user: AuthenticatedUser,
    body: web::Json<RecordPaymentRequest>,
) -> Result<HttpResponse> {
    let recorded = service.record_payment(&user, body.into_inner()).await?;

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "data": recorded.payment,
        "skipped": recorded.skipped,
    })))
}

/// List payments visible to the caller
/// GET /payments
pub async fn list_payments(
    service: web::Data<PaymentService>,
    user: AuthenticatedUser,
) -> Result<HttpResponse> {
    let payments = service.list_payments(&user).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": payments,
    })))
}
