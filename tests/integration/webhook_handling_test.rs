// Processor webhook reconciliation

#[path = "../helpers/mod.rs"]
mod helpers;

use actix_web::{test, App};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use helpers::*;
use wreckpay::invoices::InvoiceStatus;
use wreckpay::payments::{PaymentStatus, WebhookOutcome};

async fn post_webhook(ctx: &TestApp, body: &str, signature: Option<&str>) -> u16 {
    let app = test::init_service(App::new().configure(|cfg| ctx.services.configure(cfg))).await;

    let mut req = test::TestRequest::post()
        .uri("/payments/webhook")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body.to_string());
    if let Some(signature) = signature {
        req = req.insert_header(("Stripe-Signature", signature.to_string()));
    }

    test::call_service(&app, req.to_request())
        .await
        .status()
        .as_u16()
}

/// Invoice with a pending intent, as left behind by the checkout flow
async fn invoice_with_intent(ctx: &TestApp, number: &str, total: Decimal) -> (String, String) {
    let invoice = TestDataFactory::invoice(number, total, "staff-1");
    ctx.store.insert_invoice(invoice.clone());

    let handle = ctx
        .services
        .intents
        .create_or_reuse_intent(&invoice.id, "customer-1")
        .await
        .unwrap();

    (invoice.id, handle.intent_id)
}

#[actix_web::test]
async fn test_succeeded_event_settles_payment_and_invoice() {
    let ctx = TestApp::new();
    let (invoice_id, intent_id) = invoice_with_intent(&ctx, "INV-0001", dec!(500.00)).await;

    let body = TestDataFactory::intent_succeeded_event(&intent_id, &invoice_id, 50000);
    let status = post_webhook(&ctx, &body, Some(&TestDataFactory::signature_for(&body))).await;
    assert_eq!(status, 200);

    let payment = ctx.store.payment_for_intent(&intent_id).unwrap();
    assert_eq!(payment.status, PaymentStatus::Succeeded);
    assert_eq!(payment.payment_method, "card");
    assert_eq!(payment.allocations.len(), 1);
    assert_eq!(payment.allocations[0].invoice_id, invoice_id);
    assert_eq!(payment.allocations[0].amount_applied, dec!(500.00));
    assert_eq!(payment.allocations[0].balance_before, dec!(500.00));
    assert_eq!(payment.allocations[0].balance_after, Decimal::ZERO);

    let invoice = ctx.store.invoice(&invoice_id);
    assert_eq!(invoice.invoice_status, InvoiceStatus::Paid);
    assert_eq!(invoice.balance_due, Decimal::ZERO);
    assert!(invoice.paid_at.is_some());
    assert_eq!(invoice.stripe_payment_intent_id.as_deref(), Some(intent_id.as_str()));
}

#[actix_web::test]
async fn test_redelivery_is_idempotent() {
    let ctx = TestApp::new();
    let (invoice_id, intent_id) = invoice_with_intent(&ctx, "INV-0002", dec!(250.00)).await;
    let body = TestDataFactory::intent_succeeded_event(&intent_id, &invoice_id, 25000);

    let first = ctx
        .services
        .webhooks
        .handle_event(body.as_bytes(), Some(&TestDataFactory::signature_for(&body)))
        .await
        .unwrap();
    let invoice_after_first = ctx.store.invoice(&invoice_id);
    let payment_after_first = ctx.store.payment_for_intent(&intent_id).unwrap();

    let second = ctx
        .services
        .webhooks
        .handle_event(body.as_bytes(), Some(&TestDataFactory::signature_for(&body)))
        .await
        .unwrap();

    assert_eq!(first, WebhookOutcome::Applied);
    assert_eq!(second, WebhookOutcome::Duplicate);
    assert_eq!(ctx.store.invoice(&invoice_id), invoice_after_first);
    assert_eq!(
        ctx.store.payment_for_intent(&intent_id).unwrap(),
        payment_after_first
    );
    assert_eq!(ctx.store.payments().len(), 1);
    assert_eq!(ctx.email.sent().len(), 1, "receipt sent once");
}

#[actix_web::test]
async fn test_bad_signature_changes_nothing() {
    let ctx = TestApp::new();
    let (invoice_id, intent_id) = invoice_with_intent(&ctx, "INV-0003", dec!(80.00)).await;
    let body = TestDataFactory::intent_succeeded_event(&intent_id, &invoice_id, 8000);

    let forged = "t=1760000000,v1=0000000000000000000000000000000000000000000000000000000000000000";
    assert_eq!(post_webhook(&ctx, &body, Some(forged)).await, 400);
    assert_eq!(post_webhook(&ctx, &body, None).await, 400);

    // Signed for a different body
    let other = TestDataFactory::intent_succeeded_event(&intent_id, &invoice_id, 1);
    assert_eq!(
        post_webhook(&ctx, &body, Some(&TestDataFactory::signature_for(&other))).await,
        400
    );

    let payment = ctx.store.payment_for_intent(&intent_id).unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(ctx.store.invoice(&invoice_id).balance_due, dec!(80.00));
    assert!(ctx.email.sent().is_empty());
}

#[actix_web::test]
async fn test_missing_webhook_secret_rejects_everything() {
    let mut config = test_config();
    config.stripe.webhook_secret = None;
    let ctx = TestApp::with_config(config);
    let (invoice_id, intent_id) = invoice_with_intent(&ctx, "INV-0004", dec!(80.00)).await;

    let body = TestDataFactory::intent_succeeded_event(&intent_id, &invoice_id, 8000);
    assert_eq!(
        post_webhook(&ctx, &body, Some(&TestDataFactory::signature_for(&body))).await,
        400
    );
    assert_eq!(
        ctx.store.payment_for_intent(&intent_id).unwrap().status,
        PaymentStatus::Pending
    );
}

#[actix_web::test]
async fn test_succeeded_without_invoice_metadata_is_acknowledged() {
    let ctx = TestApp::new();
    let (invoice_id, intent_id) = invoice_with_intent(&ctx, "INV-0005", dec!(120.00)).await;

    let body = serde_json::json!({
        "id": "evt_no_meta",
        "type": "payment_intent.succeeded",
        "data": { "object": { "id": intent_id, "amount_received": 12000, "metadata": {} } }
    })
    .to_string();

    let outcome = ctx
        .services
        .webhooks
        .handle_event(body.as_bytes(), Some(&TestDataFactory::signature_for(&body)))
        .await
        .unwrap();

    assert_eq!(outcome, WebhookOutcome::Ignored);
    assert_eq!(
        ctx.store.payment_for_intent(&intent_id).unwrap().status,
        PaymentStatus::Pending
    );
    assert_eq!(ctx.store.invoice(&invoice_id).balance_due, dec!(120.00));
}

#[actix_web::test]
async fn test_orphan_intent_creates_payment() {
    let ctx = TestApp::new();
    let invoice = TestDataFactory::invoice("INV-0006", dec!(340.00), "staff-1");
    ctx.store.insert_invoice(invoice.clone());

    let body = TestDataFactory::intent_succeeded_event("pi_external_9", &invoice.id, 34000);
    let outcome = ctx
        .services
        .webhooks
        .handle_event(body.as_bytes(), Some(&TestDataFactory::signature_for(&body)))
        .await
        .unwrap();

    assert_eq!(outcome, WebhookOutcome::Applied);

    let payment = ctx.store.payment_for_intent("pi_external_9").unwrap();
    assert_eq!(payment.payment_number, "PAY-pi_external_9");
    assert_eq!(payment.status, PaymentStatus::Succeeded);
    assert_eq!(payment.amount, dec!(340.00));
    assert_eq!(payment.user_id, "customer-1");
    assert_eq!(payment.allocations.len(), 1);

    let invoice = ctx.store.invoice(&invoice.id);
    assert_eq!(invoice.invoice_status, InvoiceStatus::Paid);
    assert_eq!(invoice.balance_due, Decimal::ZERO);
}

#[actix_web::test]
async fn test_failed_event_marks_payment_failed() {
    let ctx = TestApp::new();
    let (invoice_id, intent_id) = invoice_with_intent(&ctx, "INV-0007", dec!(55.00)).await;

    let body = TestDataFactory::intent_failed_event(&intent_id);
    assert_eq!(
        post_webhook(&ctx, &body, Some(&TestDataFactory::signature_for(&body))).await,
        200
    );

    assert_eq!(
        ctx.store.payment_for_intent(&intent_id).unwrap().status,
        PaymentStatus::Failed
    );
    let invoice = ctx.store.invoice(&invoice_id);
    assert_eq!(invoice.balance_due, dec!(55.00));
    assert_eq!(invoice.invoice_status, InvoiceStatus::Sent);
}

#[actix_web::test]
async fn test_failed_event_for_unknown_intent_is_unmatched() {
    let ctx = TestApp::new();

    let body = TestDataFactory::intent_failed_event("pi_never_seen");
    let outcome = ctx
        .services
        .webhooks
        .handle_event(body.as_bytes(), Some(&TestDataFactory::signature_for(&body)))
        .await
        .unwrap();

    assert_eq!(outcome, WebhookOutcome::Unmatched);
    assert!(ctx.store.payments().is_empty());
}

#[actix_web::test]
async fn test_unknown_event_type_is_acknowledged() {
    let ctx = TestApp::new();

    let body = serde_json::json!({
        "id": "evt_charge",
        "type": "charge.refunded",
        "data": { "object": { "id": "ch_1" } }
    })
    .to_string();

    assert_eq!(
        post_webhook(&ctx, &body, Some(&TestDataFactory::signature_for(&body))).await,
        200
    );
    assert!(ctx.store.payments().is_empty());
}

#[actix_web::test]
async fn test_settlement_failure_asks_for_redelivery() {
    let ctx = TestApp::new();
    let (invoice_id, intent_id) = invoice_with_intent(&ctx, "INV-0008", dec!(75.00)).await;
    ctx.store.fail_settlements(true);

    let body = TestDataFactory::intent_succeeded_event(&intent_id, &invoice_id, 7500);
    assert_eq!(
        post_webhook(&ctx, &body, Some(&TestDataFactory::signature_for(&body))).await,
        500
    );
    assert_eq!(
        ctx.store.payment_for_intent(&intent_id).unwrap().status,
        PaymentStatus::Pending
    );

    // Redelivery after recovery settles normally
    ctx.store.fail_settlements(false);
    assert_eq!(
        post_webhook(&ctx, &body, Some(&TestDataFactory::signature_for(&body))).await,
        200
    );
    assert_eq!(
        ctx.store.invoice(&invoice_id).invoice_status,
        InvoiceStatus::Paid
    );
}

#[actix_web::test]
async fn test_receipt_email_sent_on_settlement() {
    let ctx = TestApp::new();
    let (invoice_id, intent_id) = invoice_with_intent(&ctx, "INV-0009", dec!(500.00)).await;

    let body = TestDataFactory::intent_succeeded_event(&intent_id, &invoice_id, 50000);
    ctx.services
        .webhooks
        .handle_event(body.as_bytes(), Some(&TestDataFactory::signature_for(&body)))
        .await
        .unwrap();

    let sent = ctx.email.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ap@graniteridge.example");
    assert_eq!(sent[0].subject, "Payment received for invoice INV-0009");
    assert!(sent[0]
        .html
        .contains(&format!("https://ops.wreckpay.test/invoices/{}", invoice_id)));
}
