mod common;

use common::{booking, checkout_signature, TestApp, TestAppOptions, PROVIDER_ID, USER_ID};
use service_core::utils::sign_hmac_sha256;
use escrow_service::models::{BookingStatus, CheckoutCapture, EscrowStatus, Payment, PaymentStatus};
use escrow_service::services::PaymentStore;
use serde_json::json;

fn checkout(booking_id: &str, order_id: &str, payment_id: &str) -> Payment {
    Payment::checkout(
        booking_id,
        USER_ID,
        Some(PROVIDER_ID.to_string()),
        150.0,
        CheckoutCapture {
            payment_id: payment_id.to_string(),
            order_id: order_id.to_string(),
            signature: None,
        },
    )
}

#[tokio::test]
async fn verified_webhook_moves_order_payments_to_escrow() {
    let app = TestApp::spawn().await;
    app.seed_booking(booking("bk_1", BookingStatus::Confirmed)).await;
    app.seed_booking(booking("bk_2", BookingStatus::Confirmed)).await;
    app.store.insert_payment(&checkout("bk_1", "order_1", "pay_1")).await.unwrap();
    app.store.insert_payment(&checkout("bk_1", "order_1", "pay_2")).await.unwrap();
    app.store.insert_payment(&checkout("bk_2", "order_2", "pay_3")).await.unwrap();

    let response = app
        .post_json(
            "/payment/webhook",
            &json!({
                "razorpay_order_id": "order_1",
                "razorpay_payment_id": "pay_1",
                "razorpay_signature": checkout_signature("order_1", "pay_1"),
            }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "success": true }));

    for payment in app.store.payments_for_booking("bk_1").await {
        assert_eq!(payment.status, PaymentStatus::Success);
    }
    assert_eq!(
        app.booking("bk_1").await.payment_status,
        Some(EscrowStatus::PaidEscrow)
    );

    let untouched = app.store.payments_for_booking("bk_2").await;
    assert_eq!(untouched[0].status, PaymentStatus::Created);
    assert_eq!(app.booking("bk_2").await.payment_status, None);
}

#[tokio::test]
async fn webhook_with_bad_signature_is_rejected() {
    let app = TestApp::spawn().await;
    app.seed_booking(booking("bk_1", BookingStatus::Confirmed)).await;
    app.store.insert_payment(&checkout("bk_1", "order_1", "pay_1")).await.unwrap();

    let response = app
        .post_json(
            "/payment/webhook",
            &json!({
                "razorpay_order_id": "order_1",
                "razorpay_payment_id": "pay_1",
                "razorpay_signature": checkout_signature("order_1", "pay_other"),
            }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());

    let payments = app.store.payments_for_booking("bk_1").await;
    assert_eq!(payments[0].status, PaymentStatus::Created);
    assert_eq!(app.booking("bk_1").await.payment_status, None);
}

#[tokio::test]
async fn webhook_with_missing_fields_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app
        .post_json("/payment/webhook", &json!({ "razorpay_order_id": "order_1" }))
        .await;

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn webhook_for_unknown_order_succeeds() {
    let app = TestApp::spawn().await;

    let response = app
        .post_json(
            "/payment/webhook",
            &json!({
                "razorpay_order_id": "order_none",
                "razorpay_payment_id": "pay_1",
                "razorpay_signature": checkout_signature("order_none", "pay_1"),
            }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn webhook_fails_when_linked_booking_is_missing() {
    let app = TestApp::spawn().await;
    app.store.insert_payment(&checkout("bk_gone", "order_1", "pay_1")).await.unwrap();

    let response = app
        .post_json(
            "/payment/webhook",
            &json!({
                "razorpay_order_id": "order_1",
                "razorpay_payment_id": "pay_1",
                "razorpay_signature": checkout_signature("order_1", "pay_1"),
            }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn webhook_is_rejected_without_gateway_secret() {
    let app = TestApp::spawn_with(TestAppOptions {
        razorpay_configured: false,
        ..TestAppOptions::default()
    })
    .await;
    app.seed_booking(booking("bk_1", BookingStatus::Confirmed)).await;
    app.store.insert_payment(&checkout("bk_1", "order_1", "pay_1")).await.unwrap();

    let response = app
        .post_json(
            "/payment/webhook",
            &json!({
                "razorpay_order_id": "order_1",
                "razorpay_payment_id": "pay_1",
                "razorpay_signature": sign_hmac_sha256("", "order_1|pay_1").unwrap(),
            }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 400);
    let payments = app.store.payments_for_booking("bk_1").await;
    assert_eq!(payments[0].status, PaymentStatus::Created);
    assert_eq!(app.booking("bk_1").await.payment_status, None);
}
