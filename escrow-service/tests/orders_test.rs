mod common;

use common::{TestApp, RAZORPAY_KEY_ID, RAZORPAY_SECRET};
use serde_json::json;
use wiremock::matchers::{basic_auth, body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn create_order_returns_gateway_order_id() {
    let app = TestApp::spawn().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(basic_auth(RAZORPAY_KEY_ID, RAZORPAY_SECRET))
        .and(body_json(json!({
            "amount": 50000,
            "currency": "INR",
            "payment_capture": 1
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "order_IluGWxBm9U8zJ8",
            "entity": "order",
            "amount": 50000,
            "amount_paid": 0,
            "amount_due": 50000,
            "currency": "INR",
            "receipt": null,
            "status": "created",
            "attempts": 0,
            "notes": [],
            "created_at": 1642662092
        })))
        .expect(1)
        .mount(&app.razorpay)
        .await;

    let response = app.post_json("/createOrder", &json!({ "amount": 50000 })).await;

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "order_id": "order_IluGWxBm9U8zJ8" }));
}

#[tokio::test]
async fn create_order_reports_gateway_failure() {
    let app = TestApp::spawn().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {
                "code": "BAD_REQUEST_ERROR",
                "description": "Authentication failed"
            }
        })))
        .mount(&app.razorpay)
        .await;

    let response = app.post_json("/createOrder", &json!({ "amount": 50000 })).await;

    assert_eq!(response.status().as_u16(), 502);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn create_order_requires_amount() {
    let app = TestApp::spawn().await;

    let response = app.post_json("/createOrder", &json!({})).await;

    assert_eq!(response.status().as_u16(), 400);
}
