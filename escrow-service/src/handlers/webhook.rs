//! Razorpay checkout confirmation.
//!
//! The client forwards the three checkout identifiers after a successful
//! payment. Once the signature checks out, every payment on the order moves
//! to `success` and its booking is marked as held in escrow.

use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::{
    dtos::{SuccessResponse, WebhookRequest},
    models::{PaymentStatus, PaymentUpdate},
    services::{metrics, razorpay::PaymentVerification},
    startup::AppState,
    utils::ValidatedJson,
};

/// Every failure on this route is reported as 400, including store errors.
pub async fn payment_webhook(
    State(state): State<AppState>,
    body: Result<ValidatedJson<WebhookRequest>, AppError>,
) -> Result<Json<SuccessResponse>, AppError> {
    // The payload carries no validation rules, so rejections are always 400s.
    let ValidatedJson(payload) = body.inspect_err(|_| metrics::record_webhook("malformed"))?;

    let verification = PaymentVerification {
        razorpay_order_id: payload.razorpay_order_id,
        razorpay_payment_id: payload.razorpay_payment_id,
        razorpay_signature: payload.razorpay_signature,
    };

    let is_valid = state
        .razorpay
        .verify_payment_signature(&verification)
        .map_err(AppError::BadRequest)?;

    if !is_valid {
        metrics::record_webhook("invalid_signature");
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Invalid payment signature"
        )));
    }

    let order_id = &verification.razorpay_order_id;
    let payments = state
        .store
        .find_payments_by_order(order_id)
        .await
        .map_err(|e| {
            tracing::error!(order_id = %order_id, error = %e, "Failed to look up payments");
            AppError::BadRequest(e)
        })?;

    for payment in &payments {
        state
            .store
            .update_payment(&payment.id, &PaymentUpdate::status(PaymentStatus::Success))
            .await
            .map_err(|e| {
                tracing::error!(payment_id = %payment.id, error = %e, "Failed to mark payment successful");
                AppError::BadRequest(e)
            })?;

        state
            .store
            .mark_booking_escrowed(&payment.booking_id)
            .await
            .map_err(|e| {
                tracing::error!(booking_id = %payment.booking_id, error = %e, "Failed to mark booking escrowed");
                AppError::BadRequest(e)
            })?;
    }

    metrics::record_webhook("verified");
    tracing::info!(
        order_id = %order_id,
        payments = payments.len(),
        "Checkout confirmed, funds held in escrow"
    );

    Ok(Json(SuccessResponse::ok()))
}
