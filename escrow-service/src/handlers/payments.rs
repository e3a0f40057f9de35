use axum::{extract::State, http::StatusCode, Json};
use service_core::error::AppError;

use crate::{
    dtos::{present, CreatePaymentRequest, CreatePaymentResponse},
    models::{CheckoutCapture, Payment},
    services::metrics,
    startup::AppState,
    utils::ValidatedJson,
};

/// Record a completed checkout on behalf of the booking's user.
///
/// The ID token travels in the body because the browser client posts the
/// checkout handler's payload as-is.
pub async fn create_payment(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<CreatePaymentResponse>), AppError> {
    let amount = payload.amount.as_ref().filter(|a| !a.is_blank());
    let (Some(id_token), Some(booking_id), Some(payment_id), Some(order_id), Some(amount)) = (
        present(&payload.id_token),
        present(&payload.booking_id),
        present(&payload.razorpay_payment_id),
        present(&payload.razorpay_order_id),
        amount,
    ) else {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Missing required fields"
        )));
    };

    let amount = amount
        .value()
        .filter(|a| a.is_finite() && *a > 0.0)
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Invalid amount")))?;

    let identity = state.identity.verify(id_token).map_err(|e| {
        tracing::warn!(booking_id = %booking_id, error = %e, "Rejected payment token");
        AppError::InvalidToken(e)
    })?;

    let booking = state
        .store
        .get_booking(booking_id)
        .await
        .map_err(AppError::DatabaseError)?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Booking not found")))?;

    if !booking.is_owned_by(&identity.uid) {
        tracing::warn!(
            booking_id = %booking_id,
            uid = %identity.uid,
            "Payment for booking owned by another user"
        );
        return Err(AppError::Forbidden(anyhow::anyhow!("Unauthorized")));
    }

    let payment = Payment::checkout(
        booking_id,
        &identity.uid,
        booking.provider_id.clone(),
        amount,
        CheckoutCapture {
            payment_id: payment_id.to_string(),
            order_id: order_id.to_string(),
            signature: present(&payload.razorpay_signature).map(str::to_string),
        },
    );

    state.store.insert_payment(&payment).await.map_err(|e| {
        tracing::error!(booking_id = %booking_id, error = %e, "Failed to create payment");
        AppError::DatabaseError(e)
    })?;

    metrics::record_payment_created();
    tracing::info!(
        payment_id = %payment.id,
        booking_id = %booking_id,
        order_id = %order_id,
        "Payment created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreatePaymentResponse {
            success: true,
            payment_id: payment.id,
            message: "Payment created successfully".to_string(),
        }),
    ))
}
