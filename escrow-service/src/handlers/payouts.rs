//! Manual payout release, used by operators once a booking is complete.

use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::{
    dtos::{ReleasePayoutRequest, SuccessResponse},
    services::{metrics, EmailMessage},
    startup::AppState,
    utils::ValidatedJson,
};

/// Release escrowed funds for a booking and notify both parties.
///
/// Not idempotent: repeating the call repeats the writes and the emails.
pub async fn release_payout(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ReleasePayoutRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    let booking_id = payload.booking_id.as_str();
    let commission = payload.commission();

    let found = state.store.release_booking(booking_id).await.map_err(|e| {
        tracing::error!(booking_id = %booking_id, error = %e, "Failed to release booking");
        AppError::DatabaseError(e)
    })?;
    if !found {
        return Err(AppError::NotFound(anyhow::anyhow!("Booking not found")));
    }

    let released = state
        .store
        .release_payments_for_booking(booking_id, commission)
        .await
        .map_err(|e| {
            tracing::error!(booking_id = %booking_id, error = %e, "Failed to release payments");
            AppError::DatabaseError(e)
        })?;

    metrics::record_release();
    tracing::info!(
        booking_id = %booking_id,
        commission,
        payments = released,
        "Payout released"
    );

    let booking = state
        .store
        .get_booking(booking_id)
        .await
        .map_err(AppError::DatabaseError)?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Booking not found")))?;

    let provider_email = match booking.provider_id.as_deref() {
        Some(provider_id) => state
            .store
            .get_provider(provider_id)
            .await
            .map_err(AppError::DatabaseError)?
            .and_then(|provider| provider.email),
        None => None,
    };

    let notifications = [
        provider_email.map(|to| EmailMessage::payout_released(&to, booking_id)),
        booking
            .user_email
            .as_deref()
            .map(|to| EmailMessage::booking_completed(to, booking_id)),
    ];

    for (recipient, message) in ["provider", "user"].into_iter().zip(notifications) {
        let Some(message) = message else {
            tracing::warn!(booking_id = %booking_id, recipient, "No email address, skipping notification");
            continue;
        };
        state.email.send(&message).await.map_err(|e| {
            tracing::error!(booking_id = %booking_id, recipient, error = %e, "Failed to send release email");
            AppError::EmailError(e.to_string())
        })?;
    }

    Ok(Json(SuccessResponse::ok()))
}
