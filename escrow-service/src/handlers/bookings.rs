//! Provider check-in and the payout it releases.
//!
//! The provider confirms the vehicle is parked by submitting the booking's
//! OTP. The store flips `payoutTriggered` inside a transaction, so concurrent
//! submissions produce at most one payout. Everything after the flip runs
//! exactly once per booking and is never retried here: a failed payout stays
//! failed until an operator releases it manually.

use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::{
    dtos::{present, MarkParkedRequest, MarkParkedResponse},
    middleware::BearerToken,
    models::{Booking, Payment, PaymentStatus, PaymentUpdate},
    services::{
        metrics,
        razorpay::{to_paise, PayoutRequest},
        EmailMessage, TriggerOutcome,
    },
    startup::AppState,
    utils::ValidatedJson,
};

pub async fn mark_parked(
    State(state): State<AppState>,
    token: Option<BearerToken>,
    ValidatedJson(payload): ValidatedJson<MarkParkedRequest>,
) -> Result<Json<MarkParkedResponse>, AppError> {
    let otp = payload.otp.as_ref().filter(|otp| !otp.is_empty());
    let (Some(BearerToken(token)), Some(booking_id), Some(otp)) =
        (token, present(&payload.booking_id), otp)
    else {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Missing token, bookingId or otp"
        )));
    };

    let identity = state.identity.verify(&token).map_err(|e| {
        tracing::warn!(booking_id = %booking_id, error = %e, "Rejected check-in token");
        AppError::InvalidToken(e)
    })?;
    let provider_uid = identity.uid;

    let booking = state
        .store
        .get_booking(booking_id)
        .await
        .map_err(AppError::DatabaseError)?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Booking not found")))?;

    if !booking.is_assigned_to(&provider_uid) {
        tracing::warn!(
            booking_id = %booking_id,
            provider_uid = %provider_uid,
            "Check-in by provider not assigned to booking"
        );
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Not authorized for this booking"
        )));
    }

    if !booking.otp_matches(otp) {
        return Err(AppError::BadRequest(anyhow::anyhow!("Invalid OTP")));
    }

    let outcome = state.store.trigger_payout(booking_id).await.map_err(|e| {
        tracing::error!(booking_id = %booking_id, error = %e, "Payout trigger transaction failed");
        AppError::DatabaseError(e)
    })?;

    let booking = match outcome {
        TriggerOutcome::Triggered(booking) => booking,
        TriggerOutcome::AlreadyTriggered => {
            metrics::record_payout("already_triggered");
            tracing::info!(booking_id = %booking_id, "Payout already triggered");
            return Ok(Json(MarkParkedResponse::message(
                "Payout already triggered (idempotent)",
            )));
        }
        TriggerOutcome::BookingMissing => {
            return Err(AppError::BadRequest(anyhow::anyhow!("Booking disappeared")));
        }
        TriggerOutcome::InvalidStatus(status) => {
            tracing::warn!(
                booking_id = %booking_id,
                status = status.as_str(),
                "Check-in refused for terminal booking"
            );
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Invalid booking status for payout"
            )));
        }
    };

    tracing::info!(booking_id = %booking_id, provider_uid = %provider_uid, "Booking checked in");

    let payment = Payment::payout_tracking(booking_id, &provider_uid, booking.total_cost);
    state
        .store
        .insert_payment(&payment)
        .await
        .map_err(AppError::DatabaseError)?;

    release_to_provider(&state, &booking, &provider_uid, &payment).await
}

/// Pay the provider for a booking whose trigger flag this request flipped.
async fn release_to_provider(
    state: &AppState,
    booking: &Booking,
    provider_uid: &str,
    payment: &Payment,
) -> Result<Json<MarkParkedResponse>, AppError> {
    let booking_id = booking.id.as_str();

    if !state.razorpay.payouts_enabled() {
        state
            .store
            .update_payment(
                &payment.id,
                &PaymentUpdate::status(PaymentStatus::ManualReleaseRequired),
            )
            .await
            .map_err(AppError::DatabaseError)?;
        metrics::record_payout("manual");
        tracing::info!(booking_id = %booking_id, "Payouts disabled, queued for manual release");
        return Ok(Json(MarkParkedResponse::message(
            "Payout queued for manual release",
        )));
    }

    let provider = state
        .store
        .get_user(provider_uid)
        .await
        .map_err(AppError::DatabaseError)?;
    let bank = provider.as_ref().and_then(|p| p.bank_account());

    let Some(bank) = bank else {
        state
            .store
            .update_payment(
                &payment.id,
                &PaymentUpdate::status(PaymentStatus::NoPayoutDetails),
            )
            .await
            .map_err(AppError::DatabaseError)?;
        metrics::record_payout("no_details");
        tracing::warn!(booking_id = %booking_id, provider_uid = %provider_uid, "Provider has no payout details");
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Provider payout details missing"
        )));
    };

    let provider_email = provider.as_ref().and_then(|p| p.email.clone());
    let request = PayoutRequest::imps(
        state.razorpay.payout_account_number(),
        &bank,
        provider_uid,
        provider_email.as_deref(),
        to_paise(booking.total_cost),
        booking_id,
    );

    let payout = match state.razorpay.create_payout(&request, booking_id).await {
        Ok(payout) => payout,
        Err(e) => {
            metrics::record_payout("failed");
            tracing::error!(booking_id = %booking_id, error = %e, "Payout failed");
            if let Err(update_err) = state
                .store
                .update_payment(&payment.id, &PaymentUpdate::payout_failed(e.to_string()))
                .await
            {
                tracing::error!(
                    payment_id = %payment.id,
                    error = %update_err,
                    "Failed to record payout failure"
                );
            }
            return Err(AppError::UpstreamFailed("Payout failed".to_string(), e));
        }
    };

    let payout_id = payout.get("id").and_then(|id| id.as_str());
    state
        .store
        .update_payment(&payment.id, &PaymentUpdate::payout_released(payout.clone()))
        .await
        .map_err(AppError::DatabaseError)?;
    state
        .store
        .record_booking_payout(booking_id, payout_id)
        .await
        .map_err(AppError::DatabaseError)?;

    metrics::record_payout("released");
    tracing::info!(
        booking_id = %booking_id,
        payout_id = payout_id.unwrap_or("-"),
        amount = request.amount,
        "Payout released to provider"
    );

    match provider_email {
        Some(to) => {
            if let Err(e) = state
                .email
                .send(&EmailMessage::payout_released(&to, booking_id))
                .await
            {
                tracing::error!(booking_id = %booking_id, error = %e, "Failed to send payout email");
            }
        }
        None => {
            tracing::warn!(booking_id = %booking_id, "Provider has no email, skipping payout notification");
        }
    }

    Ok(Json(MarkParkedResponse::payout(payout)))
}
