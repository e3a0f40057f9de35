use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::{
    dtos::{CreateOrderRequest, CreateOrderResponse},
    startup::AppState,
    utils::ValidatedJson,
};

/// Create a Razorpay order the browser checkout can pay against.
pub async fn create_order(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateOrderRequest>,
) -> Result<Json<CreateOrderResponse>, AppError> {
    let order = state
        .razorpay
        .create_order(payload.amount, "INR", None, None)
        .await
        .map_err(|e| {
            tracing::error!(amount = payload.amount, error = %e, "Failed to create Razorpay order");
            AppError::BadGateway(e.to_string())
        })?;

    Ok(Json(CreateOrderResponse { order_id: order.id }))
}
