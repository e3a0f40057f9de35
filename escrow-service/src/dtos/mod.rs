use crate::models::Otp;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Commission taken by the marketplace when no rate is supplied.
pub const DEFAULT_COMMISSION: f64 = 0.15;

/// Checkout callback forwarded by the client after Razorpay checkout.
#[derive(Debug, Deserialize, Validate)]
pub struct WebhookRequest {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    /// Amount in paise.
    pub amount: u64,
}

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub order_id: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReleasePayoutRequest {
    #[validate(length(min = 1, message = "bookingId is required"))]
    pub booking_id: String,

    #[validate(range(min = 0.0, max = 1.0, message = "commission must be between 0 and 1"))]
    pub commission: Option<f64>,
}

impl ReleasePayoutRequest {
    pub fn commission(&self) -> f64 {
        self.commission.unwrap_or(DEFAULT_COMMISSION)
    }
}

/// Check-in request. Both fields are optional on the wire so that a missing
/// field is reported together with a missing token.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MarkParkedRequest {
    pub booking_id: Option<String>,
    pub otp: Option<Otp>,
}

#[derive(Debug, Serialize)]
pub struct MarkParkedResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout: Option<serde_json::Value>,
}

impl MarkParkedResponse {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            payout: None,
        }
    }

    pub fn payout(payout: serde_json::Value) -> Self {
        Self {
            success: true,
            message: None,
            payout: Some(payout),
        }
    }
}

/// Amount as sent by the browser client: either a JSON number or a numeric
/// string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AmountField {
    Number(f64),
    Text(String),
}

impl AmountField {
    /// `None` for non-numeric text. Empty text counts as absent.
    pub fn value(&self) -> Option<f64> {
        match self {
            AmountField::Number(n) => Some(*n),
            AmountField::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, AmountField::Text(s) if s.trim().is_empty())
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub id_token: Option<String>,
    pub booking_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub razorpay_order_id: Option<String>,
    pub razorpay_signature: Option<String>,
    pub amount: Option<AmountField>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentResponse {
    pub success: bool,
    pub payment_id: String,
    pub message: String,
}

/// Trimmed, non-empty value of an optional text field.
pub fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
