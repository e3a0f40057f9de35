use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payment document: either a captured checkout (created by the client after
/// Razorpay checkout) or a payout-tracking record created at check-in.
///
/// Client-written documents may omit the timestamps; reads fill them in
/// while writes only ever `$set` individual fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    #[serde(rename = "_id")]
    pub id: String,
    pub booking_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub amount: f64,
    pub status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commission: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payout_response: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default = "DateTime::now")]
    pub created_at: DateTime,
    #[serde(default = "DateTime::now")]
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Created,
    Success,
    Released,
    PayoutPending,
    PayoutFailed,
    ManualReleaseRequired,
    NoPayoutDetails,
    /// Any status written by client flows that this service does not act on.
    #[serde(other)]
    Other,
}

/// Gateway identifiers captured from a completed Razorpay checkout.
#[derive(Debug, Clone)]
pub struct CheckoutCapture {
    pub payment_id: String,
    pub order_id: String,
    pub signature: Option<String>,
}

impl Payment {
    fn blank(booking_id: &str, amount: f64, status: PaymentStatus) -> Self {
        let now = DateTime::now();
        Self {
            id: Uuid::new_v4().to_string(),
            booking_id: booking_id.to_string(),
            user_id: None,
            provider_id: None,
            amount,
            status,
            method: None,
            order_id: None,
            payment_id: None,
            signature: None,
            commission: None,
            payout_response: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record of a checkout the booking's user completed on the client.
    pub fn checkout(
        booking_id: &str,
        user_id: &str,
        provider_id: Option<String>,
        amount: f64,
        capture: CheckoutCapture,
    ) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
            provider_id,
            method: Some("razorpay".to_string()),
            order_id: Some(capture.order_id),
            payment_id: Some(capture.payment_id),
            signature: capture.signature,
            ..Self::blank(booking_id, amount, PaymentStatus::Created)
        }
    }

    /// Record tracking the provider payout released at check-in.
    pub fn payout_tracking(booking_id: &str, provider_id: &str, amount: f64) -> Self {
        Self {
            provider_id: Some(provider_id.to_string()),
            ..Self::blank(booking_id, amount, PaymentStatus::PayoutPending)
        }
    }
}

/// Partial update applied to a payment document.
#[derive(Debug, Clone)]
pub struct PaymentUpdate {
    pub status: PaymentStatus,
    pub commission: Option<f64>,
    pub payout_response: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl PaymentUpdate {
    pub fn status(status: PaymentStatus) -> Self {
        Self {
            status,
            commission: None,
            payout_response: None,
            error: None,
        }
    }

    pub fn released_with_commission(commission: f64) -> Self {
        Self {
            commission: Some(commission),
            ..Self::status(PaymentStatus::Released)
        }
    }

    pub fn payout_released(response: serde_json::Value) -> Self {
        Self {
            payout_response: Some(response),
            ..Self::status(PaymentStatus::Released)
        }
    }

    pub fn payout_failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::status(PaymentStatus::PayoutFailed)
        }
    }

    /// Apply the update to an in-memory document.
    pub fn apply(&self, payment: &mut Payment) {
        payment.status = self.status;
        if let Some(commission) = self.commission {
            payment.commission = Some(commission);
        }
        if let Some(response) = &self.payout_response {
            payment.payout_response = Some(response.clone());
        }
        if let Some(error) = &self.error {
            payment.error = Some(error.clone());
        }
        payment.updated_at = DateTime::now();
    }
}
