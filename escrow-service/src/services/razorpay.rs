//! Razorpay gateway client.
//!
//! Covers the Orders API used at checkout, the checkout signature check used
//! by the webhook, and the RazorpayX Payouts API used at check-in.

use crate::config::RazorpayConfig;
use crate::models::BankAccount;
use anyhow::{anyhow, Context, Result};
use reqwest::{Client, Response};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use service_core::utils::verify_hmac_sha256;
use std::time::Duration;

/// Razorpay client for interacting with the Razorpay API.
#[derive(Clone)]
pub struct RazorpayClient {
    client: Client,
    config: RazorpayConfig,
}

/// Request to create a Razorpay order.
#[derive(Debug, Serialize)]
pub struct CreateOrderRequest {
    /// Amount in smallest currency unit (paise for INR).
    pub amount: u64,
    pub currency: String,
    /// Always 1: payments are captured automatically and held until payout.
    pub payment_capture: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<serde_json::Value>,
}

/// Response from Razorpay order creation.
#[derive(Debug, Deserialize)]
pub struct RazorpayOrder {
    pub id: String,
    #[serde(default)]
    pub entity: String,
    pub amount: u64,
    #[serde(default)]
    pub amount_paid: u64,
    #[serde(default)]
    pub amount_due: u64,
    pub currency: String,
    pub receipt: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub attempts: u32,
    pub notes: Option<serde_json::Value>,
    #[serde(default)]
    pub created_at: u64,
}

/// Razorpay API error response.
#[derive(Debug, Deserialize)]
pub struct RazorpayError {
    pub error: RazorpayErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct RazorpayErrorDetail {
    pub code: String,
    pub description: String,
    pub source: Option<String>,
    pub step: Option<String>,
    pub reason: Option<String>,
}

/// Payment verification parameters.
#[derive(Debug)]
pub struct PaymentVerification {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

/// RazorpayX payout with an inline fund account.
#[derive(Debug, Serialize)]
pub struct PayoutRequest {
    /// Business account debited for the payout.
    pub account_number: String,
    pub fund_account: FundAccount,
    /// Amount in paise.
    pub amount: u64,
    pub currency: String,
    pub mode: String,
    pub purpose: String,
    pub queue_if_low_balance: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narration: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FundAccount {
    pub account_type: String,
    pub bank_account: FundBankAccount,
    pub contact: PayoutContact,
}

#[derive(Debug, Serialize)]
pub struct FundBankAccount {
    pub name: String,
    pub ifsc: String,
    pub account_number: String,
}

#[derive(Debug, Serialize)]
pub struct PayoutContact {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "type")]
    pub contact_type: String,
    pub reference_id: String,
}

impl PayoutRequest {
    /// IMPS payout of `amount_paise` to the provider's bank account.
    pub fn imps(
        source_account: Option<&str>,
        bank: &BankAccount,
        provider_id: &str,
        provider_email: Option<&str>,
        amount_paise: u64,
        booking_id: &str,
    ) -> Self {
        Self {
            account_number: source_account
                .map(str::to_string)
                .unwrap_or_else(|| bank.account_number.clone()),
            fund_account: FundAccount {
                account_type: "bank_account".to_string(),
                bank_account: FundBankAccount {
                    name: bank.holder_name.clone(),
                    ifsc: bank.ifsc.clone(),
                    account_number: bank.account_number.clone(),
                },
                contact: PayoutContact {
                    name: bank.holder_name.clone(),
                    email: provider_email.map(str::to_string),
                    contact_type: "vendor".to_string(),
                    reference_id: provider_id.to_string(),
                },
            },
            amount: amount_paise,
            currency: "INR".to_string(),
            mode: "IMPS".to_string(),
            purpose: "payout".to_string(),
            queue_if_low_balance: true,
            reference_id: Some(booking_id.to_string()),
            narration: Some("Parking payout".to_string()),
        }
    }
}

/// Convert a rupee amount to paise, rounding to the nearest paisa.
/// Negative and non-finite amounts become zero.
pub fn to_paise(amount: f64) -> u64 {
    if !amount.is_finite() || amount <= 0.0 {
        return 0;
    }
    (amount * 100.0).round() as u64
}

impl RazorpayClient {
    pub fn new(config: RazorpayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build Razorpay HTTP client")?;

        Ok(Self { client, config })
    }

    /// Check if Razorpay is configured (credentials are set).
    pub fn is_configured(&self) -> bool {
        !self.config.key_id.is_empty() && !self.config.key_secret.expose_secret().is_empty()
    }

    pub fn payouts_enabled(&self) -> bool {
        self.config.payouts_enabled
    }

    pub fn payout_account_number(&self) -> Option<&str> {
        self.config.payout_account_number.as_deref()
    }

    /// Create a new order in Razorpay.
    ///
    /// # Arguments
    /// * `amount` - Amount in smallest currency unit (paise for INR)
    /// * `currency` - Currency code (e.g., "INR")
    /// * `receipt` - Optional receipt ID for tracking
    /// * `notes` - Optional notes
    pub async fn create_order(
        &self,
        amount: u64,
        currency: &str,
        receipt: Option<String>,
        notes: Option<serde_json::Value>,
    ) -> Result<RazorpayOrder> {
        if !self.is_configured() {
            return Err(anyhow!("Razorpay credentials not configured"));
        }

        let request = CreateOrderRequest {
            amount,
            currency: currency.to_string(),
            payment_capture: 1,
            receipt,
            notes,
        };

        let url = format!("{}/orders", self.config.api_base_url);

        let response = self
            .client
            .post(&url)
            .basic_auth(
                &self.config.key_id,
                Some(self.config.key_secret.expose_secret()),
            )
            .json(&request)
            .send()
            .await?;

        let body = Self::success_body(response, "order creation").await?;
        let order: RazorpayOrder = serde_json::from_str(&body)?;
        tracing::info!(
            order_id = %order.id,
            amount = order.amount,
            currency = %order.currency,
            "Razorpay order created"
        );
        Ok(order)
    }

    /// Create a RazorpayX payout. Razorpay deduplicates on `idempotency_key`,
    /// so retries with the same key never pay twice.
    ///
    /// Returns the raw payout entity, which is stored on the payment record.
    pub async fn create_payout(
        &self,
        request: &PayoutRequest,
        idempotency_key: &str,
    ) -> Result<serde_json::Value> {
        if !self.is_configured() {
            return Err(anyhow!("Razorpay credentials not configured"));
        }

        let url = format!("{}/payouts", self.config.api_base_url);

        let response = self
            .client
            .post(&url)
            .basic_auth(
                &self.config.key_id,
                Some(self.config.key_secret.expose_secret()),
            )
            .header("X-Payout-Idempotency", idempotency_key)
            .json(request)
            .send()
            .await?;

        let body = Self::success_body(response, "payout creation").await?;
        let payout: serde_json::Value = serde_json::from_str(&body)?;
        tracing::info!(
            payout_id = payout.get("id").and_then(|v| v.as_str()).unwrap_or("-"),
            status = payout.get("status").and_then(|v| v.as_str()).unwrap_or("-"),
            amount = request.amount,
            "Razorpay payout created"
        );
        Ok(payout)
    }

    /// Verify payment signature from Razorpay checkout.
    ///
    /// The signature is computed as:
    /// `HMAC-SHA256(order_id + "|" + payment_id, key_secret)`
    ///
    /// Fails when no key secret is configured, since an empty key would
    /// accept signatures anyone can compute.
    pub fn verify_payment_signature(&self, verification: &PaymentVerification) -> Result<bool> {
        if !self.is_configured() {
            return Err(anyhow!("Razorpay credentials not configured"));
        }

        let payload = format!(
            "{}|{}",
            verification.razorpay_order_id, verification.razorpay_payment_id
        );

        let is_valid = verify_hmac_sha256(
            self.config.key_secret.expose_secret(),
            &payload,
            &verification.razorpay_signature,
        )?;

        if is_valid {
            tracing::info!(
                order_id = %verification.razorpay_order_id,
                payment_id = %verification.razorpay_payment_id,
                "Payment signature verified successfully"
            );
        } else {
            tracing::warn!(
                order_id = %verification.razorpay_order_id,
                payment_id = %verification.razorpay_payment_id,
                "Payment signature verification failed"
            );
        }

        Ok(is_valid)
    }

    /// Read the body of a Razorpay response, turning non-2xx statuses into
    /// an error built from Razorpay's error envelope.
    async fn success_body(response: Response, operation: &str) -> Result<String> {
        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(status = %status, body = %body, "Razorpay {} response", operation);

        if status.is_success() {
            return Ok(body);
        }

        let error: RazorpayError = serde_json::from_str(&body).unwrap_or_else(|_| RazorpayError {
            error: RazorpayErrorDetail {
                code: "UNKNOWN".to_string(),
                description: body.clone(),
                source: None,
                step: None,
                reason: None,
            },
        });
        tracing::error!(
            code = %error.error.code,
            description = %error.error.description,
            reason = ?error.error.reason,
            "Razorpay {} failed",
            operation
        );
        Err(anyhow!(
            "Razorpay error: {} - {}",
            error.error.code,
            error.error.description
        ))
    }
}
