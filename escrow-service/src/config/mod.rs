use secrecy::Secret;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct EscrowConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub mongodb: MongoConfig,
    pub razorpay: RazorpayConfig,
    pub auth: AuthConfig,
    pub smtp: SmtpConfig,
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: Secret<String>,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: Secret<String>,
    pub api_base_url: String,
    /// Gate for the RazorpayX payout call; when off, check-in payouts are
    /// queued for manual release.
    pub payouts_enabled: bool,
    /// RazorpayX business account debited for payouts. When unset the
    /// provider's own account number is sent, as older clients expect.
    pub payout_account_number: Option<String>,
    pub timeout_secs: u64,
}

/// Bearer identity token verification. Exactly one of `public_key_path`
/// (RS256) or `jwt_secret` (HS256) must be set.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub public_key_path: Option<String>,
    pub jwt_secret: Option<Secret<String>>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Secret<String>,
    pub from_email: String,
    pub from_name: String,
    pub enabled: bool,
}

impl EscrowConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        Ok(EscrowConfig {
            common: common_config,
            mongodb: MongoConfig {
                uri: Secret::new(get_env(
                    "MONGODB_URI",
                    Some("mongodb://localhost:27017"),
                    is_prod,
                )?),
                database: get_env("MONGODB_DATABASE", Some("escrow_db"), is_prod)?,
            },
            razorpay: RazorpayConfig {
                key_id: get_env("RAZORPAY_KEY", Some(""), is_prod)?,
                key_secret: Secret::new(get_env("RAZORPAY_SECRET", Some(""), is_prod)?),
                api_base_url: get_env(
                    "RAZORPAY_API_BASE_URL",
                    Some("https://api.razorpay.com/v1"),
                    is_prod,
                )?,
                payouts_enabled: parse_flag(env::var("RAZORPAY_PAYOUTS_ENABLED").ok().as_deref()),
                payout_account_number: env::var("RAZORPAY_PAYOUT_ACCOUNT_NUMBER").ok(),
                timeout_secs: env::var("RAZORPAY_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            },
            auth: AuthConfig {
                public_key_path: env::var("AUTH_JWT_PUBLIC_KEY_PATH").ok(),
                jwt_secret: env::var("AUTH_JWT_SECRET").ok().map(Secret::new),
                issuer: env::var("AUTH_JWT_ISSUER").ok(),
                audience: env::var("AUTH_JWT_AUDIENCE").ok(),
            },
            smtp: SmtpConfig {
                host: get_env("SMTP_HOST", Some("smtp.gmail.com"), is_prod)?,
                port: get_env("SMTP_PORT", Some("587"), is_prod)?
                    .parse()
                    .unwrap_or(587),
                user: get_env("SMTP_USER", Some(""), is_prod)?,
                password: Secret::new(get_env("SMTP_PASSWORD", Some(""), is_prod)?),
                from_email: get_env("SMTP_FROM_EMAIL", Some("noreply@example.com"), is_prod)?,
                from_name: get_env("SMTP_FROM_NAME", Some("ParkEasy Payments"), is_prod)?,
                enabled: parse_flag(env::var("SMTP_ENABLED").ok().as_deref()),
            },
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
        })
    }
}

/// Accepts `1`, `true`, `yes` and `on` (any case) as enabled.
pub fn parse_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}
