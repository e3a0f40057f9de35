#![allow(dead_code)]

use chrono::{Duration, Utc};
use escrow_service::config::{
    AuthConfig, EscrowConfig, MongoConfig, RazorpayConfig, SmtpConfig,
};
use escrow_service::models::{Account, Booking, BookingStatus, Otp, PayoutDetails};
use escrow_service::services::identity::IdTokenClaims;
use escrow_service::services::{IdTokenVerifier, InMemoryPaymentStore, MockEmailProvider, RazorpayClient};
use escrow_service::startup::{AppState, Application};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use secrecy::Secret;
use service_core::utils::sign_hmac_sha256;
use std::sync::Arc;
use wiremock::MockServer;

pub const RAZORPAY_KEY_ID: &str = "rzp_test_key";
pub const RAZORPAY_SECRET: &str = "rzp_test_secret";
pub const JWT_SECRET: &str = "escrow-test-jwt-secret";
pub const PAYOUT_SOURCE_ACCOUNT: &str = "7878780080316316";

pub const USER_ID: &str = "user_1";
pub const PROVIDER_ID: &str = "prov_1";
pub const OTP: &str = "4821";

pub struct TestAppOptions {
    pub payouts_enabled: bool,
    pub email_enabled: bool,
    /// Empty gateway secret when false.
    pub razorpay_configured: bool,
}

impl Default for TestAppOptions {
    fn default() -> Self {
        Self {
            payouts_enabled: true,
            email_enabled: true,
            razorpay_configured: true,
        }
    }
}

pub struct TestApp {
    pub address: String,
    pub http_port: u16,
    pub store: Arc<InMemoryPaymentStore>,
    pub email: Arc<MockEmailProvider>,
    pub razorpay: MockServer,
    pub client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(TestAppOptions::default()).await
    }

    pub async fn spawn_with(options: TestAppOptions) -> Self {
        let razorpay = MockServer::start().await;
        let mut config = test_config(&razorpay.uri(), options.payouts_enabled);
        if !options.razorpay_configured {
            config.razorpay.key_secret = Secret::new(String::new());
        }

        let store = Arc::new(InMemoryPaymentStore::new());
        let email = Arc::new(MockEmailProvider::new(options.email_enabled));
        let identity =
            IdTokenVerifier::from_config(&config.auth).expect("Failed to build verifier");

        let state = AppState {
            razorpay: RazorpayClient::new(config.razorpay.clone())
                .expect("Failed to build Razorpay client"),
            store: store.clone(),
            identity: Arc::new(identity),
            email: email.clone(),
        };

        let app = Application::with_state(0, state)
            .await
            .expect("Failed to build test application");
        let http_port = app.http_port();

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        TestApp {
            address: format!("http://127.0.0.1:{}", http_port),
            http_port,
            store,
            email,
            razorpay,
            client: reqwest::Client::new(),
        }
    }

    pub async fn post_json(&self, path: &str, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn mark_parked(
        &self,
        token: Option<&str>,
        body: &serde_json::Value,
    ) -> reqwest::Response {
        let mut request = self
            .client
            .post(format!("{}/api/bookings/mark-parked", self.address))
            .json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to execute request")
    }

    pub async fn seed_booking(&self, booking: Booking) {
        self.store.put_booking(booking).await;
    }

    /// Provider with complete bank details, stored in both the `users` and
    /// `providers` collections.
    pub async fn seed_provider(&self, email: Option<&str>) {
        let account = Account {
            id: PROVIDER_ID.to_string(),
            email: email.map(str::to_string),
            name: Some("Asha Rao".to_string()),
            payout_details: Some(PayoutDetails {
                account: Some("1121431121541121".to_string()),
                ifsc: Some("HDFC0000053".to_string()),
                name: Some("Asha Rao".to_string()),
            }),
        };
        self.store.put_user(account.clone()).await;
        self.store.put_provider(account).await;
    }

    pub async fn booking(&self, id: &str) -> Booking {
        use escrow_service::services::PaymentStore;
        self.store
            .get_booking(id)
            .await
            .unwrap()
            .expect("booking should exist")
    }
}

pub fn booking(id: &str, status: BookingStatus) -> Booking {
    Booking {
        id: id.to_string(),
        user_id: Some(USER_ID.to_string()),
        provider_id: Some(PROVIDER_ID.to_string()),
        status: Some(status),
        payment_status: None,
        otp: Some(Otp::new(OTP)),
        payout_triggered: false,
        payout_triggered_at: None,
        payout_id: None,
        total_cost: 150.0,
        user_email: Some("user@example.com".to_string()),
    }
}

pub fn token_for(uid: &str) -> String {
    let now = Utc::now();
    let claims = IdTokenClaims {
        sub: uid.to_string(),
        email: None,
        exp: (now + Duration::hours(1)).timestamp(),
        iat: Some(now.timestamp()),
        iss: None,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("Failed to encode token")
}

pub fn checkout_signature(order_id: &str, payment_id: &str) -> String {
    sign_hmac_sha256(RAZORPAY_SECRET, &format!("{}|{}", order_id, payment_id))
        .expect("Failed to sign")
}

fn test_config(razorpay_base_url: &str, payouts_enabled: bool) -> EscrowConfig {
    EscrowConfig {
        common: service_core::config::Config::default(),
        mongodb: MongoConfig {
            uri: Secret::new("mongodb://localhost:27017".to_string()),
            database: "escrow_test".to_string(),
        },
        razorpay: RazorpayConfig {
            key_id: RAZORPAY_KEY_ID.to_string(),
            key_secret: Secret::new(RAZORPAY_SECRET.to_string()),
            api_base_url: razorpay_base_url.to_string(),
            payouts_enabled,
            payout_account_number: Some(PAYOUT_SOURCE_ACCOUNT.to_string()),
            timeout_secs: 5,
        },
        auth: AuthConfig {
            public_key_path: None,
            jwt_secret: Some(Secret::new(JWT_SECRET.to_string())),
            issuer: None,
            audience: None,
        },
        smtp: SmtpConfig {
            host: "localhost".to_string(),
            port: 2525,
            user: String::new(),
            password: Secret::new(String::new()),
            from_email: "noreply@example.com".to_string(),
            from_name: "Escrow Test".to_string(),
            enabled: false,
        },
        otlp_endpoint: None,
    }
}
