//! Application startup and lifecycle management.

use crate::config::EscrowConfig;
use crate::handlers;
use crate::services::{
    EmailProvider, IdTokenVerifier, MockEmailProvider, MongoPaymentStore, PaymentStore,
    RazorpayClient, SmtpProvider,
};
use axum::{
    body::Body,
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use mongodb::{options::ClientOptions, Client};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    tracing::{make_request_span, request_id_middleware},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PaymentStore>,
    pub razorpay: RazorpayClient,
    pub identity: Arc<IdTokenVerifier>,
    pub email: Arc<dyn EmailProvider>,
}

/// Build the HTTP router over the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics))
        .route("/payment/webhook", post(handlers::webhook::payment_webhook))
        .route("/createOrder", post(handlers::orders::create_order))
        .route("/releasePayout", post(handlers::payouts::release_payout))
        .route(
            "/api/bookings/mark-parked",
            post(handlers::bookings::mark_parked),
        )
        .route(
            "/api/payments/create",
            post(handlers::payments::create_payment),
        )
        // Route layer so `MatchedPath` is available for the path label.
        .route_layer(from_fn(metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span::<Body>))
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    http_port: u16,
    http_listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Connect to MongoDB and the external providers, then bind the listener.
    pub async fn build(config: EscrowConfig) -> Result<Self, AppError> {
        let mut client_options = ClientOptions::parse(config.mongodb.uri.expose_secret())
            .await
            .map_err(|e| {
                tracing::error!("Failed to parse MongoDB connection string: {}", e);
                AppError::DatabaseError(e.into())
            })?;
        client_options.app_name = Some("escrow-service".to_string());

        let client = Client::with_options(client_options).map_err(|e| {
            tracing::error!("Failed to create MongoDB client: {}", e);
            AppError::DatabaseError(e.into())
        })?;
        let db = client.database(&config.mongodb.database);

        let store = MongoPaymentStore::new(client, db);
        store.init_indexes().await.map_err(|e| {
            tracing::error!("Failed to initialize database indexes: {}", e);
            AppError::DatabaseError(e)
        })?;

        let razorpay = RazorpayClient::new(config.razorpay.clone()).map_err(|e| {
            tracing::error!("Failed to initialize Razorpay client: {}", e);
            AppError::ConfigError(e)
        })?;
        if razorpay.is_configured() {
            tracing::info!(
                payouts_enabled = razorpay.payouts_enabled(),
                "Razorpay client initialized"
            );
        } else {
            tracing::warn!(
                "Razorpay credentials not configured - orders, payouts and webhooks will fail"
            );
        }

        let identity = IdTokenVerifier::from_config(&config.auth).map_err(|e| {
            tracing::error!("Failed to initialize ID token verifier: {}", e);
            AppError::ConfigError(e)
        })?;

        let email: Arc<dyn EmailProvider> = if config.smtp.enabled {
            let provider = SmtpProvider::new(config.smtp.clone()).map_err(|e| {
                tracing::error!("Failed to initialize SMTP provider: {}", e);
                AppError::ConfigError(e.into())
            })?;
            Arc::new(provider)
        } else {
            tracing::warn!("SMTP disabled - emails will only be logged");
            Arc::new(MockEmailProvider::new(true))
        };

        let port = config.common.port;
        let state = AppState {
            store: Arc::new(store),
            razorpay,
            identity: Arc::new(identity),
            email,
        };

        Self::with_state(port, state).await
    }

    /// Bind the listener for an already assembled state (port 0 picks a
    /// random port).
    pub async fn with_state(port: u16, state: AppState) -> Result<Self, AppError> {
        let http_addr = SocketAddr::from(([0, 0, 0, 0], port));
        let http_listener = TcpListener::bind(http_addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", http_addr, e);
            AppError::from(e)
        })?;
        let http_port = http_listener.local_addr()?.port();

        tracing::info!("Escrow service: HTTP on port {}", http_port);

        Ok(Self {
            http_port,
            http_listener,
            state,
        })
    }

    /// Get the HTTP port the server is listening on.
    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    /// Serve until Ctrl-C or SIGTERM.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let app = router(self.state);

        axum::serve(self.http_listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl-C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
