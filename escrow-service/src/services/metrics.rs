//! Prometheus metrics for escrow-service.
//!
//! HTTP request metrics come from the shared middleware; the counters below
//! track the escrow flows themselves.

use anyhow::{anyhow, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder. Fails if called twice.
pub fn init_metrics() -> Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow!("failed to install Prometheus recorder: {}", e))?;

    METRICS_HANDLE
        .set(handle)
        .map_err(|_| anyhow!("metrics handle already initialized"))?;

    metrics::describe_counter!(
        "escrow_webhooks_total",
        "Payment webhooks received by verification result"
    );
    metrics::describe_counter!(
        "escrow_payouts_total",
        "Check-in payout attempts by outcome"
    );
    metrics::describe_counter!(
        "escrow_payments_created_total",
        "Checkout payment records created"
    );
    metrics::describe_counter!(
        "escrow_releases_total",
        "Manual payout releases"
    );

    Ok(())
}

/// Get metrics output in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

pub fn record_webhook(result: &'static str) {
    metrics::counter!("escrow_webhooks_total", "result" => result).increment(1);
}

/// `outcome` is one of `released`, `failed`, `manual`, `no_details`,
/// `already_triggered`.
pub fn record_payout(outcome: &'static str) {
    metrics::counter!("escrow_payouts_total", "outcome" => outcome).increment(1);
}

pub fn record_payment_created() {
    metrics::counter!("escrow_payments_created_total").increment(1);
}

pub fn record_release() {
    metrics::counter!("escrow_releases_total").increment(1);
}
