use escrow_service::{config::EscrowConfig, services::init_metrics, Application};
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = EscrowConfig::load()?;

    init_tracing(
        "escrow-service",
        &config.common.log_level,
        config.otlp_endpoint.as_deref(),
    );
    init_metrics()?;

    let application = Application::build(config).await?;
    application.run_until_stopped().await?;

    Ok(())
}
