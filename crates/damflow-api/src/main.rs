use damflow_api::{setup, telemetry};
use damflow_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    telemetry::init_telemetry(&config.base.log_format)?;
    tracing::info!(environment = %config.base.environment, "Configuration loaded");

    let (state, router) = setup::initialize_app(&config).await?;

    setup::server::start_server(&config, state, router).await?;

    Ok(())
}
