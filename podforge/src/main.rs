use podforge::config::AppConfig;
use podforge::services::ServiceContainer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    podforge::logging::init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    let container = ServiceContainer::new(config).await?;
    container.start_workers();

    tracing::info!("podforge initialized successfully");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    container.shutdown().await;

    Ok(())
}
