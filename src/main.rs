use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crm_backend_core::{app_config, build_router, initialize_app_state};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = app_config::config()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.server.rust_log.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting CRM backend ({}) on {}",
        config.server.environment,
        config.server.bind_address
    );

    let state = initialize_app_state(config).await?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.server.bind_address.as_str())
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_address))?;

    info!("Listening on {}", config.server.bind_address);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
    }
    info!("Shutdown signal received");
}
