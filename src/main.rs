use anyhow::{Context, Result};
use lightstrip::api::{create_router, ApiState};
use lightstrip::config::LightConfig;
use lightstrip::render::MemorySink;
use lightstrip::storage::LightStore;
use lightstrip::LightController;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lightstrip=info".into()),
        )
        .init();

    info!("Lightstrip starting...");

    let config = LightConfig::load()?;
    info!(
        bind_addr = %config.server.bind_addr,
        led_count = config.strip.led_count,
        database = %config.storage.database_path,
        "Configuration loaded"
    );

    let store = Arc::new(LightStore::open(&config.storage.database_path)?);

    // No physical driver is bundled; the virtual strip stands in for one
    let sink = MemorySink::new(config.strip.led_count);
    let controller = Arc::new(
        LightController::new(store, Box::new(sink)).context("Failed to load light controller")?,
    );

    if let Err(e) = controller.restore_strip() {
        warn!(error = %e, "Could not restore strip from stored pixel buffer");
    }

    let app = create_router(ApiState::new(
        controller,
        config.server.request_timeout(),
    ));

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;
    info!(addr = %config.server.bind_addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Lightstrip stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
