use std::sync::Arc;

use anyhow::Context;

use asyncalc_api::app::{build_app, services};
use asyncalc_infra::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    asyncalc_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let services = Arc::new(services::build_services(&config)?);
    let app = build_app(Arc::clone(&services));

    let listener = tokio::net::TcpListener::bind(config.http.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.http.addr))?;

    tracing::info!(mode = ?services.mode(), "listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Embedded workers finish their current job before the process exits.
    tokio::task::spawn_blocking(move || services.shutdown()).await?;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
