use anyhow::Context as _;
use std::path::PathBuf;
use streamvault::{build_context, config::AppConfig, logging, routes};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("STREAMVAULT_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("streamvault.toml"));

    let config = AppConfig::load(Some(&config_path))
        .with_context(|| format!("loading {}", config_path.display()))?;
    let _log_guard = logging::init(&config.logging)?;

    let address = config.server.bind_address();
    let ctx = build_context(config).await?;

    let app = routes::router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(ctx);

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!("Listening on http://{address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => {
            tracing::error!("Ctrl-C handler unavailable: {e}");
            std::future::pending::<()>().await;
        }
    }
}
