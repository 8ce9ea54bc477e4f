//! lectionary-engines HTTP server binary.
//!
//! Serves the JSON API over the study generator and the SQLite store.
//!
//! # Environment Variables
//!
//! - `WEB_HOST` / `WEB_PORT`: Bind address (default: 0.0.0.0:8000)
//! - `DATABASE_URL`: SQLite location (default: `sqlite:///./lectionary.db`)
//! - `ENABLE_FILE_SYNC`: Also write each study as markdown (default: true)
//! - `ANTHROPIC_API_KEY`: Required for `/api/generate`
//! - `RUST_LOG`: Tracing filter (default: "info,lectionary_engines=debug")
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin lectionary-server
//! ```

use lectionary_engines::config::WebConfig;
use lectionary_engines::server::{app_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,lectionary_engines=debug".into()),
        )
        .init();

    let config = WebConfig::load();
    let bind_addr = config.bind_addr();
    if !config.base.validate_api_key() {
        tracing::warn!("ANTHROPIC_API_KEY is not set; generation requests will fail");
    }

    tracing::info!("Opening database at {}", config.database_path().display());
    let state = AppState::from_config(config)?;
    let app = app_router(state);

    tracing::info!("lectionary-engines server starting on {}", bind_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health        liveness probe");
    tracing::info!("  POST /api/generate  generate and store a study");
    tracing::info!("  GET  /api/studies   browse stored studies");
    tracing::info!("  *    /api/profiles  manage preference profiles");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
