//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own.
//!
//! ## Intended use
//! Useful for development and debugging when you only want the REST server (with
//! OpenAPI/Swagger UI). The workspace's main `exames-run` binary also runs the periodic
//! expiry notifier.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{router, AppState};
use exames_core::CoreConfig;

/// Main entry point for the Exames REST API server
///
/// # Environment Variables
/// - `EXAMES_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `EXAMES_SNAPSHOT`: Record snapshot file (default: "data/exames.yaml")
/// - `EXAMES_OUTBOX_DIR`: Directory alerts are written to (default: "outbox")
/// - `EXAMES_UTC_OFFSET`: Reference offset for "today" (default: "-03:00")
/// - `EXAMES_SENDER`: Sender address of alerts
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration is invalid or the snapshot cannot be loaded,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("exames_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("EXAMES_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    tracing::info!("-- Starting Exames REST API on {}", addr);

    let cfg = CoreConfig::from_values(
        std::env::var("EXAMES_SNAPSHOT").ok(),
        std::env::var("EXAMES_OUTBOX_DIR").ok(),
        std::env::var("EXAMES_UTC_OFFSET").ok(),
        std::env::var("EXAMES_NOTIFY_INTERVAL_SECS").ok(),
        std::env::var("EXAMES_SENDER").ok(),
    )?;
    let state = AppState::from_config(&cfg)?;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}
