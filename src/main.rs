use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, router};
use exames_core::{Clock, CoreConfig, NotificationService};

/// Main entry point for the Exames application
///
/// Runs two tasks concurrently:
/// - the REST server on port 3000 (configurable via EXAMES_REST_ADDR)
/// - the expiry notifier, which alerts every tenant once per notification interval
///
/// # Environment Variables
/// - `EXAMES_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `EXAMES_SNAPSHOT`: Record snapshot file (default: "data/exames.yaml")
/// - `EXAMES_OUTBOX_DIR`: Directory alerts are written to (default: "outbox")
/// - `EXAMES_UTC_OFFSET`: Reference offset for "today" (default: "-03:00")
/// - `EXAMES_NOTIFY_INTERVAL_SECS`: Seconds between notification runs (default: 86400)
/// - `EXAMES_SENDER`: Sender address of alerts
///
/// # Returns
/// * `Ok(())` - If the REST server shuts down cleanly
/// * `Err(anyhow::Error)` - If startup or either task fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("exames_run=info".parse()?)
                .add_directive("exames_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("EXAMES_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let cfg = Arc::new(CoreConfig::from_values(
        std::env::var("EXAMES_SNAPSHOT").ok(),
        std::env::var("EXAMES_OUTBOX_DIR").ok(),
        std::env::var("EXAMES_UTC_OFFSET").ok(),
        std::env::var("EXAMES_NOTIFY_INTERVAL_SECS").ok(),
        std::env::var("EXAMES_SENDER").ok(),
    )?);

    tracing::info!("++ Starting Exames REST on {}", rest_addr);
    tracing::info!(
        "++ Expiry notifier every {}s, outbox {}",
        cfg.notify_interval().as_secs(),
        cfg.outbox_dir().display()
    );

    let state = AppState::from_config(&cfg)?;
    let notifier = state.notifier.clone();
    let clock = state.clock.clone();

    let rest_server = tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
        axum::serve(listener, router(state)).await?;
        anyhow::Ok(())
    });

    let notifier_task = tokio::spawn(run_notifier(notifier, clock, cfg));

    supervise(rest_server, notifier_task).await
}

/// Waits for whichever task ends first.
///
/// A REST failure (e.g. the address is already in use) ends the process with its error.
/// The notifier never returns on its own, so its exit is an error too.
async fn supervise(
    rest_server: JoinHandle<anyhow::Result<()>>,
    notifier_task: JoinHandle<()>,
) -> anyhow::Result<()> {
    tokio::select! {
        rest_result = rest_server => rest_result?,
        notifier_result = notifier_task => {
            notifier_result?;
            anyhow::bail!("expiry notifier stopped unexpectedly")
        }
    }
}

/// Runs the notifier once per configured interval, starting one interval after startup.
async fn run_notifier(notifier: NotificationService, clock: Arc<dyn Clock>, cfg: Arc<CoreConfig>) {
    let period = cfg.notify_interval();
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let today = clock.today();
        let notifier = notifier.clone();

        match tokio::task::spawn_blocking(move || notifier.run(today)).await {
            Ok(Ok(report)) => tracing::info!(
                "Notification run for {} done: {} sent, {} failed",
                report.generated_on,
                report.sent(),
                report.failed()
            ),
            Ok(Err(e)) => tracing::error!("Notification run error: {:?}", e),
            Err(e) => tracing::error!("Notification task failed: {:?}", e),
        }
    }
}
