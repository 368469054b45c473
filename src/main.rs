//! Bridge Relayer
//!
//! Polls the source chain for bridge transfers and submits the matching
//! release on the destination chain. Runs in simulation mode (sign, log,
//! never broadcast) unless `SIMULATION_MODE=false`.

use std::sync::Arc;

use bridge_relayer::config::Config;
use bridge_relayer::server::{self, Metrics, RelayStats};
use bridge_relayer::startup;
use tokio::sync::RwLock;
use tracing::{error, info};

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> eyre::Result<()> {
    init_logging();

    info!("Starting bridge relayer");

    let config = Config::load()?;
    info!(
        simulation_mode = config.relayer.simulation_mode,
        start_block = ?config.source.start_block,
        poll_interval_secs = config.relayer.poll_interval_secs,
        max_scan_range = config.source.max_scan_range,
        durable_state = config.database.is_some(),
        "Configuration loaded"
    );

    let stats = Arc::new(RwLock::new(RelayStats::default()));
    let metrics = Arc::new(Metrics::new());

    let relay = startup::build_relayer(&config, stats.clone(), metrics.clone()).await?;

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);

    // Handle signals
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        let _ = shutdown_tx.send(()).await;
    });

    // Start health/metrics server
    let bind_address = config.api.bind_address.clone();
    tokio::spawn(async move {
        if let Err(e) = server::start_server(&bind_address, stats, metrics).await {
            error!(error = %e, "API server error");
        }
    });

    relay.run(shutdown_rx).await?;

    info!("Bridge relayer stopped");
    Ok(())
}

/// Initialize tracing/logging with structured output.
/// `LOG_FORMAT=json` switches to one JSON object per line.
fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bridge_relayer=debug"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_target(true).with_thread_ids(true))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .with(filter)
            .init();
    }
}

/// Wait for shutdown signals (SIGINT/SIGTERM)
async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
