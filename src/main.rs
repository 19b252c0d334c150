use std::sync::Arc;

use clap::Parser;
use kafka_status::config::Config;
use kafka_status::server::{create_metrics, run_server, shutdown_channel, wait_for_signal, AppState};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    info!(port = config.port, "parameter port");
    info!(brokers = %config.kafka_brokers, "parameter kafka-brokers");
    info!(
        timeout_secs = config.kafka_timeout_secs,
        "parameter kafka-timeout"
    );

    // Validate before binding anything; bad config is fatal.
    if let Err(err) = config.validate() {
        error!(error = %err, "invalid configuration");
        return Err(err.into());
    }
    let port = config.port as u16;

    let metrics = create_metrics()?;
    info!("prometheus metrics registry initialized");

    let state = AppState {
        config: Arc::new(config),
        metrics,
    };

    // SIGTERM/SIGINT trigger graceful HTTP shutdown.
    let (shutdown_controller, shutdown_signal) = shutdown_channel();
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(name) => info!(signal = name, "initiating graceful shutdown"),
            Err(err) => warn!(error = %err, "signal handler failed, shutting down"),
        }
        shutdown_controller.shutdown();
    });

    info!("status reporter started");
    run_server(port, state, shutdown_signal).await?;
    info!("status reporter shut down gracefully");
    Ok(())
}
