mod handlers;

use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio::sync::watch;

// Import from the main crate
use deferq::clock::SystemClock;
use deferq::config::Config;
use deferq::queue::{ConnectionRegistry, HandlerRegistry};
use deferq::services::{Worker, WorkerConfig};

use handlers::LogMessageHandler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting deferq worker...");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;

    // Handlers this worker knows how to run
    let handlers = Arc::new(HandlerRegistry::new().register(LogMessageHandler));

    // Resolve the queue connection
    tracing::info!(connection = %config.default_connection, "Connecting to queue...");
    let registry = ConnectionRegistry::from_config(&config, handlers.clone(), Arc::new(SystemClock))
        .await
        .context("Failed to build queue connections")?;
    let queue = registry
        .default_queue()
        .context("Failed to resolve default queue")?;
    tracing::info!("Queue connection established");

    // Set up graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Spawn shutdown signal handler
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, stopping worker...");
        let _ = shutdown_tx.send(true);
    });

    let worker = Worker::new(queue, handlers, WorkerConfig::from(&config));
    worker.run(shutdown_rx).await;

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
