//! # Subnet Bridge
//!
//! Entry point: loads configuration, wires the bridge, runs the validator
//! loop and serves the relay until Ctrl-C or SIGTERM.

use anyhow::{Context, Result};
use bridge_runtime::{api, BridgeConfig, BridgeContainer};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = BridgeConfig::from_env().context("Failed to load configuration")?;

    // Initialize logging
    let telemetry = config.telemetry_config();
    bridge_telemetry::init_logging(&telemetry).context("Failed to initialize logging")?;
    bridge_telemetry::register_build_info(&telemetry.service_name);

    config.validate().context("Invalid configuration")?;
    for warning in config.warnings() {
        warn!("{}", warning);
    }

    info!("===========================================");
    info!("  Subnet Bridge v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");

    let container = BridgeContainer::build(&config).context("Failed to wire bridge components")?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Operator events
    let mut events = container.committer.subscribe();
    let mut events_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => error!(error = %event.to_error(), "[commit] Operator attention required"),
                    Err(RecvError::Lagged(missed)) => warn!(missed, "[commit] Operator events dropped"),
                    Err(RecvError::Closed) => break,
                },
                _ = events_shutdown.changed() => break,
            }
        }
    });

    // Validator loop
    let validator = container.validator.clone();
    let loop_shutdown = shutdown_rx.clone();
    let loop_handle = tokio::spawn(async move { validator.run(loop_shutdown).await });

    // Relay surface
    let addr = config.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, "Relay listening");

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown signal received");
        if let Err(e) = signal_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
    });

    let mut server_shutdown = shutdown_rx.clone();
    axum::serve(listener, api::router(container.app_state()))
        .with_graceful_shutdown(async move {
            let _ = server_shutdown.wait_for(|stop| *stop).await;
        })
        .await
        .context("Relay server failed")?;

    // Stop the loop even if the server exited on its own
    let _ = shutdown_tx.send(true);
    if let Err(e) = loop_handle.await {
        error!("Validator loop task failed: {}", e);
    }

    info!("Shutdown complete");
    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
