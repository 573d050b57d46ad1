//! Holdgate: run producers, a consumer and a hold/release controller
//! against one notification relay.
//!
//! # Usage
//!
//! ```bash
//! holdgate --producers 4 --hold-every-ms 1000 --hold-for-ms 300 --policy drop
//! ```
//!
//! Environment variables can also be used:
//! - `HOLDGATE_PRODUCERS`: Number of producer tasks
//! - `HOLDGATE_POLICY`: `drop` or `queue`
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

use holdgate::config::Config;
use holdgate::observability::metrics::init_metrics_with_endpoint;
use holdgate::observability::tracing::init_tracing;
use holdgate::runner::run_relay;
use tokio::sync::watch;

/// Print startup banner with version and configuration.
fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");
    let controller = match config.hold_cycle() {
        Some((every, held_for)) => format!("hold {held_for:?} every {every:?}"),
        None => "disabled".to_string(),
    };
    eprintln!(
        r#"
  Holdgate v{} - Hold-Gated Notification Relay

  Configuration:
    Producers:   {} (every {:?})
    Controller:  {}
    Consumer:    poll every {:?}
    Policy:      {:?}
    Log Level:   {}

  Press Ctrl+C to shutdown gracefully.
"#,
        version,
        config.producers,
        config.produce_interval(),
        controller,
        config.poll_interval(),
        config.policy,
        config.log_level
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration from CLI arguments and environment
    let config = Config::parse_args();

    init_tracing(&config.log_level);
    init_metrics_with_endpoint(config.otel_endpoint.as_deref());

    print_banner(&config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Spawn signal handler task
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {
                            tracing::info!("Received SIGINT (Ctrl+C), initiating shutdown...");
                        }
                        _ = sigterm.recv() => {
                            tracing::info!("Received SIGTERM, initiating shutdown...");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                    let _ = ctrl_c.await;
                    tracing::info!("Received SIGINT (Ctrl+C), initiating shutdown...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            tracing::info!("Received Ctrl+C, initiating shutdown...");
        }

        let _ = shutdown_tx_clone.send(true);
    });

    let summary = run_relay(config, shutdown_rx).await?;

    println!(
        "submitted={} accepted={} rejected={} cancelled={} delivered={} batches={}",
        summary.submitted,
        summary.accepted,
        summary.rejected,
        summary.cancelled,
        summary.delivered,
        summary.batches
    );
    tracing::info!("Holdgate shutdown complete");
    Ok(())
}
