mod bootstrap;
mod config;
mod error;
mod monitor;
mod pages;
mod reconcile;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::MonitorConfig;

const DEFAULT_LOG_FILTER: &str = "info,reconcile_monitor=debug,sqlx=warn";

// Initialize logging and tracing
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        _ = ctrl_c => info!("🛑 SIGINT received"),
        _ = terminate => info!("🛑 SIGTERM received"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    info!("🚀 Starting page reconciliation monitor");

    let config = MonitorConfig::from_env().context("failed to load monitor configuration")?;
    let run_once = config.run_once;

    let monitor = match bootstrap::initialize(config).await {
        Ok(monitor) => monitor,
        Err(e) => {
            error!("❌ Monitor initialization failed: {}", e);
            return Err(e).context("monitor initialization failed");
        }
    };

    if run_once {
        let report = monitor.run_cycle().await;
        monitor.close().await;
        if !report.is_clean() {
            warn!(
                "⚠️ Single reconciliation cycle {} found problems in {} tenants (alert raised: {})",
                report.cycle_id,
                report.failed_tenants.len(),
                report.alert_raised
            );
            std::process::exit(1);
        }
        info!("✓ Single reconciliation cycle {} clean", report.cycle_id);
        return Ok(());
    }

    monitor.start();

    shutdown_signal().await;

    if !monitor.is_running() {
        warn!("⚠️ Reconciliation loop had already exited before shutdown");
    }
    info!("Shutting down reconciliation monitor ...");
    monitor.close().await;
    info!(
        "👋 Monitor stopped cleanly ({} consecutive failing cycles)",
        monitor.consecutive_failures()
    );

    Ok(())
}
