mod bootstrap;
mod health;

use anyhow::Result;
use basketbot_core::config::{AppConfig, LoadOptions};
use basketbot_telegram::StopReason;

use crate::health::PollingFlag;

fn init_logging(config: &AppConfig) {
    use basketbot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let polling = PollingFlag::default();
    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.db_pool.clone(),
        polling.clone(),
    )
    .await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        "basketbot-server started"
    );

    polling.set(true);
    let summary = app.runner.run_until(shutdown_signal()).await?;
    polling.set(false);
    tracing::info!(
        event_name = "system.server.polling_stopped",
        correlation_id = "shutdown",
        reason = ?summary.stop_reason,
        updates_seen = summary.updates_seen,
        events_dispatched = summary.events_dispatched,
        "telegram polling stopped"
    );

    if summary.stop_reason != StopReason::Shutdown {
        // Keep /health answering (degraded) until the operator stops the process.
        shutdown_signal().await;
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        abandoned_sessions = app.runtime.sessions().active_sessions().await,
        "basketbot-server stopping"
    );
    app.db_pool.close().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_error",
            error = %error,
            "could not listen for ctrl-c; stopping"
        );
    }
}
