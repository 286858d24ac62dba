mod admin;
mod bootstrap;
mod health;
mod routes;
mod tasks;
mod webhook;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tendero_core::config::{AppConfig, LoadOptions};
use tokio::sync::Notify;
use tracing::{info, warn};

fn init_logging(config: &AppConfig) {
    use tendero_core::config::LogFormat::*;
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

    let app = bootstrap::bootstrap_with_config(config)?;

    let refresh_interval = match app.config.catalog.refresh_interval_secs {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };
    let refresher = tasks::spawn_catalog_refresh(Arc::clone(&app.state.catalog), refresh_interval);
    let sweeper = tasks::spawn_conversation_sweep(
        Arc::clone(app.state.runtime.conversations()),
        tasks::SWEEP_INTERVAL,
    );

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "tendero-server listening"
    );

    let shutdown = Arc::new(Notify::new());
    let signal = Arc::clone(&shutdown);
    let router = routes::router(app.state);
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { signal.notified().await })
            .await
    });

    tokio::select! {
        finished = &mut server => {
            refresher.abort();
            sweeper.abort();
            finished??;
            return Ok(());
        }
        () = wait_for_shutdown() => {}
    }

    info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "tendero-server stopping"
    );
    refresher.abort();
    sweeper.abort();
    shutdown.notify_one();

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    if tokio::time::timeout(grace, server).await.is_err() {
        warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            grace_secs = grace.as_secs(),
            "in-flight requests did not drain before the grace period"
        );
    }

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %error,
            "ctrl-c handler unavailable; shutting down"
        );
    }
}
