mod bootstrap;
mod health;
pub mod routes;

use std::future::{Future, IntoFuture};
use std::time::Duration;

use anyhow::Result;
use brewline_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use brewline_core::config::LogFormat::*;
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
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!(
        event_name = "system.server.started",
        bind_address = %address,
        rule_count = app.catalog.rule_count(),
        popularity_count = app.catalog.popularity_count(),
        "brewline-server started"
    );

    let router = routes::router(app.state()).merge(health::router(app.catalog.clone()));
    let drain_deadline = Duration::from_secs(app.config.server.graceful_shutdown_secs);

    serve_with_drain(listener, router, drain_deadline, wait_for_shutdown()).await?;

    tracing::info!(event_name = "system.server.stopping", "brewline-server stopping");

    Ok(())
}

async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Serve until `shutdown` resolves, then give in-flight requests up to
/// `drain_deadline` to finish before the process stops waiting on them.
async fn serve_with_drain(
    listener: tokio::net::TcpListener,
    router: axum::Router,
    drain_deadline: Duration,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let (drain_tx, drain_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = drain_rx.await;
        })
        .into_future();
    let mut server_task = tokio::spawn(server);

    tokio::select! {
        joined = &mut server_task => {
            joined??;
            return Ok(());
        }
        () = shutdown => {}
    }

    tracing::info!(
        event_name = "system.server.draining",
        drain_deadline_secs = drain_deadline.as_secs(),
        "shutdown signal received, draining in-flight requests"
    );

    let _ = drain_tx.send(());
    match tokio::time::timeout(drain_deadline, &mut server_task).await {
        Ok(joined) => joined??,
        Err(_) => {
            tracing::warn!(
                event_name = "system.server.drain_deadline_exceeded",
                drain_deadline_secs = drain_deadline.as_secs(),
                "drain deadline exceeded, abandoning remaining connections"
            );
            server_task.abort();
        }
    }

    Ok(())
}
