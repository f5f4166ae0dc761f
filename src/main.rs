//! # nnlb entry point
//!
//! Parses configuration, builds application state, starts the health
//! checker, and serves the router until a shutdown signal arrives.

use nnlb::graceful_shutdown::setup_shutdown_handler;
use nnlb::health::HealthChecker;
use nnlb::{create_router, AppState, Config};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse_args();

    let state = AppState::new(config.clone()).await;
    state.metrics.clone().start_reporting(60);

    let health_checker = HealthChecker::new(
        state.backend_store.clone(),
        Duration::from_secs(config.health_check_interval_secs),
        Duration::from_secs(config.health_check_timeout_secs),
    );
    health_checker.start().await;

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse().map_err(|e| {
        format!("invalid host/port '{}:{}': {e}", config.host, config.port)
    })?;

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("fatal: failed to bind {addr}: {err}");
            std::process::exit(1);
        }
    };

    info!("nnlb listening on http://{addr}");
    info!(strategy = %config.strategy, "selection strategy");

    let shutdown = setup_shutdown_handler().await?;
    let drain_timeout = Duration::from_secs(config.shutdown_drain_timeout_secs);

    // The signal future only waits; it does no cleanup of its own, so axum
    // stops accepting new connections the moment the flag flips instead of
    // after the health checker has already finished draining its probes.
    let signal_watch = shutdown.clone();
    let serve_task = tokio::spawn(
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            while !signal_watch.is_shutdown_initiated() {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }),
    );

    while !shutdown.is_shutdown_initiated() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    info!("no longer accepting new connections; stopping health checker");
    health_checker.stop().await;

    info!(?drain_timeout, "draining in-flight requests");
    match tokio::time::timeout(drain_timeout, serve_task).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(err))) => {
            eprintln!("fatal: server error: {err}");
            std::process::exit(1);
        }
        Ok(Err(join_err)) => {
            eprintln!("fatal: server task panicked: {join_err}");
            std::process::exit(1);
        }
        Err(_) => {
            tracing::warn!("drain timeout exceeded, forcing shutdown");
        }
    }

    info!("shutdown complete");
    Ok(())
}
