// Vehicle telemetry server: UDP record ingest plus WebSocket streaming.

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use vehicle_telemetry_server::app::{AppState, ServerConfig};
use vehicle_telemetry_server::http;
use vehicle_telemetry_server::udp::{self, IngestStats, LatestConsumer, LogConsumer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let shutdown = CancellationToken::new();

    let ingest_stats = Arc::new(IngestStats::default());
    let (latest, latest_rx) = LatestConsumer::new();
    let udp_addr = config.udp.socket_addr();
    let udp_socket = udp::bind_udp_socket(udp_addr)
        .await
        .with_context(|| format!("failed to bind udp ingest on {udp_addr}"))?;

    let udp_stats = ingest_stats.clone();
    let udp_cancel = shutdown.clone();
    let udp_log_interval_ms = config.ingest_log_interval_ms;
    let udp_task = tokio::spawn(async move {
        udp::udp_loop(
            udp_socket,
            (LogConsumer, latest),
            udp_stats.as_ref(),
            udp_log_interval_ms,
            udp_cancel,
        )
        .await;
    });

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown requested");
                signal_shutdown.cancel();
            }
            Err(err) => warn!(?err, "failed to listen for ctrl-c"),
        }
    });

    let app_state = AppState::new(&config, ingest_stats, latest_rx, shutdown.clone());
    let app = http::router(app_state);

    let addr = config.http_addr;
    info!(%addr, tick_ms = config.tick_period.as_millis() as u64, "starting server");
    let server_shutdown = shutdown.clone();
    axum::Server::try_bind(&addr)
        .with_context(|| format!("failed to bind http server on {addr}"))?
        .serve(app.into_make_service())
        .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
        .await
        .context("server failed")?;

    shutdown.cancel();
    if let Err(err) = udp_task.await {
        warn!(?err, "udp task panicked");
    }
    info!("server stopped");
    Ok(())
}
