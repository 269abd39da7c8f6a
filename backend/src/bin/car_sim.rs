// Vehicle simulator: sends one random telemetry record per interval to the ingest port.

use std::env;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::Context;
use telemetry_core::generator::RandomGenerator;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use vehicle_telemetry_server::constants::{CAR_SIM_INTERVAL_MS, DEFAULT_UDP_PORT};
use vehicle_telemetry_server::sender::send_loop;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let target: SocketAddr = match env::var("CAR_SIM_TARGET") {
        Ok(value) => value
            .parse()
            .with_context(|| format!("invalid CAR_SIM_TARGET {value:?}"))?,
        Err(_) => SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_UDP_PORT)),
    };
    let interval_ms = match env::var("CAR_SIM_INTERVAL_MS") {
        Ok(value) => value
            .parse::<u64>()
            .with_context(|| format!("invalid CAR_SIM_INTERVAL_MS {value:?}"))?,
        Err(_) => CAR_SIM_INTERVAL_MS,
    };
    anyhow::ensure!(interval_ms > 0, "CAR_SIM_INTERVAL_MS must be positive");

    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .await
        .context("failed to bind simulator socket")?;
    info!(%target, interval_ms, "car simulator started");

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => signal_cancel.cancel(),
            Err(err) => warn!(?err, "failed to listen for ctrl-c"),
        }
    });

    let sent = send_loop(
        &socket,
        target,
        Duration::from_millis(interval_ms),
        RandomGenerator::from_entropy(),
        cancel,
    )
    .await;
    info!(sent, "car simulator stopped");
    Ok(())
}
