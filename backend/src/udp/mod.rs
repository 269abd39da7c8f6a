// UDP ingest module.
// Invariants: one malformed or failed datagram never stops the loop; payloads are never logged raw.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use telemetry_core::codec::{self, DecodeError};
use telemetry_core::model::VehicleRecord;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::constants::MAX_DATAGRAM_LEN;
use crate::utils::monotonic_ms;

mod consumer;

pub use consumer::{ChannelConsumer, LatestConsumer, LogConsumer, RecordConsumer};

#[derive(Debug, Default)]
pub struct IngestStats {
    received: AtomicU64,
    decoded: AtomicU64,
    truncated: AtomicU64,
    schema_mismatch: AtomicU64,
    receive_errors: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IngestSnapshot {
    pub received: u64,
    pub decoded: u64,
    pub truncated: u64,
    pub schema_mismatch: u64,
    pub receive_errors: u64,
}

impl IngestStats {
    pub fn snapshot(&self) -> IngestSnapshot {
        IngestSnapshot {
            received: self.received.load(Ordering::Relaxed),
            decoded: self.decoded.load(Ordering::Relaxed),
            truncated: self.truncated.load(Ordering::Relaxed),
            schema_mismatch: self.schema_mismatch.load(Ordering::Relaxed),
            receive_errors: self.receive_errors.load(Ordering::Relaxed),
        }
    }

    fn record_drop(&self, err: &DecodeError) {
        let counter = match err {
            DecodeError::Truncated { .. } => &self.truncated,
            DecodeError::SchemaMismatch(_) => &self.schema_mismatch,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

pub async fn bind_udp_socket(addr: SocketAddr) -> std::io::Result<UdpSocket> {
    let socket = UdpSocket::bind(addr).await?;
    info!(addr = %socket.local_addr()?, "udp ingest started");
    Ok(socket)
}

pub fn handle_datagram<C>(
    payload: &[u8],
    source: SocketAddr,
    consumer: &C,
    stats: &IngestStats,
) -> Result<VehicleRecord, DecodeError>
where
    C: RecordConsumer + ?Sized,
{
    stats.received.fetch_add(1, Ordering::Relaxed);
    match codec::decode(payload) {
        Ok(record) => {
            stats.decoded.fetch_add(1, Ordering::Relaxed);
            consumer.consume(record, source);
            Ok(record)
        }
        Err(err) => {
            stats.record_drop(&err);
            Err(err)
        }
    }
}

// Lets one warn through per interval and counts the events it holds back.
#[derive(Debug, Default)]
struct LogGate {
    last_ms: Option<u64>,
    suppressed: u64,
}

impl LogGate {
    // Some(n) when a warn is due, n being the events suppressed since the last one.
    fn admit(&mut self, now_ms: u64, interval_ms: u64) -> Option<u64> {
        let due = self
            .last_ms
            .map_or(true, |last| now_ms.saturating_sub(last) >= interval_ms);
        if !due {
            self.suppressed += 1;
            return None;
        }
        self.last_ms = Some(now_ms);
        Some(std::mem::take(&mut self.suppressed))
    }
}

#[derive(Debug)]
struct IngestLog {
    interval_ms: u64,
    drops: LogGate,
    receive_errors: LogGate,
}

impl IngestLog {
    fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            drops: LogGate::default(),
            receive_errors: LogGate::default(),
        }
    }
}

fn handle_receive<C>(
    recv: io::Result<(usize, SocketAddr)>,
    buf: &[u8],
    consumer: &C,
    stats: &IngestStats,
    log: &mut IngestLog,
    now_ms: u64,
) where
    C: RecordConsumer + ?Sized,
{
    let (len, source) = match recv {
        Ok(received) => received,
        Err(err) => {
            stats.receive_errors.fetch_add(1, Ordering::Relaxed);
            match log.receive_errors.admit(now_ms, log.interval_ms) {
                Some(suppressed) => warn!(?err, suppressed, "udp receive failed"),
                None => debug!(?err, "udp receive failed"),
            }
            return;
        }
    };

    if let Err(err) = handle_datagram(&buf[..len], source, consumer, stats) {
        match log.drops.admit(now_ms, log.interval_ms) {
            Some(suppressed) => warn!(%source, len, %err, suppressed, "datagram dropped"),
            None => debug!(%source, len, %err, "datagram dropped"),
        }
    }
}

/// Receives until `cancel` fires. Receive and decode failures are counted and
/// logged at most once per `log_interval_ms`; none of them end the loop.
pub async fn udp_loop<C>(
    socket: UdpSocket,
    consumer: C,
    stats: &IngestStats,
    log_interval_ms: u64,
    cancel: CancellationToken,
) where
    C: RecordConsumer,
{
    let start = Instant::now();
    let mut buf = [0u8; MAX_DATAGRAM_LEN];
    let mut log = IngestLog::new(log_interval_ms);

    loop {
        let recv = tokio::select! {
            _ = cancel.cancelled() => break,
            recv = socket.recv_from(&mut buf) => recv,
        };
        handle_receive(recv, &buf, &consumer, stats, &mut log, monotonic_ms(start));
    }

    let snapshot = stats.snapshot();
    info!(
        received = snapshot.received,
        decoded = snapshot.decoded,
        dropped = snapshot.truncated + snapshot.schema_mismatch,
        receive_errors = snapshot.receive_errors,
        "udp ingest stopped"
    );
}
