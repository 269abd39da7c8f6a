// Application state and configuration shared by the server tasks.

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, AtomicUsize};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use telemetry_core::generator::{RandomGenerator, RecordGenerator};
use telemetry_core::model::VehicleRecord;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::constants::{
    DEFAULT_HTTP_PORT, DEFAULT_UDP_PORT, INGEST_LOG_INTERVAL_MS, STREAM_MAX_ACTIVE, STREAM_TICK_MS,
};
use crate::error::ConfigError;
use crate::session::StreamSlots;
use crate::udp::IngestStats;

pub type GeneratorFactory = Arc<dyn Fn() -> Box<dyn RecordGenerator> + Send + Sync>;

pub fn random_generator_factory() -> GeneratorFactory {
    Arc::new(|| Box::new(RandomGenerator::from_entropy()) as Box<dyn RecordGenerator>)
}

#[derive(Clone)]
pub struct AppState {
    pub slots: StreamSlots,
    pub tick_period: Duration,
    pub generator: GeneratorFactory,
    pub ingest_stats: Arc<IngestStats>,
    pub latest_rx: watch::Receiver<Option<ReceivedRecord>>,
    pub connection_sequence: Arc<AtomicU64>,
    pub open_connections: Arc<AtomicUsize>,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: &ServerConfig,
        ingest_stats: Arc<IngestStats>,
        latest_rx: watch::Receiver<Option<ReceivedRecord>>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            slots: StreamSlots::new(config.stream_max_active),
            tick_period: config.tick_period,
            generator: random_generator_factory(),
            ingest_stats,
            latest_rx,
            connection_sequence: Arc::new(AtomicU64::new(0)),
            open_connections: Arc::new(AtomicUsize::new(0)),
            shutdown,
        }
    }
}

/// Last record decoded from a datagram, with the sender it came from.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ReceivedRecord {
    pub record: VehicleRecord,
    pub source: SocketAddr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UdpConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
}

impl UdpConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_UDP_PORT,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    pub http_addr: SocketAddr,
    pub udp: UdpConfig,
    pub tick_period: Duration,
    pub stream_max_active: usize,
    pub ingest_log_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_HTTP_PORT),
            udp: UdpConfig::default(),
            tick_period: Duration::from_millis(STREAM_TICK_MS),
            stream_max_active: STREAM_MAX_ACTIVE,
            ingest_log_interval_ms: INGEST_LOG_INTERVAL_MS,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let http_bind = parse_or(&lookup, "HTTP_BIND", defaults.http_addr.ip())?;
        let http_port = parse_or(&lookup, "HTTP_PORT", defaults.http_addr.port())?;
        let udp_bind = parse_or(&lookup, "TELEMETRY_UDP_BIND", defaults.udp.bind_addr)?;
        let udp_port = parse_or(&lookup, "TELEMETRY_UDP_PORT", defaults.udp.port)?;
        let tick_ms = parse_or(&lookup, "STREAM_TICK_MS", STREAM_TICK_MS)?;
        if tick_ms == 0 {
            return Err(ConfigError::invalid("STREAM_TICK_MS", "0", "must be positive"));
        }
        let stream_max_active = parse_or(&lookup, "STREAM_MAX_ACTIVE", defaults.stream_max_active)?;
        if stream_max_active == 0 {
            return Err(ConfigError::invalid("STREAM_MAX_ACTIVE", "0", "must be positive"));
        }
        let ingest_log_interval_ms =
            parse_or(&lookup, "INGEST_LOG_INTERVAL_MS", defaults.ingest_log_interval_ms)?;

        Ok(Self {
            http_addr: SocketAddr::new(http_bind, http_port),
            udp: UdpConfig {
                bind_addr: udp_bind,
                port: udp_port,
            },
            tick_period: Duration::from_millis(tick_ms),
            stream_max_active,
            ingest_log_interval_ms,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|err| ConfigError::invalid(key, value.clone(), err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.http_addr, "127.0.0.1:5000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.udp.socket_addr(), "127.0.0.1:5005".parse::<SocketAddr>().unwrap());
        assert_eq!(config.tick_period, Duration::from_millis(100));
    }

    #[test]
    fn overrides_are_applied() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("HTTP_BIND", "0.0.0.0"),
            ("HTTP_PORT", "8080"),
            ("TELEMETRY_UDP_PORT", " 6000 "),
            ("STREAM_TICK_MS", "250"),
            ("STREAM_MAX_ACTIVE", "3"),
        ]))
        .unwrap();
        assert_eq!(config.http_addr, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.udp.port, 6000);
        assert_eq!(config.tick_period, Duration::from_millis(250));
        assert_eq!(config.stream_max_active, 3);
    }

    #[test]
    fn malformed_values_are_reported() {
        let err = ServerConfig::from_lookup(lookup(&[("HTTP_PORT", "http")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "HTTP_PORT", .. }));

        let err = ServerConfig::from_lookup(lookup(&[("TELEMETRY_UDP_BIND", "localhost")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "TELEMETRY_UDP_BIND", .. }));
    }

    #[test]
    fn zero_tick_period_is_rejected() {
        let err = ServerConfig::from_lookup(lookup(&[("STREAM_TICK_MS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "STREAM_TICK_MS", .. }));
    }
}
