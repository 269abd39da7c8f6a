// Shared constants for server timing, ports, and limits.

pub const DEFAULT_HTTP_PORT: u16 = 5000;
pub const DEFAULT_UDP_PORT: u16 = 5005;
pub const STREAM_TICK_MS: u64 = 100;
pub const STREAM_MAX_ACTIVE: usize = 1024;
pub const MAX_DATAGRAM_LEN: usize = 1500;
pub const INGEST_LOG_INTERVAL_MS: u64 = 1000;
pub const CAR_SIM_INTERVAL_MS: u64 = 1000;
