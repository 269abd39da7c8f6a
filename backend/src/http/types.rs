// HTTP response payload types.

use serde::Serialize;

use crate::udp::IngestSnapshot;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct StreamStats {
    pub active: usize,
    pub capacity: usize,
    pub tick_ms: u64,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub ingest: IngestSnapshot,
    pub streams: StreamStats,
    pub open_connections: usize,
}
