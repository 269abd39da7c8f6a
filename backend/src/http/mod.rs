// HTTP handlers and routing.

use std::sync::atomic::Ordering;

use axum::extract::State as AxumState;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};

use crate::app::AppState;
use crate::ws::ws_handler;

mod types;
pub use types::*;

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(get_stats))
        .route("/telemetry/latest", get(get_latest_record))
        .route("/ws", get(ws_handler))
        .with_state(app_state)
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

async fn get_stats(AxumState(app_state): AxumState<AppState>) -> impl IntoResponse {
    Json(stats_snapshot(&app_state))
}

async fn get_latest_record(AxumState(app_state): AxumState<AppState>) -> Response {
    let latest = *app_state.latest_rx.borrow();
    match latest {
        Some(received) => Json(received).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

pub fn stats_snapshot(app_state: &AppState) -> StatsResponse {
    StatsResponse {
        ingest: app_state.ingest_stats.snapshot(),
        streams: StreamStats {
            active: app_state.slots.active(),
            capacity: app_state.slots.capacity(),
            tick_ms: app_state.tick_period.as_millis() as u64,
        },
        open_connections: app_state.open_connections.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::Arc;

    use telemetry_core::model::VehicleRecord;
    use tokio_util::sync::CancellationToken;

    use crate::app::ServerConfig;
    use crate::udp::{IngestStats, LatestConsumer, RecordConsumer};

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = health().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn latest_record_is_empty_until_a_datagram_decodes() {
        let (consumer, latest_rx) = LatestConsumer::new();
        let state = AppState::new(
            &ServerConfig::default(),
            Arc::new(IngestStats::default()),
            latest_rx,
            CancellationToken::new(),
        );

        let response = get_latest_record(AxumState(state.clone())).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let source: SocketAddr = "192.168.1.20:40000".parse().unwrap();
        consumer.consume(VehicleRecord::new(88, true).with_location(-4, 9), source);
        let response = get_latest_record(AxumState(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["record"]["speed"], 88);
        assert_eq!(body["record"]["brake_engaged"], true);
        assert_eq!(body["record"]["location"], serde_json::json!({ "x": -4, "y": 9 }));
        assert_eq!(body["source"], "192.168.1.20:40000");
    }

    #[test]
    fn stats_reflect_configuration() {
        let config = ServerConfig {
            stream_max_active: 16,
            ..ServerConfig::default()
        };
        let (_consumer, latest_rx) = LatestConsumer::new();
        let state = AppState::new(
            &config,
            Arc::new(IngestStats::default()),
            latest_rx,
            CancellationToken::new(),
        );

        let stats = serde_json::to_value(stats_snapshot(&state)).unwrap();
        assert_eq!(stats["streams"]["capacity"], 16);
        assert_eq!(stats["streams"]["active"], 0);
        assert_eq!(stats["streams"]["tick_ms"], 100);
        assert_eq!(stats["ingest"]["received"], 0);
        assert_eq!(stats["open_connections"], 0);
    }
}
