// WebSocket transport layer for per-client telemetry streaming.

use std::fmt;
use std::sync::atomic::Ordering;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State as AxumState;
use axum::response::IntoResponse;
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use telemetry_core::model::VehicleRecord;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app::AppState;
use crate::session::{ConnectionId, ControlCommand, SessionControl, SubscriptionSession};
use crate::utils::next_sequence;

/// Data-plane payload pushed once per tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarData {
    pub speed: u32,
    pub brake: bool,
}

impl From<&VehicleRecord> for CarData {
    fn from(record: &VehicleRecord) -> Self {
        Self {
            speed: record.speed,
            brake: record.brake_engaged,
        }
    }
}

pub async fn ws_handler(
    AxumState(app_state): AxumState<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: AppState) {
    let id = ConnectionId(next_sequence(app_state.connection_sequence.as_ref()));
    let open = app_state.open_connections.fetch_add(1, Ordering::Relaxed) + 1;
    info!(connection = %id, open, "ws connected");

    let session = SubscriptionSession::new(
        id,
        app_state.tick_period,
        app_state.slots.clone(),
        app_state.shutdown.clone(),
        (app_state.generator)(),
    );
    let (sink, stream) = socket.split();
    run_connection(sink, stream, session, app_state.shutdown.clone()).await;

    let open = app_state
        .open_connections
        .fetch_sub(1, Ordering::Relaxed)
        .saturating_sub(1);
    info!(connection = %id, open, "ws disconnected");
}

/// Drives one connection until the client leaves or the server shuts down.
///
/// Inbound frames and session ticks are handled by this single task, with
/// inbound frames polled first, so a processed `stop` is never followed by a
/// push. The session is always closed through `on_disconnect` on exit.
pub async fn run_connection<Si, St, E>(
    mut sink: Si,
    mut stream: St,
    mut session: SubscriptionSession,
    shutdown: CancellationToken,
) where
    Si: Sink<Message> + Unpin,
    Si::Error: fmt::Debug,
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Debug,
{
    let id = session.id();
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => dispatch_text(&mut session, &text),
                    Some(Ok(Message::Ping(payload))) => {
                        if sink.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(connection = %id, ?err, "ws error");
                        break;
                    }
                    None => break,
                }
            }
            record = session.tick() => {
                let Some(record) = record else {
                    break;
                };
                let payload = match serde_json::to_string(&CarData::from(&record)) {
                    Ok(payload) => payload,
                    Err(err) => {
                        warn!(connection = %id, ?err, "failed to encode car data");
                        continue;
                    }
                };
                if let Err(err) = sink.send(Message::Text(payload)).await {
                    debug!(connection = %id, ?err, "ws send failed");
                    break;
                }
            }
        }
    }
    session.on_disconnect();
}

fn dispatch_text(session: &mut SubscriptionSession, text: &str) {
    let command = ControlCommand::parse(text);
    if let Some(command) = command {
        debug!(connection = %session.id(), command = command.as_str(), "control message");
    }
    match command {
        Some(ControlCommand::Start) => {
            if let Err(err) = session.on_start() {
                warn!(connection = %session.id(), %err, "stream start refused");
            }
        }
        Some(ControlCommand::Stop) => {
            session.on_stop();
        }
        None => {
            debug!(connection = %session.id(), len = text.len(), "ignoring unrecognized message");
        }
    }
}
