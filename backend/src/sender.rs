// Vehicle simulator that emits encoded records over UDP.
// Invariants: one record per datagram; send failures are logged and never end the loop.

use std::net::SocketAddr;
use std::time::Duration;

use telemetry_core::codec;
use telemetry_core::generator::RecordGenerator;
use tokio::net::UdpSocket;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub async fn send_loop<G>(
    socket: &UdpSocket,
    target: SocketAddr,
    period: Duration,
    mut generator: G,
    cancel: CancellationToken,
) -> u64
where
    G: RecordGenerator,
{
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sent = 0u64;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }
        let record = generator.next_record();
        let bytes = codec::encode(&record);
        match socket.send_to(&bytes, target).await {
            Ok(_) => {
                sent += 1;
                info!(
                    %target,
                    x = record.location.x,
                    y = record.location.y,
                    speed = record.speed,
                    brake = record.brake_engaged,
                    "sent vehicle record"
                );
            }
            Err(err) => warn!(?err, %target, "failed to send vehicle record"),
        }
    }
    sent
}
