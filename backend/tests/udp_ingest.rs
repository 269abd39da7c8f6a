// Loopback tests for the UDP ingest loop and the vehicle simulator.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use telemetry_core::codec;
use telemetry_core::generator::RandomGenerator;
use telemetry_core::model::VehicleRecord;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use vehicle_telemetry_server::sender::send_loop;
use vehicle_telemetry_server::udp::{self, ChannelConsumer, IngestStats};

const WAIT: Duration = Duration::from_secs(2);

async fn loopback_socket() -> UdpSocket {
    udp::bind_udp_socket(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
        .await
        .expect("bind loopback")
}

#[tokio::test]
async fn malformed_datagram_does_not_stop_ingest() {
    let socket = loopback_socket().await;
    let addr = socket.local_addr().unwrap();
    let stats = Arc::new(IngestStats::default());
    let cancel = CancellationToken::new();
    let (consumer, mut records) = ChannelConsumer::new(8);

    let loop_stats = stats.clone();
    let loop_cancel = cancel.clone();
    let task = tokio::spawn(async move {
        udp::udp_loop(socket, consumer, loop_stats.as_ref(), 1000, loop_cancel).await
    });

    let client = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let valid = VehicleRecord::new(101, false).with_location(50, 60);
    let encoded = codec::encode(&valid);
    client.send_to(&encoded[..7], addr).await.unwrap();
    client.send_to(b"definitely not a record", addr).await.unwrap();
    client.send_to(&encoded, addr).await.unwrap();

    let received = timeout(WAIT, records.recv())
        .await
        .expect("record in time")
        .expect("channel open");
    assert_eq!(received.record, valid);
    assert_eq!(received.source, client.local_addr().unwrap());

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.received, 3);
    assert_eq!(snapshot.decoded, 1);
    assert_eq!(snapshot.truncated, 1);
    assert_eq!(snapshot.schema_mismatch, 1);

    cancel.cancel();
    timeout(WAIT, task)
        .await
        .expect("loop stops on cancel")
        .unwrap();
}

#[tokio::test]
async fn simulator_records_decode_on_the_ingest_side() {
    let receiver = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let target = receiver.local_addr().unwrap();
    let sender = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let cancel = CancellationToken::new();

    let send_cancel = cancel.clone();
    let task = tokio::spawn(async move {
        send_loop(
            &sender,
            target,
            Duration::from_millis(10),
            RandomGenerator::seeded(3),
            send_cancel,
        )
        .await
    });

    let mut buf = [0u8; 64];
    for _ in 0..3 {
        let (len, _) = timeout(WAIT, receiver.recv_from(&mut buf))
            .await
            .expect("datagram in time")
            .unwrap();
        assert_eq!(len, codec::RECORD_SIZE);
        let record = codec::decode(&buf[..len]).unwrap();
        assert!(record.speed < 120);
        assert!((0..=100).contains(&record.location.x));
    }

    cancel.cancel();
    let sent = timeout(WAIT, task).await.expect("sender stops").unwrap();
    assert!(sent >= 3);
}

#[tokio::test]
async fn send_failures_do_not_stop_the_simulator() {
    // An IPv4 socket cannot reach an IPv6 address, so every send_to fails.
    let sender = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let target = SocketAddr::from((Ipv6Addr::LOCALHOST, 9));
    let cancel = CancellationToken::new();

    let send_cancel = cancel.clone();
    let task = tokio::spawn(async move {
        send_loop(
            &sender,
            target,
            Duration::from_millis(10),
            RandomGenerator::seeded(4),
            send_cancel,
        )
        .await
    });

    sleep(Duration::from_millis(100)).await;
    assert!(!task.is_finished());

    cancel.cancel();
    let sent = timeout(WAIT, task).await.expect("sender stops").unwrap();
    assert_eq!(sent, 0);
}
