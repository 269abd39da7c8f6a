// Consumers for records decoded by the UDP ingest loop.
// Invariants: consume() never blocks the ingest loop; bounded consumers drop instead of waiting.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use telemetry_core::model::VehicleRecord;
use tokio::sync::{mpsc, watch};
use tracing::info;

use crate::app::ReceivedRecord;

pub trait RecordConsumer: Send + Sync {
    fn consume(&self, record: VehicleRecord, source: SocketAddr);
}

impl<F> RecordConsumer for F
where
    F: Fn(VehicleRecord, SocketAddr) + Send + Sync,
{
    fn consume(&self, record: VehicleRecord, source: SocketAddr) {
        self(record, source)
    }
}

impl<A, B> RecordConsumer for (A, B)
where
    A: RecordConsumer,
    B: RecordConsumer,
{
    fn consume(&self, record: VehicleRecord, source: SocketAddr) {
        self.0.consume(record, source);
        self.1.consume(record, source);
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LogConsumer;

impl RecordConsumer for LogConsumer {
    fn consume(&self, record: VehicleRecord, source: SocketAddr) {
        info!(
            %source,
            speed = record.speed,
            brake = record.brake_engaged,
            x = record.location.x,
            y = record.location.y,
            "vehicle record received"
        );
    }
}

/// Publishes each record as the latest-known vehicle state.
#[derive(Debug)]
pub struct LatestConsumer {
    tx: watch::Sender<Option<ReceivedRecord>>,
}

impl LatestConsumer {
    pub fn new() -> (Self, watch::Receiver<Option<ReceivedRecord>>) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, rx)
    }
}

impl RecordConsumer for LatestConsumer {
    fn consume(&self, record: VehicleRecord, source: SocketAddr) {
        self.tx.send_replace(Some(ReceivedRecord { record, source }));
    }
}

/// Forwards records into a bounded queue, dropping them when the reader falls behind.
#[derive(Debug)]
pub struct ChannelConsumer {
    tx: mpsc::Sender<ReceivedRecord>,
    dropped: AtomicU64,
}

impl ChannelConsumer {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ReceivedRecord>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                tx,
                dropped: AtomicU64::new(0),
            },
            rx,
        )
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl RecordConsumer for ChannelConsumer {
    fn consume(&self, record: VehicleRecord, source: SocketAddr) {
        if self.tx.try_send(ReceivedRecord { record, source }).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn source() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[test]
    fn latest_consumer_keeps_only_newest() {
        let (consumer, rx) = LatestConsumer::new();
        assert!(rx.borrow().is_none());
        consumer.consume(VehicleRecord::new(10, false), source());
        consumer.consume(VehicleRecord::new(20, true), source());
        let latest = (*rx.borrow()).expect("latest record");
        assert_eq!(latest.record, VehicleRecord::new(20, true));
        assert_eq!(latest.source, source());
    }

    #[test]
    fn channel_consumer_drops_when_full() {
        let (consumer, mut rx) = ChannelConsumer::new(2);
        for speed in 0..5 {
            consumer.consume(VehicleRecord::new(speed, false), source());
        }
        assert_eq!(consumer.dropped(), 3);
        assert_eq!(rx.try_recv().unwrap().record.speed, 0);
        assert_eq!(rx.try_recv().unwrap().record.speed, 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn pairs_fan_out_to_both_consumers() {
        let seen = Mutex::new(Vec::new());
        let record_seen = |record: VehicleRecord, _: SocketAddr| {
            seen.lock().unwrap().push(record.speed);
        };
        let (latest, rx) = LatestConsumer::new();
        let pair = (record_seen, latest);
        pair.consume(VehicleRecord::new(42, true), source());
        assert_eq!(*seen.lock().unwrap(), vec![42]);
        let latest = *rx.borrow();
        assert_eq!(latest.map(|received| received.record.speed), Some(42));
    }
}
