// Shared utility helpers for timestamps and sequencing.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::time::Instant;

pub fn monotonic_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

pub fn next_sequence(sequence: &AtomicU64) -> u64 {
    sequence.fetch_add(1, Ordering::Relaxed) + 1
}
