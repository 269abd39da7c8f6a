// Per-connection subscription state machine.
// Invariants: a session owns at most one Generation; leaving Streaming drops it, which stops all ticks.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use telemetry_core::generator::RecordGenerator;
use telemetry_core::model::VehicleRecord;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::SessionError;

mod command;

pub use command::ControlCommand;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Streaming,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Streaming => "streaming",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyStreaming,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    AlreadyIdle,
}

/// Commands the transport layer dispatches into a session.
pub trait SessionControl {
    fn on_start(&mut self) -> Result<StartOutcome, SessionError>;
    fn on_stop(&mut self) -> StopOutcome;
    fn on_disconnect(self);
}

/// Process-wide cap on concurrently streaming sessions.
///
/// `active()` counts live generation resources, so it doubles as a leak gauge:
/// it must return to its previous value once every started session has
/// stopped or disconnected.
#[derive(Clone, Debug)]
pub struct StreamSlots {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl StreamSlots {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn active(&self) -> usize {
        self.capacity
            .saturating_sub(self.semaphore.available_permits())
    }

    fn try_acquire(&self) -> Result<OwnedSemaphorePermit, SessionError> {
        self.semaphore
            .clone()
            .try_acquire_owned()
            .map_err(|_| SessionError::ResourceExhausted {
                capacity: self.capacity,
            })
    }
}

// The periodic generation resource. Dropping it cancels the token and
// returns the stream slot.
struct Generation {
    interval: Interval,
    cancel: CancellationToken,
    _slot: OwnedSemaphorePermit,
}

impl Drop for Generation {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub struct SubscriptionSession {
    id: ConnectionId,
    period: Duration,
    slots: StreamSlots,
    shutdown: CancellationToken,
    generator: Box<dyn RecordGenerator>,
    generation: Option<Generation>,
    ticks: u64,
}

impl SubscriptionSession {
    pub fn new(
        id: ConnectionId,
        period: Duration,
        slots: StreamSlots,
        shutdown: CancellationToken,
        generator: Box<dyn RecordGenerator>,
    ) -> Self {
        debug!(connection = %id, "session created");
        Self {
            id,
            period,
            slots,
            shutdown,
            generator,
            generation: None,
            ticks: 0,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn status(&self) -> SessionStatus {
        if self.generation.is_some() {
            SessionStatus::Streaming
        } else {
            SessionStatus::Idle
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Waits for the next tick while streaming and returns the generated record.
    ///
    /// Pends forever while idle. Returns `None` when the generation token was
    /// cancelled from outside the session (server shutdown); the resource is
    /// released and the session is idle afterwards. Cancel-safe.
    pub async fn tick(&mut self) -> Option<VehicleRecord> {
        let Some(generation) = self.generation.as_mut() else {
            return std::future::pending().await;
        };
        let fired = tokio::select! {
            biased;
            _ = generation.cancel.cancelled() => false,
            _ = generation.interval.tick() => true,
        };
        if !fired {
            self.generation = None;
            info!(connection = %self.id, "stream cancelled by shutdown");
            return None;
        }
        self.ticks += 1;
        Some(self.generator.next_record())
    }
}

impl SessionControl for SubscriptionSession {
    fn on_start(&mut self) -> Result<StartOutcome, SessionError> {
        if self.generation.is_some() {
            debug!(connection = %self.id, "start ignored, already streaming");
            return Ok(StartOutcome::AlreadyStreaming);
        }
        let slot = self.slots.try_acquire()?;
        let mut interval = time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.generation = Some(Generation {
            interval,
            cancel: self.shutdown.child_token(),
            _slot: slot,
        });
        info!(
            connection = %self.id,
            period_ms = self.period.as_millis() as u64,
            "stream started"
        );
        Ok(StartOutcome::Started)
    }

    fn on_stop(&mut self) -> StopOutcome {
        match self.generation.take() {
            Some(generation) => {
                drop(generation);
                info!(connection = %self.id, ticks = self.ticks, "stream stopped");
                StopOutcome::Stopped
            }
            None => StopOutcome::AlreadyIdle,
        }
    }

    fn on_disconnect(mut self) {
        let status = self.status();
        self.on_stop();
        info!(
            connection = %self.id,
            status = status.as_str(),
            ticks = self.ticks,
            "session closed"
        );
    }
}
