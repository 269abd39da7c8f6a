// Vehicle state record shared by the datagram and streaming paths.
// Invariants: records are plain values; nothing in this crate retains them.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub x: i32,
    pub y: i32,
}

/// One snapshot of vehicle state.
///
/// `speed` is in km/h. `location` travels on the datagram path only and is
/// ignored by the streaming payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub speed: u32,
    pub brake_engaged: bool,
    pub location: Location,
}

impl VehicleRecord {
    pub fn new(speed: u32, brake_engaged: bool) -> Self {
        Self {
            speed,
            brake_engaged,
            location: Location::default(),
        }
    }

    pub fn with_location(mut self, x: i32, y: i32) -> Self {
        self.location = Location { x, y };
        self
    }
}
