// Synthetic vehicle record generation.
// Invariants: each call is independent; speed stays in [0, SPEED_LIMIT_KPH).

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::model::VehicleRecord;

pub const SPEED_LIMIT_KPH: u32 = 120;
pub const LOCATION_MAX: i32 = 100;
pub const BRAKE_PROBABILITY: f64 = 0.5;

pub trait RecordGenerator: Send {
    fn next_record(&mut self) -> VehicleRecord;
}

impl<F> RecordGenerator for F
where
    F: FnMut() -> VehicleRecord + Send,
{
    fn next_record(&mut self) -> VehicleRecord {
        self()
    }
}

/// Uniform speed, fair-coin brake, and a location on a 0..=100 grid.
#[derive(Clone, Debug)]
pub struct RandomGenerator {
    rng: SmallRng,
}

impl RandomGenerator {
    pub fn from_entropy() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl RecordGenerator for RandomGenerator {
    fn next_record(&mut self) -> VehicleRecord {
        let speed = self.rng.gen_range(0..SPEED_LIMIT_KPH);
        let brake_engaged = self.rng.gen_bool(BRAKE_PROBABILITY);
        let x = self.rng.gen_range(0..=LOCATION_MAX);
        let y = self.rng.gen_range(0..=LOCATION_MAX);
        VehicleRecord::new(speed, brake_engaged).with_location(x, y)
    }
}
