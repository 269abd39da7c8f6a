// Core data models for vehicle telemetry records.

mod record;

pub use record::{Location, VehicleRecord};
