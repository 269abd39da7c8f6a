// Shared vehicle telemetry model, wire codec, and synthetic generation.

pub mod codec;
pub mod generator;
pub mod model;
