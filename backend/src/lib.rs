// Crate root for the vehicle telemetry server modules.

pub mod app;
pub mod constants;
pub mod error;
pub mod http;
pub mod sender;
pub mod session;
pub mod udp;
pub mod utils;
pub mod ws;
