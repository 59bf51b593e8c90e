//! Relay orchestration module.

mod orchestrator;
mod stats;

pub use orchestrator::{PayloadSource, Relay, RelayConfig};
pub use stats::RelayStats;
