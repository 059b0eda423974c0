pub mod commands;
pub mod engine;
pub mod history;
pub mod messages;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use commands::{handle_command, Command};
pub use engine::{EngineConfig, TickOutcome, TrackingEngine};
pub use history::PriceHistory;
pub use registry::AlertRegistry;
