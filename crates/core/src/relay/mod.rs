mod engine;
pub mod schedule;
mod state;

pub use engine::RelayEngine;
pub use state::RelayState;
