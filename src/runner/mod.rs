//! Runner module - per-game harness and the multi-game supervisor

mod harness;
mod supervisor;

pub use harness::{GameOutcome, GameRunner, MAX_ACTIONS_PER_SEGMENT, MAX_TURNS};
pub use supervisor::{Supervisor, SupervisorConfig, MAINTENANCE_INTERVAL, MAX_CONCURRENT_GAMES};
