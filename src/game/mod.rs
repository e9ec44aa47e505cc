//! Game module - core state machine, rules engine and managers

pub mod auction;
pub mod bankruptcy;
pub mod board;
pub mod cards;
mod controller;
mod events;
pub mod jail;
pub mod payment;
pub mod property;
pub mod state;
pub mod tools;
pub mod trade;

pub use controller::{unmortgage_cost, ActionResult, ActionStatus, GameController};
pub use events::{LobbyEvent, LogLevel, ServerEvent};
pub use state::*;
pub use tools::ToolKind;
