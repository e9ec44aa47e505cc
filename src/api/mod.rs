//! API module - HTTP handlers and routes

mod handlers;
mod routes;

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::runner::Supervisor;
use crate::ws::Hub;

pub use routes::routes;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub supervisor: Arc<Supervisor>,
    pub hub: Arc<RwLock<Hub>>,
}
