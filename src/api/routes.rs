//! Route definitions

use axum::{
    routing::{get, post, put},
    Router,
};

use super::{handlers, AppState};
use crate::ws;

pub fn routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Query surface
        .route("/api/games", get(handlers::list_games))
        .route("/api/games/:game_uid/board", get(handlers::board_layout))
        .route("/api/status/games", get(handlers::games_status))
        .route("/api/status/agents", get(handlers::agents_status))
        // Admin surface
        .route("/api/admin/games", post(handlers::create_game))
        .route("/api/admin/maintenance", post(handlers::trigger_maintenance))
        .route("/api/admin/config", put(handlers::update_config))
        .route("/api/admin/agents", post(handlers::create_agents))
        .route(
            "/api/admin/agents/:agent_uid/reset_balance",
            post(handlers::reset_agent_balance),
        )
        // WebSocket streams
        .route("/ws/lobby", get(ws::lobby_handler))
        .route("/ws/games/:game_uid", get(ws::game_handler))
}
