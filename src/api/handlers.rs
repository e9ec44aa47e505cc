//! HTTP handlers for the query and admin surface

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;
use crate::error::AppResult;
use crate::game::GameController;

/// Health check
pub async fn health() -> &'static str {
    "OK"
}

/// List all known games with their status
pub async fn list_games(State(state): State<AppState>) -> Json<Value> {
    Json(state.supervisor.list_games())
}

/// Static board layout of a game
pub async fn board_layout(
    State(_state): State<AppState>,
    Path(_game_uid): Path<String>,
) -> Json<Value> {
    Json(GameController::board_layout())
}

/// Supervisor status
pub async fn games_status(State(state): State<AppState>) -> Json<Value> {
    Json(state.supervisor.status())
}

/// Agent pool status
pub async fn agents_status(State(state): State<AppState>) -> Json<Value> {
    Json(state.supervisor.pool_status())
}

/// Start one game immediately
pub async fn create_game(State(state): State<AppState>) -> AppResult<Json<Value>> {
    match state.supervisor.clone().spawn_game() {
        Some(game_uid) => Ok(Json(json!({ "game_uid": game_uid }))),
        None => Err(crate::error::AppError::BadRequest(
            "not enough available agents to seat a game".into(),
        )),
    }
}

/// Run one maintenance pass now
pub async fn trigger_maintenance(State(state): State<AppState>) -> Json<Value> {
    let started = state.supervisor.clone().maintenance_tick().await;
    Json(json!({ "games_started": started }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateConfigRequest {
    pub concurrent_games_count: Option<usize>,
    pub auto_restart_games: Option<bool>,
}

/// Update the supervisor target; the game count is clamped server-side
pub async fn update_config(
    State(state): State<AppState>,
    Json(req): Json<UpdateConfigRequest>,
) -> Json<Value> {
    let config = state
        .supervisor
        .update_config(req.concurrent_games_count, req.auto_restart_games);
    Json(json!({
        "concurrent_games_count": config.target_games,
        "agents_per_game": config.agents_per_game,
        "auto_restart_games": config.auto_restart,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CreateAgentsRequest {
    pub count: usize,
}

/// Mint random agents into the pool
pub async fn create_agents(
    State(state): State<AppState>,
    Json(req): Json<CreateAgentsRequest>,
) -> Json<Value> {
    let agents = state.supervisor.create_agents(req.count.min(32)).await;
    Json(json!({
        "created": agents
            .iter()
            .map(|a| json!({ "uid": a.uid, "name": a.name }))
            .collect::<Vec<_>>(),
    }))
}

/// Reset one agent's ledger balance to the starting amount
pub async fn reset_agent_balance(
    State(state): State<AppState>,
    Path(agent_uid): Path<String>,
) -> AppResult<Json<Value>> {
    state.supervisor.reset_agent_balance(&agent_uid).await?;
    Ok(Json(json!({ "status": "reset" })))
}
