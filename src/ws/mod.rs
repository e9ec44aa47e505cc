//! WebSocket module for streaming game and lobby events

mod hub;

pub use hub::Hub;

use std::sync::Arc;

use axum::{
    extract::{Path, State, WebSocketUpgrade},
    response::Response,
};
use tokio::sync::RwLock;

use crate::api::AppState;

/// Upgrade handler for a single game's event stream
pub async fn game_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(game_uid): Path<String>,
) -> Response {
    ws.on_upgrade(move |socket| hub::handle_game_socket(socket, state.hub, game_uid))
}

/// Upgrade handler for the lobby stream
pub async fn lobby_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| hub::handle_lobby_socket(socket, state.hub))
}

/// Forward one game's event queue into its hub channel, stamping each
/// message with the game uid. One task per game; publishers never block.
pub fn spawn_game_fanout(
    hub: Arc<RwLock<Hub>>,
    game_uid: String,
    mut rx: tokio::sync::mpsc::UnboundedReceiver<crate::game::ServerEvent>,
) {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let mut value = match serde_json::to_value(&event) {
                Ok(v) => v,
                Err(_) => continue,
            };
            value["game_uid"] = serde_json::Value::String(game_uid.clone());
            let mut hub_guard = hub.write().await;
            hub_guard.broadcast_to_game(&game_uid, &value.to_string());
        }
    });
}

/// Forward the lobby event queue into the hub
pub fn spawn_lobby_fanout(
    hub: Arc<RwLock<Hub>>,
    mut rx: tokio::sync::mpsc::UnboundedReceiver<crate::game::LobbyEvent>,
) {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Ok(text) = serde_json::to_string(&event) {
                let mut hub_guard = hub.write().await;
                hub_guard.broadcast_to_lobby(&text);
            }
        }
    });
}
