//! WebSocket hub: per-game channels plus one lobby channel.
//!
//! Subscribers each get a bounded queue. Publishers never block on a slow
//! client; a full queue drops that client.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Per-subscriber queue depth before the client is dropped
const SUBSCRIBER_QUEUE_DEPTH: usize = 256;

pub struct Connection {
    pub id: Uuid,
    pub tx: mpsc::Sender<String>,
}

/// Hub manages all active subscriber connections
pub struct Hub {
    games: HashMap<String, Vec<Connection>>,
    lobby: Vec<Connection>,
}

impl Hub {
    pub fn new() -> Self {
        Self {
            games: HashMap::new(),
            lobby: Vec::new(),
        }
    }

    pub fn join_game(&mut self, game_uid: &str, id: Uuid, tx: mpsc::Sender<String>) {
        let room = self.games.entry(game_uid.to_string()).or_default();
        room.retain(|c| c.id != id);
        room.push(Connection { id, tx });
    }

    pub fn leave_game(&mut self, game_uid: &str, id: Uuid) {
        if let Some(room) = self.games.get_mut(game_uid) {
            room.retain(|c| c.id != id);
            if room.is_empty() {
                self.games.remove(game_uid);
            }
        }
    }

    pub fn join_lobby(&mut self, id: Uuid, tx: mpsc::Sender<String>) {
        self.lobby.retain(|c| c.id != id);
        self.lobby.push(Connection { id, tx });
    }

    pub fn leave_lobby(&mut self, id: Uuid) {
        self.lobby.retain(|c| c.id != id);
    }

    /// Fan a message out to a game's subscribers, pruning any whose queue
    /// is full or closed
    pub fn broadcast_to_game(&mut self, game_uid: &str, message: &str) {
        if let Some(room) = self.games.get_mut(game_uid) {
            room.retain(|c| c.tx.try_send(message.to_string()).is_ok());
        }
    }

    pub fn broadcast_to_lobby(&mut self, message: &str) {
        self.lobby
            .retain(|c| c.tx.try_send(message.to_string()).is_ok());
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

/// Forward one subscriber's queue onto their socket until either side closes
pub async fn handle_game_socket(socket: WebSocket, hub: Arc<RwLock<Hub>>, game_uid: String) {
    let id = Uuid::new_v4();
    let (tx, rx) = mpsc::channel::<String>(SUBSCRIBER_QUEUE_DEPTH);

    {
        let mut hub_guard = hub.write().await;
        hub_guard.join_game(&game_uid, id, tx);
    }

    pump_socket(socket, rx).await;

    let mut hub_guard = hub.write().await;
    hub_guard.leave_game(&game_uid, id);
    tracing::debug!("subscriber {} left game {}", id, game_uid);
}

pub async fn handle_lobby_socket(socket: WebSocket, hub: Arc<RwLock<Hub>>) {
    let id = Uuid::new_v4();
    let (tx, rx) = mpsc::channel::<String>(SUBSCRIBER_QUEUE_DEPTH);

    {
        let mut hub_guard = hub.write().await;
        hub_guard.join_lobby(id, tx);
    }

    pump_socket(socket, rx).await;

    let mut hub_guard = hub.write().await;
    hub_guard.leave_lobby(id);
    tracing::debug!("subscriber {} left lobby", id);
}

async fn pump_socket(socket: WebSocket, mut rx: mpsc::Receiver<String>) {
    let (mut sender, mut receiver) = socket.split();

    let send_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // The stream is read-only for clients; we only watch for close
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn full_queue_drops_the_subscriber() {
        let mut hub = Hub::new();
        let (tx, _rx) = mpsc::channel::<String>(2);
        // _rx is kept alive but never drained
        hub.join_game("g-1", Uuid::new_v4(), tx);

        hub.broadcast_to_game("g-1", "a");
        hub.broadcast_to_game("g-1", "b");
        assert_eq!(hub.games.get("g-1").map(|r| r.len()), Some(1));

        // Third message overflows the queue and evicts the client
        hub.broadcast_to_game("g-1", "c");
        assert!(hub.games.get("g-1").is_none());
    }

    #[tokio::test]
    async fn lobby_and_game_channels_are_independent() {
        let mut hub = Hub::new();
        let (game_tx, mut game_rx) = mpsc::channel::<String>(8);
        let (lobby_tx, mut lobby_rx) = mpsc::channel::<String>(8);
        hub.join_game("g-1", Uuid::new_v4(), game_tx);
        hub.join_lobby(Uuid::new_v4(), lobby_tx);

        hub.broadcast_to_game("g-1", "game-event");
        hub.broadcast_to_lobby("lobby-event");

        assert_eq!(game_rx.recv().await.unwrap(), "game-event");
        assert_eq!(lobby_rx.recv().await.unwrap(), "lobby-event");
    }
}
