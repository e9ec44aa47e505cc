//! Events fanned out to game and lobby subscribers

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::state::{GameStatus, PlayerId};

/// Severity tag for free-form log entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

/// Events on a single game's stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    InitLog {
        message: String,
    },

    InitialBoardLayout {
        squares: Value,
    },

    /// Snapshot of one player's view after a state change
    PlayerStateUpdate {
        data: Value,
    },

    TurnInfo {
        turn: u32,
        player_id: PlayerId,
        pending_decision: Option<String>,
    },

    AgentThinkingStart {
        player_id: PlayerId,
        turn: u32,
        seq: u32,
        available_actions: Vec<String>,
    },

    AgentDecision {
        player_id: PlayerId,
        tool_name: String,
        params: Value,
        thoughts: String,
    },

    ActionResult {
        player_id: PlayerId,
        tool_name: String,
        result_status: String,
        result_message: String,
    },

    BonusTurn {
        player_id: PlayerId,
        streak: u8,
    },

    AuctionLog {
        message: String,
    },

    GameSummaryData {
        summary: Value,
    },

    GameEndLog {
        message: String,
    },

    CriticalError {
        message: String,
    },

    Log {
        level: LogLevel,
        message: String,
    },
}

/// Events on the lobby stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LobbyEvent {
    GameAdded {
        game_uid: String,
        players: Vec<String>,
        max_turns: u32,
    },

    GameStatusUpdate {
        game_uid: String,
        status: GameStatus,
        turn_count: u32,
        winner: Option<PlayerId>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_events_carry_type_discriminator() {
        let ev = ServerEvent::BonusTurn {
            player_id: 2,
            streak: 1,
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "bonus_turn");
        assert_eq!(json["player_id"], 2);
    }

    #[test]
    fn lobby_events_round_trip() {
        let ev = LobbyEvent::GameStatusUpdate {
            game_uid: "g-1".into(),
            status: GameStatus::InProgress,
            turn_count: 3,
            winner: None,
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("game_status_update"));
    }
}
