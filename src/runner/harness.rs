//! Per-game driver loop: picks the active player, asks their agent, dispatches
//! the chosen tool, and decides when segments and turns end.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::agent::AgentClient;
use crate::db::AuditStore;
use crate::game::{
    GameController, GameStatus, LobbyEvent, LogLevel, PendingDecision, PlayerId, ServerEvent,
    ToolKind, STARTING_CASH,
};
use crate::ledger::MINOR_UNITS;

/// Safety cap on driver-loop iterations per game
pub const MAX_TURNS: u32 = 500;
/// Cap on actions a single player may take within one segment
pub const MAX_ACTIONS_PER_SEGMENT: u32 = 15;

/// Tools that do not justify keeping a segment open
fn is_trivial_tool(tool: ToolKind) -> bool {
    matches!(tool, ToolKind::EndTurn | ToolKind::Wait | ToolKind::Resign)
}

#[derive(Debug, Clone)]
pub struct GameOutcome {
    pub status: GameStatus,
    pub winner: Option<PlayerId>,
    pub turns: u32,
}

pub struct GameRunner {
    pub gc: GameController,
    agents: Vec<AgentClient>,
    audit: Option<Arc<AuditStore>>,
    lobby: mpsc::UnboundedSender<LobbyEvent>,
}

impl GameRunner {
    pub fn new(
        gc: GameController,
        agents: Vec<AgentClient>,
        audit: Option<Arc<AuditStore>>,
        lobby: mpsc::UnboundedSender<LobbyEvent>,
    ) -> Self {
        Self {
            gc,
            agents,
            audit,
            lobby,
        }
    }

    pub async fn run(mut self) -> GameOutcome {
        let game_uid = self.gc.state.game_uid.clone();

        self.gc.emit(ServerEvent::InitLog {
            message: format!(
                "Initialized {} agents for game {}",
                self.agents.len(),
                game_uid
            ),
        });
        self.gc.emit(ServerEvent::InitialBoardLayout {
            squares: GameController::board_layout(),
        });

        // Zero-set every seat's ledger balance before play starts
        for player in &self.gc.state.players {
            if let Err(e) = self
                .gc
                .ledger
                .reset_asset_account(
                    &player.ledger_account_id,
                    &self.gc.asset,
                    STARTING_CASH * MINOR_UNITS,
                    &self.gc.network,
                )
                .await
            {
                tracing::warn!(game_uid = %game_uid, "balance reset failed: {e}");
            }
        }

        let audit_game_id = match &self.audit {
            Some(audit) => {
                let profiles: Vec<_> = self.agents.iter().map(|a| a.profile.clone()).collect();
                match audit
                    .record_game_start(&game_uid, &profiles, STARTING_CASH, MAX_TURNS)
                    .await
                {
                    Ok(id) => Some(id),
                    Err(e) => {
                        tracing::error!(game_uid = %game_uid, "audit init failed: {e}");
                        None
                    }
                }
            }
            None => None,
        };

        self.gc.state.status = GameStatus::InProgress;
        let _ = self.lobby.send(LobbyEvent::GameAdded {
            game_uid: game_uid.clone(),
            players: self.gc.state.players.iter().map(|p| p.name.clone()).collect(),
            max_turns: MAX_TURNS,
        });
        self.notify_lobby_status();
        if let (Some(audit), Some(id)) = (&self.audit, audit_game_id) {
            let _ = audit.record_status(id, GameStatus::InProgress).await;
        }

        // The starting player may already owe start-of-turn decisions
        let first = self.gc.state.current_player_index;
        self.gc.begin_turn_checks(first);

        let mut loop_count: u32 = 0;
        let mut action_seq_this_turn: u32 = 0;
        let mut last_seen_turn = self.gc.state.turn_count;
        let mut rolled_this_main_segment = false;

        while !self.gc.state.game_over && loop_count < MAX_TURNS {
            loop_count += 1;
            let main_player = self.gc.state.current_player_index;
            let active = self.gc.state.active_decision_player();

            if self.gc.state.turn_count != last_seen_turn {
                last_seen_turn = self.gc.state.turn_count;
                action_seq_this_turn = 0;
                if let (Some(audit), Some(id)) = (&self.audit, audit_game_id) {
                    let snapshot = serde_json::to_value(&self.gc.state).unwrap_or_default();
                    let _ = audit
                        .record_turn_snapshot(id, last_seen_turn, main_player, &snapshot)
                        .await;
                }
            }

            // Bankrupt players cannot hold the decision slot
            if self.gc.state.players[active].is_bankrupt {
                self.gc.emit_log(
                    LogLevel::Warning,
                    format!("skipping bankrupt player {} as active player", active),
                );
                self.gc.resolve_segment();
                if active == main_player {
                    self.gc.advance_turn();
                }
                continue;
            }

            self.gc.emit(ServerEvent::TurnInfo {
                turn: self.gc.state.turn_count,
                player_id: active,
                pending_decision: self
                    .gc
                    .state
                    .pending_decision
                    .as_ref()
                    .map(|d| d.kind_name().to_string()),
            });

            if active == main_player && self.gc.state.pending_decision.is_none() {
                rolled_this_main_segment = false;
            }

            // === One player's action segment ===
            let mut actions_this_segment: u32 = 0;
            loop {
                if self.gc.state.game_over
                    || self.gc.state.players[active].is_bankrupt
                    || actions_this_segment >= MAX_ACTIONS_PER_SEGMENT
                {
                    if actions_this_segment >= MAX_ACTIONS_PER_SEGMENT {
                        self.gc.emit_log(
                            LogLevel::Warning,
                            format!("segment action cap reached for player {}", active),
                        );
                        self.gc.resolve_segment();
                    }
                    break;
                }

                let available = self.gc.available_actions(active);
                if available.is_empty() {
                    self.gc.emit_log(
                        LogLevel::Warning,
                        format!("no actions available for player {}", active),
                    );
                    self.gc.resolve_segment();
                    break;
                }

                actions_this_segment += 1;
                action_seq_this_turn += 1;

                let view = self.gc.state_view_for(active);
                self.gc.emit(ServerEvent::AgentThinkingStart {
                    player_id: active,
                    turn: self.gc.state.turn_count,
                    seq: action_seq_this_turn,
                    available_actions: available.iter().map(|t| t.as_str().to_string()).collect(),
                });

                let decision = self.agents[active]
                    .decide(&view, &available, self.gc.state.turn_count, action_seq_this_turn)
                    .await;

                self.gc.emit(ServerEvent::AgentDecision {
                    player_id: active,
                    tool_name: decision.tool.as_str().to_string(),
                    params: decision.params.clone(),
                    thoughts: decision.audit.thoughts.clone(),
                });

                let result = self
                    .gc
                    .dispatch(active, decision.tool, &decision.params)
                    .await;

                if let (Some(audit), Some(id)) = (&self.audit, audit_game_id) {
                    let _ = audit
                        .record_agent_action(
                            id,
                            self.gc.state.turn_count,
                            active,
                            action_seq_this_turn,
                            &view,
                            &decision.audit,
                            &result,
                        )
                        .await;
                }

                self.gc.emit(ServerEvent::PlayerStateUpdate {
                    data: self.gc.state_view_for(active),
                });

                if decision.tool == ToolKind::RollDice && result.is_ok() && active == main_player {
                    rolled_this_main_segment = true;
                }

                // An error ends the segment so a confused agent cannot spin
                if !result.is_ok() {
                    break;
                }

                if self.segment_ends(decision.tool, active) {
                    break;
                }
            }

            if self.gc.state.game_over {
                break;
            }

            // === Segment finished: auction continuation, bonus or next turn ===
            if self.gc.state.auction.is_some() {
                // The pending slot already points at the next bidder
                continue;
            }

            let main = self.gc.state.current_player_index;
            if self.gc.state.players[main].is_bankrupt {
                self.gc.advance_turn();
            } else if matches!(
                self.gc.state.pending_decision,
                Some(PendingDecision::RespondToTrade { .. })
                    | Some(PendingDecision::ProposeAfterRejection { .. })
                    | Some(PendingDecision::AssetLiquidation { .. })
                    | Some(PendingDecision::HandleReceivedMortgaged { .. })
            ) {
                // A cross-player negotiation or debt workout holds the turn
                continue;
            } else if active == main {
                let (d1, d2) = self.gc.state.dice;
                let doubles_bonus = rolled_this_main_segment
                    && d1 == d2
                    && d1 != 0
                    && !self.gc.state.players[main].in_jail
                    && (1..=2).contains(&self.gc.state.doubles_streak);

                if doubles_bonus {
                    self.gc.emit(ServerEvent::BonusTurn {
                        player_id: main,
                        streak: self.gc.state.doubles_streak,
                    });
                    self.gc.resolve_segment();
                    self.gc.state.has_rolled_this_turn = false;
                    rolled_this_main_segment = false;
                    if let Some(task) = self.gc.state.players[main].pending_mortgaged.first() {
                        let square_id = task.square_id;
                        self.gc.set_pending(
                            PendingDecision::HandleReceivedMortgaged {
                                player: main,
                                square_id,
                            },
                            true,
                        );
                    }
                } else {
                    self.gc.advance_turn();
                    self.notify_lobby_status();
                }
            }
            // Otherwise an out-of-turn segment resolved with nothing pending;
            // control falls back to the main player on the next iteration.
        }

        // === Game finished ===
        if loop_count >= MAX_TURNS && !self.gc.state.game_over {
            self.gc.state.game_over = true;
            self.gc.state.status = GameStatus::MaxTurnsReached;
        } else if self.gc.state.winner.is_some() {
            self.gc.state.status = GameStatus::Completed;
        } else {
            self.gc.state.status = GameStatus::AbortedNoWinner;
        }

        let summary = self.gc.summary();
        self.gc.emit(ServerEvent::GameSummaryData {
            summary: summary.clone(),
        });
        self.gc.emit(ServerEvent::GameEndLog {
            message: format!("Game {} finished", game_uid),
        });
        self.notify_lobby_status();

        if let (Some(audit), Some(id)) = (&self.audit, audit_game_id) {
            let mut ranked: Vec<&crate::game::Player> = self.gc.state.players.iter().collect();
            ranked.sort_by_key(|p| (p.is_bankrupt, -p.cash));
            let final_balances: Vec<(PlayerId, i64, usize)> = ranked
                .iter()
                .enumerate()
                .map(|(rank, p)| (p.id, p.cash, rank + 1))
                .collect();
            let _ = audit
                .record_game_end(id, self.gc.state.status, self.gc.state.winner, &final_balances)
                .await;
        }

        GameOutcome {
            status: self.gc.state.status,
            winner: self.gc.state.winner,
            turns: self.gc.state.turn_count,
        }
    }

    /// Segment termination rules, applied after a successful dispatch
    fn segment_ends(&self, tool: ToolKind, active: PlayerId) -> bool {
        let state = &self.gc.state;
        match tool {
            // A roll whose outcome fully resolved leaves nothing to decide
            ToolKind::RollDice => {
                state.pending_decision.is_none() && state.dice_outcome_processed
            }
            ToolKind::RollForDoubles => {
                // Forced bail on the third attempt releases the player with
                // their movement roll still due
                if !state.players[active].in_jail && !state.has_rolled_this_turn {
                    false
                } else {
                    state.pending_decision.is_none() && state.dice_outcome_processed
                }
            }
            ToolKind::BuyProperty => {
                state.pending_decision.is_none() && state.dice_outcome_processed
            }
            ToolKind::PassOnBuying => true,
            ToolKind::EndTurn | ToolKind::Resign => true,
            ToolKind::BidOnAuction | ToolKind::PassAuctionBid => true,
            ToolKind::ProposeTrade
            | ToolKind::AcceptTrade
            | ToolKind::RejectTrade
            | ToolKind::CounterTrade
            | ToolKind::EndNegotiation => true,
            ToolKind::ConfirmLiquidationDone => true,
            ToolKind::Wait | ToolKind::DoNothing => true,
            // Asset management keeps the segment open while meaningful
            // options remain
            _ => {
                let remaining = self.gc.available_actions(active);
                remaining.is_empty() || remaining.iter().all(|t| is_trivial_tool(*t))
            }
        }
    }

    fn notify_lobby_status(&self) {
        let _ = self.lobby.send(LobbyEvent::GameStatusUpdate {
            game_uid: self.gc.state.game_uid.clone(),
            status: self.gc.state.status,
            turn_count: self.gc.state.turn_count,
            winner: self.gc.state.winner,
        });
    }
}
