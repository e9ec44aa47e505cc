//! Insolvency handling: liquidation window, then final bankruptcy with
//! asset transfer to the creditor or back to the bank.

use super::board;
use super::controller::{ActionResult, GameController};
use super::payment::PaymentOrchestrator;
use super::state::{MortgagedTask, PendingDecision, PlayerId};

pub struct BankruptcyManager;

impl BankruptcyManager {
    /// Entry point for every unmet debt. Decides between immediate
    /// bankruptcy, a liquidation window, or nothing (payer was solvent).
    pub async fn check(
        gc: &mut GameController,
        player_id: PlayerId,
        debt: i64,
        creditor: Option<PlayerId>,
    ) {
        if gc.state.players[player_id].is_bankrupt {
            return;
        }

        let total_assets = Self::total_asset_value(gc, player_id);
        let cash = gc.state.players[player_id].cash;
        let name = gc.state.players[player_id].name.clone();

        if total_assets < debt {
            gc.state.log(format!(
                "{} cannot cover ${} even by liquidating everything (${})",
                name, debt, total_assets
            ));
            Self::finalize(gc, player_id, creditor).await;
        } else if cash < debt {
            gc.state.log(format!(
                "{} must liquidate assets to cover a ${} debt",
                name, debt
            ));
            gc.set_pending(
                PendingDecision::AssetLiquidation {
                    player: player_id,
                    debt,
                    creditor,
                },
                false,
            );
        }
        // Sufficient cash means the payment should simply have been retried
        // by the caller; nothing to do here.
    }

    /// Cash plus everything the player could raise: mortgage values of
    /// unmortgaged holdings and half-price house sales.
    pub fn total_asset_value(gc: &GameController, player_id: PlayerId) -> i64 {
        let player = &gc.state.players[player_id];
        let mut total = player.cash;
        for &square_id in &player.owned {
            let Some(square) = board::get_square(square_id) else {
                continue;
            };
            let Some(tile) = gc.state.tile(square_id) else {
                continue;
            };
            if !tile.is_mortgaged {
                total += square.mortgage_value().unwrap_or(0);
            }
            if tile.houses > 0 {
                total += tile.houses as i64 * square.house_price().unwrap_or(0) / 2;
            }
        }
        total
    }

    /// The debtor says liquidation is over: settle the debt if the cash is
    /// now there, otherwise finalize the bankruptcy.
    pub async fn confirm_liquidation_done(
        gc: &mut GameController,
        player_id: PlayerId,
    ) -> ActionResult {
        let (debt, creditor) = match gc.state.pending_decision {
            Some(PendingDecision::AssetLiquidation {
                player,
                debt,
                creditor,
            }) if player == player_id => (debt, creditor),
            _ => return ActionResult::error("no liquidation in progress for this player"),
        };

        if gc.state.players[player_id].cash >= debt {
            let outcome = match creditor {
                Some(creditor_id) => {
                    PaymentOrchestrator::pay_player_to_player(
                        gc,
                        player_id,
                        creditor_id,
                        debt,
                        "debt settlement after liquidation",
                        None,
                    )
                    .await
                }
                None => {
                    PaymentOrchestrator::pay_player_to_system(
                        gc,
                        player_id,
                        debt,
                        "debt settlement after liquidation",
                    )
                    .await
                }
            };

            if outcome.is_settled() {
                let name = gc.state.players[player_id].name.clone();
                gc.state
                    .log(format!("{} settled the ${} debt after liquidation", name, debt));
                gc.resolve_segment();
                return ActionResult::ok("debt settled");
            }
            // Settlement failed even with the cash on hand
            Self::finalize(gc, player_id, creditor).await;
            return ActionResult::ok("debt payment failed - bankruptcy finalized");
        }

        let name = gc.state.players[player_id].name.clone();
        let cash = gc.state.players[player_id].cash;
        gc.state.log(format!(
            "{} still cannot cover ${} (has ${}) - bankruptcy",
            name, debt, cash
        ));
        Self::finalize(gc, player_id, creditor).await;
        ActionResult::ok("liquidation insufficient - bankruptcy finalized")
    }

    /// The active player gives up; treated as bankruptcy to the bank
    pub async fn resign(gc: &mut GameController, player_id: PlayerId) -> ActionResult {
        let name = gc.state.players[player_id].name.clone();
        gc.state.log(format!("{} resigned from the game", name));
        Self::finalize(gc, player_id, None).await;
        ActionResult::ok("resigned")
    }

    /// Mark the player bankrupt and transfer the estate. Creditor keeps
    /// mortgage flags (and inherits the handling duty); the bank clears them.
    pub async fn finalize(gc: &mut GameController, player_id: PlayerId, creditor: Option<PlayerId>) {
        if gc.state.players[player_id].is_bankrupt {
            return;
        }

        let name = gc.state.players[player_id].name.clone();
        gc.state.log(format!("{} is declared BANKRUPT!", name));
        gc.state.players[player_id].is_bankrupt = true;

        let owned: Vec<u8> = gc.state.players[player_id].owned.iter().copied().collect();
        match creditor {
            Some(creditor_id) => {
                for square_id in owned {
                    let mortgaged = gc
                        .state
                        .tile(square_id)
                        .map(|t| t.is_mortgaged)
                        .unwrap_or(false);
                    if let Some(tile) = gc.state.tile_mut(square_id) {
                        tile.owner = Some(creditor_id);
                    }
                    gc.state.players[player_id].owned.remove(&square_id);
                    gc.state.players[creditor_id].owned.insert(square_id);
                    if mortgaged {
                        gc.state.players[creditor_id]
                            .pending_mortgaged
                            .push(MortgagedTask {
                                square_id,
                                source_trade: None,
                            });
                    }
                }

                // Remaining cash follows the estate
                let remaining = gc.state.players[player_id].cash;
                if remaining > 0 {
                    let outcome = PaymentOrchestrator::pay_player_to_player(
                        gc,
                        player_id,
                        creditor_id,
                        remaining,
                        "bankruptcy estate transfer",
                        None,
                    )
                    .await;
                    if !outcome.is_settled() {
                        let name = gc.state.players[player_id].name.clone();
                        gc.state
                            .log(format!("Estate cash transfer from {} failed", name));
                    }
                }

                // Cards go to the creditor as well
                if gc.state.players[player_id].gooj_chance {
                    gc.state.players[player_id].gooj_chance = false;
                    gc.state.players[creditor_id].gooj_chance = true;
                }
                if gc.state.players[player_id].gooj_community {
                    gc.state.players[player_id].gooj_community = false;
                    gc.state.players[creditor_id].gooj_community = true;
                }

                let creditor_name = gc.state.players[creditor_id].name.clone();
                gc.state
                    .log(format!("All assets transferred to {}", creditor_name));
            }
            None => {
                for square_id in owned {
                    if let Some(tile) = gc.state.tile_mut(square_id) {
                        tile.owner = None;
                        tile.houses = 0;
                        tile.is_mortgaged = false;
                    }
                    gc.state.players[player_id].owned.remove(&square_id);
                }
                gc.state.players[player_id].gooj_chance = false;
                gc.state.players[player_id].gooj_community = false;
                gc.state.log("Assets returned to the bank".to_string());
            }
        }

        let player = &mut gc.state.players[player_id];
        player.cash = 0;
        player.pending_mortgaged.clear();
        player.in_jail = false;

        gc.check_game_over();
        if !gc.state.game_over {
            gc.resolve_segment();
        }
    }
}
