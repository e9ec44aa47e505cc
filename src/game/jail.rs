//! Jail mechanics: entry at the start of a turn, and the three ways out

use rand::Rng;

use super::bankruptcy::BankruptcyManager;
use super::board::BAIL_AMOUNT;
use super::controller::{ActionResult, GameController};
use super::payment::PaymentOrchestrator;
use super::state::{PendingDecision, PlayerId};

pub struct JailManager;

impl JailManager {
    /// Raise the jail-options slot at the start of a jailed player's turn
    pub fn begin_jail_turn(gc: &mut GameController, player_id: PlayerId) {
        let player = &gc.state.players[player_id];
        if !player.is_bankrupt && player.in_jail {
            let decision = PendingDecision::JailOptions {
                player: player_id,
                attempts: player.jail_turns_attempted,
                can_use_card: player.has_gooj_card(),
                can_pay_bail: player.cash >= BAIL_AMOUNT,
            };
            let name = player.name.clone();
            let attempts = player.jail_turns_attempted;
            gc.state
                .log(format!("{} is in prison (attempts so far: {})", name, attempts));
            gc.set_pending(decision, false);
        }
    }

    pub async fn roll_for_doubles(gc: &mut GameController, player_id: PlayerId) -> ActionResult {
        let (d1, d2) = {
            let mut rng = rand::thread_rng();
            (rng.gen_range(1..=6), rng.gen_range(1..=6))
        };
        Self::roll_for_doubles_with(gc, player_id, d1, d2).await
    }

    /// Deterministic core of the jail roll
    pub async fn roll_for_doubles_with(
        gc: &mut GameController,
        player_id: PlayerId,
        d1: u8,
        d2: u8,
    ) -> ActionResult {
        if !gc.state.players[player_id].in_jail {
            return ActionResult::error("player is not in prison");
        }

        gc.state.players[player_id].jail_turns_attempted += 1;
        gc.state.dice = (d1, d2);
        let name = gc.state.players[player_id].name.clone();

        if d1 == d2 {
            gc.state.players[player_id].leave_jail();
            // A release roll never grants a bonus segment
            gc.state.doubles_streak = 0;
            gc.state
                .log(format!("{} rolled doubles ({}, {}) and escaped prison!", name, d1, d2));
            gc.state.dice_outcome_processed = false;
            gc.state.has_rolled_this_turn = true;
            gc.clear_pending();
            gc.move_player(player_id, (d1 + d2) as i16).await;
            let mut result = ActionResult::ok("doubles - released and moved");
            result.dice = Some((d1, d2));
            return result;
        }

        let attempts = gc.state.players[player_id].jail_turns_attempted;
        gc.state.log(format!(
            "{} rolled ({}, {}) - no doubles, attempt {}/3",
            name, d1, d2, attempts
        ));

        if attempts >= 3 {
            // Out of attempts: bail is mandatory in the same segment
            return Self::pay_bail(gc, player_id, true).await;
        }

        gc.resolve_segment();
        let mut result = ActionResult::ok("no doubles - still in prison");
        result.dice = Some((d1, d2));
        result
    }

    /// Pay the $50 bail. When `forced`, a failed payment routes straight to
    /// the bankruptcy path.
    pub async fn pay_bail(
        gc: &mut GameController,
        player_id: PlayerId,
        forced: bool,
    ) -> ActionResult {
        if !gc.state.players[player_id].in_jail {
            return ActionResult::error("player is not in prison");
        }
        // Bail stops being optional once the release rolls are used up
        let forced = forced || gc.state.players[player_id].jail_turns_attempted >= 3;

        let outcome =
            PaymentOrchestrator::pay_player_to_system(gc, player_id, BAIL_AMOUNT, "prison bail")
                .await;

        if outcome.is_settled() {
            gc.state.players[player_id].leave_jail();
            let name = gc.state.players[player_id].name.clone();
            gc.state
                .log(format!("{} paid ${} bail and is free", name, BAIL_AMOUNT));
            // Segment stays open: the player may now roll normally
            gc.resolve_segment();
            ActionResult::ok("bail paid - released")
        } else if forced {
            BankruptcyManager::check(gc, player_id, BAIL_AMOUNT, None).await;
            ActionResult::ok("could not pay mandatory bail - insolvency handling started")
        } else {
            ActionResult::error("bail payment failed")
        }
    }

    pub fn use_card(gc: &mut GameController, player_id: PlayerId) -> ActionResult {
        if !gc.state.players[player_id].in_jail {
            return ActionResult::error("player is not in prison");
        }
        match gc.state.players[player_id].use_gooj_card() {
            Some(deck) => {
                let name = gc.state.players[player_id].name.clone();
                gc.state.log(format!(
                    "{} used a {} Get Out of Prison Free card",
                    name,
                    deck.label()
                ));
                gc.resolve_segment();
                ActionResult::ok("card used - released")
            }
            None => ActionResult::error("no Get Out of Prison Free card held"),
        }
    }
}
