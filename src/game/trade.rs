//! Trade negotiation: offers, counter-offers, the rejection cap, and asset
//! swaps whose money legs settle through the payment orchestrator.

use serde_json::Value;

use super::board;
use super::controller::{ActionResult, GameController};
use super::payment::PaymentOrchestrator;
use super::state::{
    MortgagedTask, PendingDecision, PlayerId, TradeItem, TradeOffer, TradeStatus,
    MAX_TRADE_REJECTIONS,
};

/// Flat parameter form of one trade side, as agents submit it
#[derive(Debug, Clone, Default)]
pub struct TradeSideParams {
    pub property_ids: Vec<u8>,
    pub money: i64,
    pub gooj_cards: u8,
}

impl TradeSideParams {
    fn from_params(params: &Value, prefix: &str) -> Self {
        let property_ids = params
            .get(format!("{prefix}_property_ids"))
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_u64)
                    .filter(|&v| v < board::BOARD_SIZE as u64)
                    .map(|v| v as u8)
                    .collect()
            })
            .unwrap_or_default();
        let money = params
            .get(format!("{prefix}_money"))
            .and_then(Value::as_i64)
            .unwrap_or(0);
        let gooj_cards = params
            .get(format!("{prefix}_gooj_cards"))
            .and_then(Value::as_u64)
            .unwrap_or(0) as u8;
        Self {
            property_ids,
            money,
            gooj_cards,
        }
    }

    fn into_items(self) -> Vec<TradeItem> {
        let mut items: Vec<TradeItem> = self
            .property_ids
            .into_iter()
            .map(|square_id| TradeItem::Property { square_id })
            .collect();
        if self.money > 0 {
            items.push(TradeItem::Money { amount: self.money });
        }
        if self.gooj_cards > 0 {
            items.push(TradeItem::GoojCard {
                count: self.gooj_cards,
            });
        }
        items
    }
}

pub struct TradeManager;

impl TradeManager {
    /// Propose a trade from agent-supplied parameters
    pub fn propose_from_params(
        gc: &mut GameController,
        proposer: PlayerId,
        params: &Value,
    ) -> ActionResult {
        let Some(recipient) = params.get("recipient_id").and_then(Value::as_u64) else {
            return ActionResult::error("missing recipient_id parameter");
        };
        let recipient = recipient as usize;
        let offered = TradeSideParams::from_params(params, "offered");
        let requested = TradeSideParams::from_params(params, "requested");
        let message = params
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string);

        Self::propose(gc, proposer, recipient, offered, requested, message, None)
    }

    /// Create a trade offer and hand the decision slot to the recipient
    #[allow(clippy::too_many_arguments)]
    pub fn propose(
        gc: &mut GameController,
        proposer: PlayerId,
        recipient: PlayerId,
        offered: TradeSideParams,
        requested: TradeSideParams,
        message: Option<String>,
        counter_of: Option<u64>,
    ) -> ActionResult {
        if recipient >= gc.state.players.len() {
            return ActionResult::error("unknown recipient");
        }
        if proposer == recipient {
            return ActionResult::error("cannot trade with yourself");
        }
        if gc.state.players[proposer].is_bankrupt || gc.state.players[recipient].is_bankrupt {
            return ActionResult::error("bankrupt players cannot trade");
        }

        // Negotiation lock: a re-proposal after rejection must go to the same
        // recipient, and the inherited rejection count carries over.
        let mut inherited_rejections = 0;
        if let Some(PendingDecision::ProposeAfterRejection {
            player,
            rejected_trade_id,
            rejection_count,
        }) = gc.state.pending_decision
        {
            if player == proposer {
                let original_recipient = gc
                    .state
                    .trades
                    .get(&rejected_trade_id)
                    .map(|t| t.recipient);
                if original_recipient != Some(recipient) {
                    return ActionResult::error(
                        "negotiation in progress - new offers must go to the same player",
                    );
                }
                if rejection_count >= MAX_TRADE_REJECTIONS {
                    return ActionResult::error("negotiation rejection limit reached");
                }
                inherited_rejections = rejection_count;
            }
        }

        if let Err(msg) = Self::validate_side(gc, proposer, &offered) {
            return ActionResult::error(format!("offered items invalid: {msg}"));
        }
        if let Err(msg) = Self::validate_side(gc, recipient, &requested) {
            return ActionResult::error(format!("requested items invalid: {msg}"));
        }

        let trade_id = gc.state.next_trade_id;
        gc.state.next_trade_id += 1;

        let offer = TradeOffer {
            id: trade_id,
            proposer,
            recipient,
            offered: offered.into_items(),
            requested: requested.into_items(),
            status: TradeStatus::Pending,
            counter_of,
            turn_proposed: gc.state.turn_count,
            message: message.clone(),
            rejection_count: inherited_rejections,
        };
        gc.state.trades.insert(trade_id, offer);

        let proposer_name = gc.state.players[proposer].name.clone();
        let recipient_name = gc.state.players[recipient].name.clone();
        gc.state.log(format!(
            "{} proposed trade {} to {}",
            proposer_name, trade_id, recipient_name
        ));
        if let Some(msg) = message {
            gc.state.log(format!("Trade {} message: {}", trade_id, msg));
        }

        gc.set_pending(
            PendingDecision::RespondToTrade {
                player: recipient,
                trade_id,
            },
            false,
        );
        ActionResult::ok(format!("trade {} proposed", trade_id))
    }

    /// Accept: re-validate both sides, settle money legs, then swap assets
    pub async fn accept(
        gc: &mut GameController,
        player_id: PlayerId,
        params: &Value,
    ) -> ActionResult {
        let Some(offer) = Self::offer_for_response(gc, player_id, params) else {
            return ActionResult::error("no matching trade offer awaiting your response");
        };
        let trade_id = offer.id;
        let proposer = offer.proposer;
        let recipient = offer.recipient;
        let offered = offer.offered.clone();
        let requested = offer.requested.clone();

        // Conditions may have changed since the proposal
        let offered_ok = Self::validate_items(gc, proposer, &offered);
        let requested_ok = Self::validate_items(gc, recipient, &requested);
        if offered_ok.is_err() || requested_ok.is_err() {
            gc.state.trades.get_mut(&trade_id).unwrap().status = TradeStatus::FailedPayment;
            gc.state
                .log(format!("Trade {} is no longer valid and was cancelled", trade_id));
            gc.resolve_segment();
            return ActionResult::error("trade no longer valid");
        }

        // Money legs first; any failure aborts the swap entirely
        for (payer, payee, items) in [
            (proposer, recipient, &offered),
            (recipient, proposer, &requested),
        ] {
            for item in items {
                if let TradeItem::Money { amount } = item {
                    let outcome = PaymentOrchestrator::pay_player_to_player(
                        gc,
                        payer,
                        payee,
                        *amount,
                        &format!("trade {} money leg", trade_id),
                        Some(serde_json::json!({ "trade_id": trade_id })),
                    )
                    .await;
                    if !outcome.is_settled() {
                        gc.state.trades.get_mut(&trade_id).unwrap().status =
                            TradeStatus::FailedPayment;
                        gc.state.log(format!(
                            "Trade {} aborted - money leg failed to settle",
                            trade_id
                        ));
                        gc.resolve_segment();
                        return ActionResult::error("trade payment failed");
                    }
                }
            }
        }

        // Property and card transfers only happen once all money settled
        Self::transfer_items(gc, proposer, recipient, &offered, trade_id);
        Self::transfer_items(gc, recipient, proposer, &requested, trade_id);

        gc.state.trades.get_mut(&trade_id).unwrap().status = TradeStatus::Accepted;
        gc.state.log(format!("Trade {} accepted and executed", trade_id));
        gc.resolve_segment();

        // The current-turn player must deal with received mortgages at once
        let current = gc.state.current_player_index;
        if let Some(task) = gc.state.players[current].pending_mortgaged.first() {
            let square_id = task.square_id;
            gc.set_pending(
                PendingDecision::HandleReceivedMortgaged {
                    player: current,
                    square_id,
                },
                true,
            );
        }

        ActionResult::ok(format!("trade {} accepted", trade_id))
    }

    /// Reject: bump the negotiation counter; at the cap the negotiation dies,
    /// otherwise the proposer gets a re-proposal slot.
    pub fn reject(gc: &mut GameController, player_id: PlayerId, params: &Value) -> ActionResult {
        let Some(offer) = Self::offer_for_response(gc, player_id, params) else {
            return ActionResult::error("no matching trade offer awaiting your response");
        };
        let trade_id = offer.id;
        let proposer = offer.proposer;
        let new_count = offer.rejection_count + 1;

        {
            let offer = gc.state.trades.get_mut(&trade_id).unwrap();
            offer.status = TradeStatus::Rejected;
            offer.rejection_count = new_count;
        }
        let name = gc.state.players[player_id].name.clone();
        gc.state
            .log(format!("Trade {} rejected by {} ({} of {})", trade_id, name, new_count, MAX_TRADE_REJECTIONS));

        if new_count >= MAX_TRADE_REJECTIONS {
            gc.state
                .log(format!("Negotiation for trade {} terminated after {} rejections", trade_id, new_count));
            gc.resolve_segment();
        } else {
            gc.set_pending(
                PendingDecision::ProposeAfterRejection {
                    player: proposer,
                    rejected_trade_id: trade_id,
                    rejection_count: new_count,
                },
                false,
            );
        }
        ActionResult::ok(format!("trade {} rejected", trade_id))
    }

    /// Counter: a fresh offer with the roles swapped
    pub fn counter(gc: &mut GameController, player_id: PlayerId, params: &Value) -> ActionResult {
        let Some(offer) = Self::offer_for_response(gc, player_id, params) else {
            return ActionResult::error("no matching trade offer awaiting your response");
        };
        let trade_id = offer.id;
        let original_proposer = offer.proposer;

        let offered = TradeSideParams::from_params(params, "offered");
        let requested = TradeSideParams::from_params(params, "requested");
        let message = params
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string);

        let result = Self::propose(
            gc,
            player_id,
            original_proposer,
            offered,
            requested,
            message,
            Some(trade_id),
        );
        if result.is_ok() {
            gc.state.trades.get_mut(&trade_id).unwrap().status = TradeStatus::Countered;
            let name = gc.state.players[player_id].name.clone();
            gc.state
                .log(format!("Trade {} countered by {}", trade_id, name));
        }
        result
    }

    /// The proposer walks away from the negotiation
    pub fn end_negotiation(gc: &mut GameController, player_id: PlayerId) -> ActionResult {
        if let Some(PendingDecision::ProposeAfterRejection {
            player,
            rejected_trade_id,
            ..
        }) = gc.state.pending_decision
        {
            if player == player_id {
                if let Some(offer) = gc.state.trades.get_mut(&rejected_trade_id) {
                    if !offer.status.is_terminal() || offer.status == TradeStatus::Rejected {
                        offer.status = TradeStatus::Terminated;
                    }
                }
            }
        }
        let name = gc.state.players[player_id].name.clone();
        gc.state.log(format!("{} ended the trade negotiation", name));
        gc.resolve_segment();
        ActionResult::ok("negotiation ended")
    }

    // === Internals ===

    fn offer_for_response(
        gc: &GameController,
        player_id: PlayerId,
        params: &Value,
    ) -> Option<TradeOffer> {
        let pending_trade_id = match gc.state.pending_decision {
            Some(PendingDecision::RespondToTrade { player, trade_id }) if player == player_id => {
                trade_id
            }
            _ => return None,
        };
        // An explicit trade_id must match the one actually pending
        if let Some(requested) = params.get("trade_id").and_then(Value::as_u64) {
            if requested != pending_trade_id {
                return None;
            }
        }
        gc.state
            .trades
            .get(&pending_trade_id)
            .filter(|o| o.status == TradeStatus::Pending)
            .cloned()
    }

    fn validate_side(
        gc: &GameController,
        player_id: PlayerId,
        side: &TradeSideParams,
    ) -> Result<(), String> {
        let player = &gc.state.players[player_id];
        for &square_id in &side.property_ids {
            if !player.owned.contains(&square_id) {
                return Err(format!("{} does not own square {}", player.name, square_id));
            }
            if gc.state.group_has_houses(square_id) {
                return Err(format!(
                    "square {} is in a color group with houses and cannot be traded",
                    square_id
                ));
            }
        }
        if side.money > 0 && player.cash < side.money {
            return Err(format!("{} cannot cover ${}", player.name, side.money));
        }
        if side.gooj_cards > player.gooj_card_count() {
            return Err(format!("{} lacks the offered cards", player.name));
        }
        Ok(())
    }

    fn validate_items(
        gc: &GameController,
        player_id: PlayerId,
        items: &[TradeItem],
    ) -> Result<(), String> {
        let mut side = TradeSideParams::default();
        for item in items {
            match item {
                TradeItem::Property { square_id } => side.property_ids.push(*square_id),
                TradeItem::Money { amount } => side.money += amount,
                TradeItem::GoojCard { count } => side.gooj_cards += count,
            }
        }
        Self::validate_side(gc, player_id, &side)
    }

    /// Move properties and cards from one side to the other. Money legs have
    /// already settled by the time this runs.
    fn transfer_items(
        gc: &mut GameController,
        from: PlayerId,
        to: PlayerId,
        items: &[TradeItem],
        trade_id: u64,
    ) {
        for item in items {
            match item {
                TradeItem::Property { square_id } => {
                    let square_id = *square_id;
                    let mortgaged = gc
                        .state
                        .tile(square_id)
                        .map(|t| t.is_mortgaged)
                        .unwrap_or(false);
                    if let Some(tile) = gc.state.tile_mut(square_id) {
                        tile.owner = Some(to);
                    }
                    gc.state.players[from].owned.remove(&square_id);
                    gc.state.players[to].owned.insert(square_id);
                    if mortgaged {
                        gc.state.players[to].pending_mortgaged.push(MortgagedTask {
                            square_id,
                            source_trade: Some(trade_id),
                        });
                    }
                    let square_name = board::get_square(square_id)
                        .map(|s| s.name.clone())
                        .unwrap_or_default();
                    let to_name = gc.state.players[to].name.clone();
                    gc.state.log(format!(
                        "Trade {}: {} transferred to {}",
                        trade_id, square_name, to_name
                    ));
                }
                TradeItem::GoojCard { count } => {
                    for _ in 0..*count {
                        // The giver's Surprise card moves first when both are held
                        let moved = if gc.state.players[from].gooj_chance {
                            gc.state.players[from].gooj_chance = false;
                            gc.state.players[to].gooj_chance = true;
                            true
                        } else if gc.state.players[from].gooj_community {
                            gc.state.players[from].gooj_community = false;
                            gc.state.players[to].gooj_community = true;
                            true
                        } else {
                            false
                        };
                        if !moved {
                            break;
                        }
                    }
                }
                TradeItem::Money { .. } => {}
            }
        }
    }
}
