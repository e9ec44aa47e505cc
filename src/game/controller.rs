//! Game controller - owns the canonical state, routes every agent tool call
//! through a single dispatcher, and runs the dice/landing pipeline.

use std::sync::Arc;

use futures::future::BoxFuture;
use rand::Rng;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::auction::AuctionManager;
use super::bankruptcy::BankruptcyManager;
use super::board::{self, SquareKind, BOARD, GO_SALARY};
use super::cards::{Card, CardEffect, Deck, DeckKind};
use super::events::{LogLevel, ServerEvent};
use super::jail::JailManager;
use super::payment::PaymentOrchestrator;
use super::property::PropertyManager;
use super::state::*;
use super::tools::ToolKind;
use super::trade::TradeManager;
use crate::ledger::LedgerService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStatus {
    Success,
    Error,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Success => "success",
            ActionStatus::Error => "error",
        }
    }
}

/// Result of one dispatched tool call
#[derive(Debug, Clone)]
pub struct ActionResult {
    pub status: ActionStatus,
    pub message: String,
    pub dice: Option<(u8, u8)>,
    pub went_to_jail: bool,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Success,
            message: message.into(),
            dice: None,
            went_to_jail: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Error,
            message: message.into(),
            dice: None,
            went_to_jail: false,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ActionStatus::Success
    }
}

/// Rent modifier forced by a drawn card, consumed at the next landing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ForcedRent {
    DoubleRailroad,
    UtilityTenTimesDice,
}

pub struct GameController {
    pub state: GameState,
    pub ledger: Arc<dyn LedgerService>,
    pub treasury_account: String,
    pub asset: String,
    pub network: String,
    chance_deck: Deck,
    community_deck: Deck,
    events: mpsc::UnboundedSender<ServerEvent>,
    pub(crate) forced_rent: Option<ForcedRent>,
}

impl GameController {
    pub fn new(
        game_uid: String,
        players: Vec<Player>,
        ledger: Arc<dyn LedgerService>,
        treasury_account: String,
        asset: String,
        network: String,
        events: mpsc::UnboundedSender<ServerEvent>,
    ) -> Self {
        let mut rng = rand::thread_rng();
        Self {
            state: GameState::new(game_uid, players),
            ledger,
            treasury_account,
            asset,
            network,
            chance_deck: Deck::chance(&mut rng),
            community_deck: Deck::community_chest(&mut rng),
            events,
            forced_rent: None,
        }
    }

    // === Event emission ===

    pub fn emit(&self, event: ServerEvent) {
        let _ = self.events.send(event);
    }

    pub fn emit_log(&self, level: LogLevel, message: impl Into<String>) {
        self.emit(ServerEvent::Log {
            level,
            message: message.into(),
        });
    }

    // === State manager operations ===

    pub fn set_pending(&mut self, decision: PendingDecision, outcome_processed: bool) {
        tracing::debug!(
            game_uid = %self.state.game_uid,
            kind = decision.kind_name(),
            player = decision.player(),
            "pending decision set"
        );
        self.state.pending_decision = Some(decision);
        self.state.dice_outcome_processed = outcome_processed;
    }

    pub fn clear_pending(&mut self) {
        self.state.pending_decision = None;
    }

    /// Clear the pending slot and mark the dice outcome processed
    pub fn resolve_segment(&mut self) {
        self.state.dice_outcome_processed = true;
        self.state.pending_decision = None;
    }

    pub fn game_phase(&self) -> String {
        if self.state.game_over {
            return "game_over".into();
        }
        if let Some(d) = &self.state.pending_decision {
            return format!("pending_{}", d.kind_name());
        }
        if !self.state.dice_outcome_processed {
            return "processing_dice_outcome".into();
        }
        "normal_turn".into()
    }

    /// Rotate to the next non-bankrupt player and run start-of-turn checks
    pub fn advance_turn(&mut self) {
        self.check_game_over();
        if self.state.game_over {
            return;
        }

        let original = self.state.current_player_index;
        let n = self.state.players.len();
        for _ in 0..n {
            self.state.current_player_index = (self.state.current_player_index + 1) % n;
            if !self.state.players[self.state.current_player_index].is_bankrupt {
                break;
            }
        }

        if self.state.current_player_index <= original {
            self.state.turn_count += 1;
        }
        self.state.doubles_streak = 0;
        self.state.dice = (0, 0);
        self.state.has_rolled_this_turn = false;
        self.resolve_segment();

        let player_id = self.state.current_player_index;
        let name = self.state.players[player_id].name.clone();
        self.state
            .log(format!("--- {}'s turn begins (turn {}) ---", name, self.state.turn_count));

        self.begin_turn_checks(player_id);
    }

    /// Start-of-turn conditions in priority order: received-mortgaged tasks,
    /// then jail, else the segment is open for a dice roll.
    pub fn begin_turn_checks(&mut self, player_id: PlayerId) {
        let player = &self.state.players[player_id];
        if let Some(task) = player.pending_mortgaged.first() {
            let square_id = task.square_id;
            self.set_pending(
                PendingDecision::HandleReceivedMortgaged {
                    player: player_id,
                    square_id,
                },
                false,
            );
        } else if player.in_jail {
            JailManager::begin_jail_turn(self, player_id);
        } else {
            self.resolve_segment();
        }
    }

    /// Whenever active players drop to one or zero the game ends
    pub fn check_game_over(&mut self) {
        if self.state.game_over {
            return;
        }
        let active: Vec<PlayerId> = self
            .state
            .players
            .iter()
            .filter(|p| !p.is_bankrupt)
            .map(|p| p.id)
            .collect();
        if active.len() <= 1 {
            self.state.game_over = true;
            self.state.winner = active.first().copied();
            self.state.pending_decision = None;
            self.state.dice_outcome_processed = true;
            let message = match self.state.winner {
                Some(id) => format!("Game over! {} wins!", self.state.players[id].name),
                None => "Game over! No players remaining.".to_string(),
            };
            self.state.log(message);
        }
    }

    // === Action enumeration ===

    /// Legal tools for a player, derived from the pending decision slot or
    /// the general turn phase. Non-active players only ever see `wait`.
    pub fn available_actions(&self, player_id: PlayerId) -> Vec<ToolKind> {
        let Some(player) = self.state.player(player_id) else {
            return vec![];
        };
        if player.is_bankrupt || self.state.game_over {
            return vec![];
        }

        if let Some(decision) = &self.state.pending_decision {
            if decision.player() != player_id {
                return vec![ToolKind::Wait];
            }
            return match decision {
                PendingDecision::BuyOrAuction { .. } => {
                    vec![ToolKind::BuyProperty, ToolKind::PassOnBuying]
                }
                PendingDecision::AuctionBid { .. } => {
                    vec![ToolKind::BidOnAuction, ToolKind::PassAuctionBid]
                }
                PendingDecision::JailOptions { attempts, .. } => {
                    let mut actions = Vec::new();
                    if player.has_gooj_card() {
                        actions.push(ToolKind::UseGoojCard);
                    }
                    if player.cash >= board::BAIL_AMOUNT {
                        actions.push(ToolKind::PayBail);
                    }
                    if *attempts < 3 {
                        actions.push(ToolKind::RollForDoubles);
                    }
                    if actions.is_empty() {
                        // Broke, cardless and out of rolls: liquidate or fold
                        if self.player_can_mortgage_any(player_id) {
                            actions.push(ToolKind::MortgageProperty);
                        }
                        if self.player_can_sell_any_house(player_id) {
                            actions.push(ToolKind::SellHouse);
                        }
                        actions.push(ToolKind::PayBail);
                    }
                    actions
                }
                PendingDecision::AssetLiquidation { .. } => {
                    let mut actions = Vec::new();
                    if self.player_can_sell_any_house(player_id) {
                        actions.push(ToolKind::SellHouse);
                    }
                    if self.player_can_mortgage_any(player_id) {
                        actions.push(ToolKind::MortgageProperty);
                    }
                    actions.push(ToolKind::ConfirmLiquidationDone);
                    actions
                }
                PendingDecision::RespondToTrade { .. } => vec![
                    ToolKind::AcceptTrade,
                    ToolKind::RejectTrade,
                    ToolKind::CounterTrade,
                ],
                PendingDecision::ProposeAfterRejection { rejection_count, .. } => {
                    let mut actions = Vec::new();
                    if *rejection_count < MAX_TRADE_REJECTIONS {
                        actions.push(ToolKind::ProposeTrade);
                    }
                    actions.push(ToolKind::EndNegotiation);
                    actions
                }
                PendingDecision::HandleReceivedMortgaged { .. } => {
                    vec![ToolKind::PayMortgageFee, ToolKind::UnmortgageReceived]
                }
            };
        }

        if player_id != self.state.current_player_index {
            return vec![ToolKind::Wait];
        }

        if player.in_jail {
            // Jail options are raised at turn start; reaching here means the
            // slot was cleared without release. Allow ending the turn only.
            return vec![ToolKind::EndTurn, ToolKind::Resign];
        }

        let mut actions = Vec::new();
        if self.state.dice_outcome_processed && !self.state.has_rolled_this_turn {
            actions.push(ToolKind::RollDice);
        }
        if self.player_can_build_any(player_id) {
            actions.push(ToolKind::BuildHouse);
        }
        if self.player_can_sell_any_house(player_id) {
            actions.push(ToolKind::SellHouse);
        }
        if self.player_can_mortgage_any(player_id) {
            actions.push(ToolKind::MortgageProperty);
        }
        if self.player_can_unmortgage_any(player_id) {
            actions.push(ToolKind::UnmortgageProperty);
        }
        if self.state.active_player_count() > 1 {
            actions.push(ToolKind::ProposeTrade);
        }
        actions.push(ToolKind::EndTurn);
        actions.push(ToolKind::Resign);
        actions
    }

    fn player_can_build_any(&self, player_id: PlayerId) -> bool {
        let player = &self.state.players[player_id];
        player.owned.iter().any(|&idx| {
            let Some(sq) = board::get_square(idx) else {
                return false;
            };
            let Some(group) = sq.color_group() else {
                return false;
            };
            let Some(house_price) = sq.house_price() else {
                return false;
            };
            let Some(tile) = self.state.tile(idx) else {
                return false;
            };
            let (min, _) = self.state.group_house_range(group);
            self.state.owns_full_group_unmortgaged(player_id, group)
                && !tile.is_mortgaged
                && tile.houses < 5
                && tile.houses == min
                && player.cash >= house_price
        })
    }

    fn player_can_sell_any_house(&self, player_id: PlayerId) -> bool {
        self.state.players[player_id]
            .owned
            .iter()
            .any(|&idx| self.state.tile(idx).map(|t| t.houses > 0).unwrap_or(false))
    }

    fn player_can_mortgage_any(&self, player_id: PlayerId) -> bool {
        self.state.players[player_id].owned.iter().any(|&idx| {
            self.state
                .tile(idx)
                .map(|t| !t.is_mortgaged && !self.state.group_has_houses(idx))
                .unwrap_or(false)
        })
    }

    fn player_can_unmortgage_any(&self, player_id: PlayerId) -> bool {
        let player = &self.state.players[player_id];
        player.owned.iter().any(|&idx| {
            let mortgaged = self
                .state
                .tile(idx)
                .map(|t| t.is_mortgaged)
                .unwrap_or(false);
            mortgaged
                && board::get_square(idx)
                    .and_then(|s| s.mortgage_value())
                    .map(|mv| player.cash >= unmortgage_cost(mv))
                    .unwrap_or(false)
        })
    }

    // === Dispatcher ===

    /// Verify legality and route a tool call to the owning manager.
    /// Illegal calls return a typed error without any state change.
    pub async fn dispatch(
        &mut self,
        player_id: PlayerId,
        tool: ToolKind,
        params: &Value,
    ) -> ActionResult {
        if !self.state.can_act(player_id) {
            let result = ActionResult::error(format!(
                "player {} cannot act now (active player is {})",
                player_id,
                self.state.active_decision_player()
            ));
            self.emit_action_result(player_id, tool, &result);
            return result;
        }
        if !self.available_actions(player_id).contains(&tool) {
            let result = ActionResult::error(format!(
                "tool {} is not available in phase {}",
                tool,
                self.game_phase()
            ));
            self.emit_action_result(player_id, tool, &result);
            return result;
        }

        let result = match tool {
            ToolKind::RollDice => self.roll_dice(player_id).await,
            ToolKind::BuyProperty => PropertyManager::buy(self, player_id).await,
            ToolKind::PassOnBuying => AuctionManager::start_from_pass(self, player_id).await,
            ToolKind::BidOnAuction => {
                let amount = params.get("bid_amount").and_then(Value::as_i64).unwrap_or(0);
                AuctionManager::bid(self, player_id, amount).await
            }
            ToolKind::PassAuctionBid => AuctionManager::pass(self, player_id).await,
            ToolKind::RollForDoubles => JailManager::roll_for_doubles(self, player_id).await,
            ToolKind::PayBail => JailManager::pay_bail(self, player_id, false).await,
            ToolKind::UseGoojCard => JailManager::use_card(self, player_id),
            ToolKind::BuildHouse => {
                match require_square_param(params) {
                    Ok(sq) => PropertyManager::build_house(self, player_id, sq).await,
                    Err(e) => e,
                }
            }
            ToolKind::SellHouse => match require_square_param(params) {
                Ok(sq) => PropertyManager::sell_house(self, player_id, sq).await,
                Err(e) => e,
            },
            ToolKind::MortgageProperty => match require_square_param(params) {
                Ok(sq) => PropertyManager::mortgage(self, player_id, sq).await,
                Err(e) => e,
            },
            ToolKind::UnmortgageProperty => match require_square_param(params) {
                Ok(sq) => PropertyManager::unmortgage(self, player_id, sq).await,
                Err(e) => e,
            },
            ToolKind::ProposeTrade => TradeManager::propose_from_params(self, player_id, params),
            ToolKind::AcceptTrade => TradeManager::accept(self, player_id, params).await,
            ToolKind::RejectTrade => TradeManager::reject(self, player_id, params),
            ToolKind::CounterTrade => TradeManager::counter(self, player_id, params),
            ToolKind::EndNegotiation => TradeManager::end_negotiation(self, player_id),
            ToolKind::ConfirmLiquidationDone => {
                BankruptcyManager::confirm_liquidation_done(self, player_id).await
            }
            ToolKind::PayMortgageFee => match require_square_param(params) {
                Ok(sq) => PropertyManager::pay_received_mortgage_fee(self, player_id, sq).await,
                Err(e) => e,
            },
            ToolKind::UnmortgageReceived => match require_square_param(params) {
                Ok(sq) => PropertyManager::unmortgage_received(self, player_id, sq).await,
                Err(e) => e,
            },
            ToolKind::EndTurn => {
                self.resolve_segment();
                ActionResult::ok("turn ended")
            }
            ToolKind::Resign => BankruptcyManager::resign(self, player_id).await,
            ToolKind::Wait | ToolKind::DoNothing => ActionResult::ok("waiting"),
        };

        self.emit_action_result(player_id, tool, &result);
        result
    }

    fn emit_action_result(&self, player_id: PlayerId, tool: ToolKind, result: &ActionResult) {
        self.emit(ServerEvent::ActionResult {
            player_id,
            tool_name: tool.as_str().to_string(),
            result_status: result.status.as_str().to_string(),
            result_message: result.message.clone(),
        });
    }

    // === Dice and movement ===

    async fn roll_dice(&mut self, player_id: PlayerId) -> ActionResult {
        let (d1, d2) = {
            let mut rng = rand::thread_rng();
            (rng.gen_range(1..=6), rng.gen_range(1..=6))
        };
        self.apply_roll(player_id, d1, d2).await
    }

    /// Process a concrete dice roll for the current player. Split from
    /// [`roll_dice`] so behavior is drivable without randomness.
    pub async fn apply_roll(&mut self, player_id: PlayerId, d1: u8, d2: u8) -> ActionResult {
        self.state.dice = (d1, d2);
        self.state.dice_outcome_processed = false;
        self.state.has_rolled_this_turn = true;
        let name = self.state.players[player_id].name.clone();
        self.state.log(format!("{} rolled {} and {}", name, d1, d2));

        if d1 == d2 {
            self.state.doubles_streak += 1;
            if self.state.doubles_streak >= 3 {
                let name = self.state.players[player_id].name.clone();
                self.state
                    .log(format!("{} rolled doubles three times in a row. To prison!", name));
                self.send_to_jail(player_id);
                let mut result = ActionResult::ok("three doubles - sent to jail");
                result.dice = Some((d1, d2));
                result.went_to_jail = true;
                return result;
            }
        } else {
            self.state.doubles_streak = 0;
        }

        self.move_player(player_id, (d1 + d2) as i16).await;
        let mut result = ActionResult::ok("dice rolled");
        result.dice = Some((d1, d2));
        result.went_to_jail = self.state.players[player_id].in_jail;
        result
    }

    /// Move forward (or backward for card effects) and run the landing pipeline
    pub async fn move_player(&mut self, player_id: PlayerId, steps: i16) {
        if self.state.players[player_id].is_bankrupt {
            self.resolve_segment();
            return;
        }
        let old_pos = self.state.players[player_id].position as i16;
        let new_pos = (old_pos + steps).rem_euclid(board::BOARD_SIZE as i16) as u8;

        // Forward traversal of GO pays the salary before landing resolves
        if steps > 0 && (new_pos as i16) < old_pos {
            PaymentOrchestrator::pay_system_to_player(self, player_id, GO_SALARY, "GO salary")
                .await;
        }

        self.state.players[player_id].position = new_pos;
        let name = self.state.players[player_id].name.clone();
        let square_name = board::get_square(new_pos).map(|s| s.name.clone()).unwrap_or_default();
        self.state
            .log(format!("{} moved to {} ({})", name, new_pos, square_name));

        self.land_on_square(player_id).await;
    }

    /// Move directly to a target square, optionally collecting GO salary
    pub async fn move_player_to(&mut self, player_id: PlayerId, target: u8, collect_go: bool) {
        if self.state.players[player_id].is_bankrupt {
            self.resolve_segment();
            return;
        }
        if collect_go {
            PaymentOrchestrator::pay_system_to_player(self, player_id, GO_SALARY, "GO salary")
                .await;
        }
        self.state.players[player_id].position = target;
        let name = self.state.players[player_id].name.clone();
        let square_name = board::get_square(target).map(|s| s.name.clone()).unwrap_or_default();
        self.state
            .log(format!("{} moved directly to {} ({})", name, target, square_name));
        self.land_on_square(player_id).await;
    }

    pub(crate) fn send_to_jail(&mut self, player_id: PlayerId) {
        self.state.players[player_id].go_to_jail();
        self.state.doubles_streak = 0;
        let name = self.state.players[player_id].name.clone();
        self.state.log(format!("{} was sent to prison!", name));
        self.resolve_segment();
    }

    // === Landing pipeline ===

    /// Boxed because card effects can move the player onto another card
    /// square, re-entering the landing pipeline.
    fn land_on_square(&mut self, player_id: PlayerId) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if self.state.players[player_id].is_bankrupt {
                self.resolve_segment();
                return;
            }

            let position = self.state.players[player_id].position;
            let square = match board::get_square(position) {
                Some(s) => s,
                None => {
                    self.resolve_segment();
                    return;
                }
            };
            let forced = self.forced_rent.take();

            match &square.kind {
                SquareKind::Property { .. }
                | SquareKind::Railroad { .. }
                | SquareKind::Utility { .. } => {
                    self.handle_purchasable_landing(player_id, position, forced).await;
                }
                SquareKind::Tax { amount } => {
                    let amount = *amount;
                    let outcome = PaymentOrchestrator::pay_player_to_system(
                        self,
                        player_id,
                        amount,
                        &format!("tax - {}", square.name),
                    )
                    .await;
                    if outcome.is_settled() {
                        self.resolve_segment();
                    } else {
                        BankruptcyManager::check(self, player_id, amount, None).await;
                    }
                }
                SquareKind::Chance => {
                    let card = self.chance_deck.draw();
                    self.announce_card(player_id, DeckKind::Chance, &card);
                    self.apply_card_effect(player_id, card, DeckKind::Chance).await;
                }
                SquareKind::CommunityChest => {
                    let card = self.community_deck.draw();
                    self.announce_card(player_id, DeckKind::CommunityChest, &card);
                    self.apply_card_effect(player_id, card, DeckKind::CommunityChest)
                        .await;
                }
                SquareKind::GoToJail => {
                    self.send_to_jail(player_id);
                }
                SquareKind::Go | SquareKind::JailVisiting | SquareKind::FreeParking => {
                    self.resolve_segment();
                }
            }
        })
    }

    async fn handle_purchasable_landing(
        &mut self,
        player_id: PlayerId,
        position: u8,
        forced: Option<ForcedRent>,
    ) {
        let tile = self.state.tile(position).cloned().unwrap_or_default();
        match tile.owner {
            None => {
                self.set_pending(
                    PendingDecision::BuyOrAuction {
                        player: player_id,
                        square_id: position,
                    },
                    false,
                );
            }
            Some(owner) if owner == player_id => {
                self.resolve_segment();
            }
            Some(_) if tile.is_mortgaged => {
                self.resolve_segment();
            }
            Some(owner) => {
                let rent = self.compute_rent(position, owner, forced);
                if rent <= 0 {
                    self.resolve_segment();
                    return;
                }
                let square_name = board::get_square(position)
                    .map(|s| s.name.clone())
                    .unwrap_or_default();
                let outcome = PaymentOrchestrator::pay_player_to_player(
                    self,
                    player_id,
                    owner,
                    rent,
                    &format!("rent for {}", square_name),
                    None,
                )
                .await;
                if outcome.is_settled() {
                    self.resolve_segment();
                } else {
                    BankruptcyManager::check(self, player_id, rent, Some(owner)).await;
                }
            }
        }
    }

    /// Rent for landing on an owned, unmortgaged square
    pub(crate) fn compute_rent(
        &self,
        position: u8,
        owner: PlayerId,
        forced: Option<ForcedRent>,
    ) -> i64 {
        let Some(square) = board::get_square(position) else {
            return 0;
        };
        match &square.kind {
            SquareKind::Property { group, rent, .. } => {
                let houses = self.state.tile(position).map(|t| t.houses).unwrap_or(0);
                if houses > 0 {
                    rent[houses as usize]
                } else if self.state.owns_full_group(owner, *group) {
                    rent[0] * 2
                } else {
                    rent[0]
                }
            }
            SquareKind::Railroad { base_rent, .. } => {
                let owned = self
                    .state
                    .owned_count_matching(owner, |k| matches!(k, SquareKind::Railroad { .. }));
                let rent = base_rent * (1 << owned.saturating_sub(1));
                match forced {
                    Some(ForcedRent::DoubleRailroad) => rent * 2,
                    _ => rent,
                }
            }
            SquareKind::Utility { .. } => {
                let dice_sum = (self.state.dice.0 + self.state.dice.1) as i64;
                match forced {
                    Some(ForcedRent::UtilityTenTimesDice) => 10 * dice_sum,
                    _ => {
                        let owned = self
                            .state
                            .owned_count_matching(owner, |k| matches!(k, SquareKind::Utility { .. }));
                        if owned >= 2 {
                            10 * dice_sum
                        } else {
                            4 * dice_sum
                        }
                    }
                }
            }
            _ => 0,
        }
    }

    // === Card effects ===

    fn announce_card(&mut self, player_id: PlayerId, deck: DeckKind, card: &Card) {
        let name = self.state.players[player_id].name.clone();
        self.state
            .log(format!("{} drew a {} card: {}", name, deck.label(), card.text));
    }

    async fn apply_card_effect(&mut self, player_id: PlayerId, card: Card, deck: DeckKind) {
        self.clear_pending();
        self.state.dice_outcome_processed = false;

        match card.effect {
            CardEffect::ReceiveMoney { amount } => {
                PaymentOrchestrator::pay_system_to_player(self, player_id, amount, "card reward")
                    .await;
                self.resolve_segment();
            }
            CardEffect::PayMoney { amount } => {
                let outcome = PaymentOrchestrator::pay_player_to_system(
                    self,
                    player_id,
                    amount,
                    "card penalty",
                )
                .await;
                if outcome.is_settled() {
                    self.resolve_segment();
                } else {
                    BankruptcyManager::check(self, player_id, amount, None).await;
                }
            }
            CardEffect::MoveTo { square } => {
                let current = self.state.players[player_id].position;
                let passes_go = square <= current && square != current;
                self.move_player_to(player_id, square, passes_go).await;
            }
            CardEffect::MoveRelative { steps } => {
                self.move_player(player_id, steps as i16).await;
            }
            CardEffect::GoToJail => {
                self.send_to_jail(player_id);
            }
            CardEffect::AdvanceToNearestRailroad => {
                if let Some(target) =
                    self.nearest_square(player_id, |k| matches!(k, SquareKind::Railroad { .. }))
                {
                    self.forced_rent = Some(ForcedRent::DoubleRailroad);
                    let current = self.state.players[player_id].position;
                    self.move_player_to(player_id, target, target < current).await;
                } else {
                    self.resolve_segment();
                }
            }
            CardEffect::AdvanceToNearestUtility => {
                if let Some(target) =
                    self.nearest_square(player_id, |k| matches!(k, SquareKind::Utility { .. }))
                {
                    self.forced_rent = Some(ForcedRent::UtilityTenTimesDice);
                    let current = self.state.players[player_id].position;
                    self.move_player_to(player_id, target, target < current).await;
                } else {
                    self.resolve_segment();
                }
            }
            CardEffect::CollectFromEachPlayer { amount } => {
                let others: Vec<PlayerId> = self
                    .state
                    .players
                    .iter()
                    .filter(|p| p.id != player_id && !p.is_bankrupt)
                    .map(|p| p.id)
                    .collect();
                for other in others {
                    let outcome = PaymentOrchestrator::pay_player_to_player(
                        self,
                        other,
                        player_id,
                        amount,
                        "card collection",
                        None,
                    )
                    .await;
                    if !outcome.is_settled() {
                        BankruptcyManager::check(self, other, amount, Some(player_id)).await;
                    }
                }
                if self.state.pending_decision.is_none() {
                    self.resolve_segment();
                }
            }
            CardEffect::PayEachPlayer { amount } => {
                let others: Vec<PlayerId> = self
                    .state
                    .players
                    .iter()
                    .filter(|p| p.id != player_id && !p.is_bankrupt)
                    .map(|p| p.id)
                    .collect();
                let total = amount * others.len() as i64;
                if self.state.players[player_id].cash < total {
                    BankruptcyManager::check(self, player_id, total, None).await;
                    return;
                }
                let mut failed_total = 0;
                for other in others {
                    let outcome = PaymentOrchestrator::pay_player_to_player(
                        self,
                        player_id,
                        other,
                        amount,
                        "card payment",
                        None,
                    )
                    .await;
                    if !outcome.is_settled() {
                        failed_total += amount;
                    }
                }
                if failed_total > 0 {
                    BankruptcyManager::check(self, player_id, failed_total, None).await;
                } else {
                    self.resolve_segment();
                }
            }
            CardEffect::StreetRepairs {
                per_house,
                per_hotel,
            } => {
                let cost: i64 = self.state.players[player_id]
                    .owned
                    .iter()
                    .filter_map(|&idx| self.state.tile(idx))
                    .map(|t| {
                        if t.houses == 5 {
                            per_hotel
                        } else {
                            t.houses as i64 * per_house
                        }
                    })
                    .sum();
                if cost == 0 {
                    self.resolve_segment();
                    return;
                }
                let outcome = PaymentOrchestrator::pay_player_to_system(
                    self,
                    player_id,
                    cost,
                    "street repairs",
                )
                .await;
                if outcome.is_settled() {
                    self.resolve_segment();
                } else {
                    BankruptcyManager::check(self, player_id, cost, None).await;
                }
            }
            CardEffect::GetOutOfJailFree => {
                match deck {
                    DeckKind::Chance => self.state.players[player_id].gooj_chance = true,
                    DeckKind::CommunityChest => {
                        self.state.players[player_id].gooj_community = true
                    }
                }
                let name = self.state.players[player_id].name.clone();
                self.state
                    .log(format!("{} received a Get Out of Prison Free card", name));
                self.resolve_segment();
            }
        }
    }

    fn nearest_square(
        &self,
        player_id: PlayerId,
        pred: impl Fn(&SquareKind) -> bool,
    ) -> Option<u8> {
        let current = self.state.players[player_id].position;
        (1..board::BOARD_SIZE)
            .map(|i| (current as u16 + i as u16) as u8 % board::BOARD_SIZE)
            .find(|&idx| board::get_square(idx).map(|s| pred(&s.kind)).unwrap_or(false))
    }

    // === Views ===

    /// Snapshot of the game from one player's perspective, fed to the agent
    pub fn state_view_for(&self, player_id: PlayerId) -> Value {
        let player = &self.state.players[player_id];
        if player.is_bankrupt {
            return json!({
                "status": "bankrupt",
                "player_id": player_id,
                "name": player.name,
            });
        }

        let my_properties: Vec<Value> = player
            .owned
            .iter()
            .filter_map(|&idx| {
                let sq = board::get_square(idx)?;
                let tile = self.state.tile(idx)?;
                Some(json!({
                    "square_id": idx,
                    "name": sq.name,
                    "group": sq.color_group(),
                    "is_mortgaged": tile.is_mortgaged,
                    "houses": tile.houses,
                    "mortgage_value": sq.mortgage_value(),
                }))
            })
            .collect();

        let opponents: Vec<Value> = self
            .state
            .players
            .iter()
            .filter(|p| p.id != player_id)
            .map(|p| {
                json!({
                    "player_id": p.id,
                    "name": p.name,
                    "cash": p.cash,
                    "position": p.position,
                    "is_bankrupt": p.is_bankrupt,
                    "in_jail": p.in_jail,
                    "properties": p.owned.iter().collect::<Vec<_>>(),
                })
            })
            .collect();

        let active_trade = self.state.pending_decision.as_ref().and_then(|d| match d {
            PendingDecision::RespondToTrade { trade_id, .. }
            | PendingDecision::ProposeAfterRejection {
                rejected_trade_id: trade_id,
                ..
            } => self
                .state
                .trades
                .get(trade_id)
                .map(|t| serde_json::to_value(t).unwrap_or(Value::Null)),
            _ => None,
        });

        json!({
            "game_uid": self.state.game_uid,
            "player_id": player_id,
            "name": player.name,
            "cash": player.cash,
            "position": player.position,
            "current_square": board::get_square(player.position).map(|s| s.name.clone()),
            "in_jail": player.in_jail,
            "jail_turns_attempted": player.jail_turns_attempted,
            "gooj_cards": {
                "chance": player.gooj_chance,
                "community_chest": player.gooj_community,
            },
            "my_properties": my_properties,
            "pending_mortgaged": player.pending_mortgaged,
            "opponents": opponents,
            "turn_count": self.state.turn_count,
            "current_turn_player": self.state.current_player_index,
            "dice": [self.state.dice.0, self.state.dice.1],
            "pending_decision": self.state.pending_decision,
            "game_phase": self.game_phase(),
            "active_trade": active_trade,
            "auction": self.state.auction,
            "recent_log": self.state.log_tail(15),
        })
    }

    /// Static board layout for frontends
    pub fn board_layout() -> Value {
        serde_json::to_value(&*BOARD).unwrap_or(Value::Null)
    }

    /// End-of-game summary for the event stream and audit trail
    pub fn summary(&self) -> Value {
        let mut ranked: Vec<&Player> = self.state.players.iter().collect();
        ranked.sort_by_key(|p| (p.is_bankrupt, -p.cash));
        json!({
            "game_uid": self.state.game_uid,
            "turn_count": self.state.turn_count,
            "winner": self.state.winner.map(|id| self.state.players[id].name.clone()),
            "standings": ranked
                .iter()
                .enumerate()
                .map(|(rank, p)| json!({
                    "rank": rank + 1,
                    "player_id": p.id,
                    "name": p.name,
                    "cash": p.cash,
                    "properties": p.owned.len(),
                    "is_bankrupt": p.is_bankrupt,
                }))
                .collect::<Vec<_>>(),
        })
    }
}

/// Unmortgage costs the mortgage value plus 10% interest, rounded up
pub fn unmortgage_cost(mortgage_value: i64) -> i64 {
    (mortgage_value * 11 + 9) / 10
}

/// One-off 10% fee for keeping a received property mortgaged, rounded up
pub fn mortgage_fee(mortgage_value: i64) -> i64 {
    (mortgage_value + 9) / 10
}

fn require_square_param(params: &Value) -> Result<u8, ActionResult> {
    params
        .get("square_id")
        .and_then(Value::as_u64)
        .filter(|&v| v < board::BOARD_SIZE as u64)
        .map(|v| v as u8)
        .ok_or_else(|| ActionResult::error("missing or invalid square_id parameter"))
}
