//! Property operations: purchase, mortgage lifecycle, houses.
//!
//! Preconditions are enforced server-side regardless of what the agent asked
//! for, and state only mutates after the corresponding payment settles.

use super::bankruptcy::BankruptcyManager;
use super::board;
use super::controller::{mortgage_fee, unmortgage_cost, ActionResult, GameController};
use super::payment::PaymentOrchestrator;
use super::state::{PendingDecision, PlayerId};

pub struct PropertyManager;

impl PropertyManager {
    /// Buy the square the active buy-or-auction decision refers to
    pub async fn buy(gc: &mut GameController, player_id: PlayerId) -> ActionResult {
        let square_id = match gc.state.pending_decision {
            Some(PendingDecision::BuyOrAuction { player, square_id }) if player == player_id => {
                square_id
            }
            _ => return ActionResult::error("no purchase decision is pending for this player"),
        };

        let Some(square) = board::get_square(square_id) else {
            return ActionResult::error("invalid square");
        };
        let Some(price) = square.price() else {
            return ActionResult::error("square is not purchasable");
        };
        if gc.state.owner_of(square_id).is_some() {
            return ActionResult::error("square is already owned");
        }

        let reason = format!("purchase of {}", square.name);
        let outcome =
            PaymentOrchestrator::pay_player_to_system(gc, player_id, price, &reason).await;
        if !outcome.is_settled() {
            // The decision stays pending; the agent can still pass to auction
            return ActionResult::error("purchase payment failed");
        }

        gc.state.tile_mut(square_id).unwrap().owner = Some(player_id);
        gc.state.players[player_id].owned.insert(square_id);
        let name = gc.state.players[player_id].name.clone();
        gc.state
            .log(format!("{} bought {} for ${}", name, square.name, price));
        gc.resolve_segment();
        ActionResult::ok(format!("bought {}", square.name))
    }

    /// Mortgage an owned square for half its price. Streets require the whole
    /// color group to be free of houses first.
    pub async fn mortgage(
        gc: &mut GameController,
        player_id: PlayerId,
        square_id: u8,
    ) -> ActionResult {
        let Some(square) = board::get_square(square_id) else {
            return ActionResult::error("invalid square");
        };
        let Some(mortgage_value) = square.mortgage_value() else {
            return ActionResult::error("square cannot be mortgaged");
        };
        let Some(tile) = gc.state.tile(square_id) else {
            return ActionResult::error("square cannot be mortgaged");
        };
        if tile.owner != Some(player_id) {
            return ActionResult::error("you do not own this square");
        }
        if tile.is_mortgaged {
            return ActionResult::error("square is already mortgaged");
        }
        if gc.state.group_has_houses(square_id) {
            return ActionResult::error("sell all houses in the color group first");
        }

        let reason = format!("mortgage loan - {}", square.name);
        let outcome =
            PaymentOrchestrator::pay_system_to_player(gc, player_id, mortgage_value, &reason)
                .await;
        if !outcome.is_settled() {
            return ActionResult::error("mortgage payout failed");
        }

        gc.state.tile_mut(square_id).unwrap().is_mortgaged = true;
        ActionResult::ok(format!("mortgaged {} for ${}", square.name, mortgage_value))
    }

    /// Lift a mortgage for the mortgage value plus 10% interest
    pub async fn unmortgage(
        gc: &mut GameController,
        player_id: PlayerId,
        square_id: u8,
    ) -> ActionResult {
        let Some(square) = board::get_square(square_id) else {
            return ActionResult::error("invalid square");
        };
        let Some(mortgage_value) = square.mortgage_value() else {
            return ActionResult::error("square cannot be unmortgaged");
        };
        let Some(tile) = gc.state.tile(square_id) else {
            return ActionResult::error("square cannot be unmortgaged");
        };
        if tile.owner != Some(player_id) {
            return ActionResult::error("you do not own this square");
        }
        if !tile.is_mortgaged {
            return ActionResult::error("square is not mortgaged");
        }

        let cost = unmortgage_cost(mortgage_value);
        let reason = format!("unmortgage payment - {}", square.name);
        let outcome = PaymentOrchestrator::pay_player_to_system(gc, player_id, cost, &reason).await;
        if !outcome.is_settled() {
            return ActionResult::error("unmortgage payment failed");
        }

        gc.state.tile_mut(square_id).unwrap().is_mortgaged = false;
        ActionResult::ok(format!("unmortgaged {} for ${}", square.name, cost))
    }

    /// Build one house (or the hotel as the fifth) under the even-building rule
    pub async fn build_house(
        gc: &mut GameController,
        player_id: PlayerId,
        square_id: u8,
    ) -> ActionResult {
        let Some(square) = board::get_square(square_id) else {
            return ActionResult::error("invalid square");
        };
        let Some(group) = square.color_group() else {
            return ActionResult::error("only street properties can be built on");
        };
        let Some(house_price) = square.house_price() else {
            return ActionResult::error("only street properties can be built on");
        };

        {
            let Some(tile) = gc.state.tile(square_id) else {
                return ActionResult::error("invalid square");
            };
            if tile.owner != Some(player_id) {
                return ActionResult::error("you do not own this square");
            }
            if tile.is_mortgaged {
                return ActionResult::error("cannot build on a mortgaged square");
            }
            if tile.houses >= 5 {
                return ActionResult::error("square already carries a hotel");
            }
            if !gc.state.owns_full_group_unmortgaged(player_id, group) {
                return ActionResult::error(
                    "the whole color group must be owned and unmortgaged to build",
                );
            }
            let (min, _) = gc.state.group_house_range(group);
            if tile.houses > min {
                return ActionResult::error("build evenly across the color group");
            }
        }

        let reason = format!("house construction - {}", square.name);
        let outcome =
            PaymentOrchestrator::pay_player_to_system(gc, player_id, house_price, &reason).await;
        if !outcome.is_settled() {
            return ActionResult::error("construction payment failed");
        }

        let tile = gc.state.tile_mut(square_id).unwrap();
        tile.houses += 1;
        let built = if tile.houses == 5 { "hotel" } else { "house" };
        let name = gc.state.players[player_id].name.clone();
        gc.state
            .log(format!("{} built a {} on {}", name, built, square.name));
        ActionResult::ok(format!("built a {} on {}", built, square.name))
    }

    /// Sell one house back at half price under the even-selling rule
    pub async fn sell_house(
        gc: &mut GameController,
        player_id: PlayerId,
        square_id: u8,
    ) -> ActionResult {
        let Some(square) = board::get_square(square_id) else {
            return ActionResult::error("invalid square");
        };
        let Some(group) = square.color_group() else {
            return ActionResult::error("only street properties carry houses");
        };
        let Some(house_price) = square.house_price() else {
            return ActionResult::error("only street properties carry houses");
        };

        {
            let Some(tile) = gc.state.tile(square_id) else {
                return ActionResult::error("invalid square");
            };
            if tile.owner != Some(player_id) {
                return ActionResult::error("you do not own this square");
            }
            if tile.houses == 0 {
                return ActionResult::error("no houses to sell on this square");
            }
            let (_, max) = gc.state.group_house_range(group);
            if tile.houses < max {
                return ActionResult::error("sell evenly across the color group");
            }
        }

        let sale_price = house_price / 2;
        let reason = format!("house sale - {}", square.name);
        let outcome =
            PaymentOrchestrator::pay_system_to_player(gc, player_id, sale_price, &reason).await;
        if !outcome.is_settled() {
            return ActionResult::error("house sale payout failed");
        }

        let tile = gc.state.tile_mut(square_id).unwrap();
        tile.houses -= 1;
        let name = gc.state.players[player_id].name.clone();
        gc.state.log(format!(
            "{} sold a building on {} for ${}",
            name, square.name, sale_price
        ));
        ActionResult::ok(format!("sold a building on {}", square.name))
    }

    /// Keep a received property mortgaged by paying the one-off 10% fee
    pub async fn pay_received_mortgage_fee(
        gc: &mut GameController,
        player_id: PlayerId,
        square_id: u8,
    ) -> ActionResult {
        if !Self::received_task_matches(gc, player_id, square_id) {
            return ActionResult::error("no received-mortgaged decision for this square");
        }
        let Some(mortgage_value) = board::get_square(square_id).and_then(|s| s.mortgage_value())
        else {
            return ActionResult::error("invalid square");
        };

        let fee = mortgage_fee(mortgage_value);
        let outcome =
            PaymentOrchestrator::pay_player_to_system(gc, player_id, fee, "mortgage transfer fee")
                .await;
        if !outcome.is_settled() {
            BankruptcyManager::check(gc, player_id, fee, None).await;
            return ActionResult::ok("fee payment failed - insolvency handling started");
        }

        Self::advance_received_tasks(gc, player_id, square_id);
        ActionResult::ok(format!("paid ${} transfer fee, square stays mortgaged", fee))
    }

    /// Unmortgage a received property immediately at mortgage value + 10%
    pub async fn unmortgage_received(
        gc: &mut GameController,
        player_id: PlayerId,
        square_id: u8,
    ) -> ActionResult {
        if !Self::received_task_matches(gc, player_id, square_id) {
            return ActionResult::error("no received-mortgaged decision for this square");
        }
        let Some(square) = board::get_square(square_id) else {
            return ActionResult::error("invalid square");
        };
        let Some(mortgage_value) = square.mortgage_value() else {
            return ActionResult::error("invalid square");
        };

        let cost = unmortgage_cost(mortgage_value);
        let reason = format!("unmortgage payment - {}", square.name);
        let outcome = PaymentOrchestrator::pay_player_to_system(gc, player_id, cost, &reason).await;
        if !outcome.is_settled() {
            // Not a forced debt: the fee option remains open
            return ActionResult::error("unmortgage payment failed");
        }

        gc.state.tile_mut(square_id).unwrap().is_mortgaged = false;
        Self::advance_received_tasks(gc, player_id, square_id);
        ActionResult::ok(format!("unmortgaged {} for ${}", square.name, cost))
    }

    fn received_task_matches(gc: &GameController, player_id: PlayerId, square_id: u8) -> bool {
        matches!(
            gc.state.pending_decision,
            Some(PendingDecision::HandleReceivedMortgaged { player, square_id: sq })
                if player == player_id && sq == square_id
        )
    }

    /// Pop the handled task and either raise the next one or close the segment
    fn advance_received_tasks(gc: &mut GameController, player_id: PlayerId, square_id: u8) {
        let player = &mut gc.state.players[player_id];
        player.pending_mortgaged.retain(|t| t.square_id != square_id);
        match gc.state.players[player_id].pending_mortgaged.first() {
            Some(task) => {
                let next = task.square_id;
                gc.set_pending(
                    PendingDecision::HandleReceivedMortgaged {
                        player: player_id,
                        square_id: next,
                    },
                    false,
                );
            }
            None => gc.resolve_segment(),
        }
    }
}
