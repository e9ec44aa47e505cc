//! Property auctions: started when the landing player declines to buy

use super::bankruptcy::BankruptcyManager;
use super::board;
use super::controller::{ActionResult, GameController};
use super::events::ServerEvent;
use super::payment::PaymentOrchestrator;
use super::state::{AuctionState, PendingDecision, PlayerId};

pub struct AuctionManager;

impl AuctionManager {
    /// The landing player passed on buying; open the auction to everyone
    pub async fn start_from_pass(gc: &mut GameController, player_id: PlayerId) -> ActionResult {
        let square_id = match gc.state.pending_decision {
            Some(PendingDecision::BuyOrAuction { player, square_id }) if player == player_id => {
                square_id
            }
            _ => return ActionResult::error("no purchase decision is pending for this player"),
        };
        Self::initiate(gc, square_id).await;
        ActionResult::ok("passed on buying - auction started")
    }

    pub async fn initiate(gc: &mut GameController, square_id: u8) {
        let Some(square) = board::get_square(square_id) else {
            gc.resolve_segment();
            return;
        };
        if !square.is_purchasable() || gc.state.owner_of(square_id).is_some() {
            gc.state
                .log(format!("Cannot auction {} - not an unowned square", square.name));
            gc.resolve_segment();
            return;
        }

        let participants: Vec<PlayerId> = gc
            .state
            .players
            .iter()
            .filter(|p| !p.is_bankrupt)
            .map(|p| p.id)
            .collect();

        let auction = AuctionState::new(square_id, participants.clone());
        let first_bidder = auction.current_bidder();
        gc.state.auction = Some(auction);

        gc.state.log(format!(
            "Auction started for {} with {} participants",
            square.name,
            participants.len()
        ));
        gc.emit(ServerEvent::AuctionLog {
            message: format!("Auction started for {}", square.name),
        });

        match first_bidder {
            Some(bidder) => {
                gc.set_pending(
                    PendingDecision::AuctionBid {
                        player: bidder,
                        square_id,
                    },
                    false,
                );
            }
            None => Self::conclude(gc).await,
        }
    }

    /// Raise the current bid. Must beat the standing bid and fit in cash.
    pub async fn bid(gc: &mut GameController, player_id: PlayerId, amount: i64) -> ActionResult {
        let Some(auction) = gc.state.auction.as_ref() else {
            return ActionResult::error("no auction in progress");
        };
        if auction.current_bidder() != Some(player_id) {
            return ActionResult::error("not your turn to bid");
        }
        if amount <= auction.current_bid {
            return ActionResult::error(format!(
                "bid must exceed the current bid of ${}",
                auction.current_bid
            ));
        }
        if amount > gc.state.players[player_id].cash {
            return ActionResult::error("bid exceeds available cash");
        }

        let square_id = auction.square_id;
        {
            let auction = gc.state.auction.as_mut().unwrap();
            auction.current_bid = amount;
            auction.highest_bidder = Some(player_id);
        }

        let name = gc.state.players[player_id].name.clone();
        let square_name = board::get_square(square_id)
            .map(|s| s.name.clone())
            .unwrap_or_default();
        gc.state
            .log(format!("{} bids ${} for {}", name, amount, square_name));
        gc.emit(ServerEvent::AuctionLog {
            message: format!("{} bids ${}", name, amount),
        });

        Self::rotate(gc).await;
        ActionResult::ok(format!("bid ${} placed", amount))
    }

    /// Withdraw from the auction
    pub async fn pass(gc: &mut GameController, player_id: PlayerId) -> ActionResult {
        let Some(auction) = gc.state.auction.as_mut() else {
            return ActionResult::error("no auction in progress");
        };
        if auction.current_bidder() != Some(player_id) {
            return ActionResult::error("not your turn to bid");
        }

        let idx = auction
            .active_bidders
            .iter()
            .position(|&p| p == player_id)
            .unwrap();
        auction.active_bidders.remove(idx);
        if !auction.active_bidders.is_empty() {
            auction.current_bidder_index = idx % auction.active_bidders.len();
        }

        let name = gc.state.players[player_id].name.clone();
        gc.state.log(format!("{} passes on the auction", name));
        gc.emit(ServerEvent::AuctionLog {
            message: format!("{} passes", name),
        });

        Self::after_withdrawal(gc).await;
        ActionResult::ok("passed on the auction")
    }

    /// After a raise, hand the slot to the next active bidder in rotation
    async fn rotate(gc: &mut GameController) {
        let Some(auction) = gc.state.auction.as_mut() else {
            return;
        };
        if auction.active_bidders.len() <= 1 {
            Self::conclude(gc).await;
            return;
        }
        auction.current_bidder_index =
            (auction.current_bidder_index + 1) % auction.active_bidders.len();
        let next = auction.current_bidder().unwrap();
        let square_id = auction.square_id;
        gc.set_pending(
            PendingDecision::AuctionBid {
                player: next,
                square_id,
            },
            false,
        );
    }

    /// After a withdrawal the rotation index already points at the next bidder
    async fn after_withdrawal(gc: &mut GameController) {
        let Some(auction) = gc.state.auction.as_ref() else {
            return;
        };
        if auction.active_bidders.len() <= 1 {
            Self::conclude(gc).await;
            return;
        }
        let next = auction.current_bidder().unwrap();
        let square_id = auction.square_id;
        gc.set_pending(
            PendingDecision::AuctionBid {
                player: next,
                square_id,
            },
            false,
        );
    }

    /// Settle the auction: the highest raiser pays, or the square stays unowned
    pub async fn conclude(gc: &mut GameController) {
        let Some(auction) = gc.state.auction.take() else {
            return;
        };
        // The slot still points at the last bidder to act
        if matches!(
            gc.state.pending_decision,
            Some(PendingDecision::AuctionBid { .. })
        ) {
            gc.clear_pending();
        }
        let square_id = auction.square_id;
        let square_name = board::get_square(square_id)
            .map(|s| s.name.clone())
            .unwrap_or_default();

        match auction.highest_bidder {
            Some(winner) if auction.current_bid > 1 => {
                let price = auction.current_bid;
                let winner_name = gc.state.players[winner].name.clone();
                gc.state.log(format!(
                    "Auction for {} won by {} at ${}",
                    square_name, winner_name, price
                ));

                let reason = format!("auction payment - {}", square_name);
                let outcome =
                    PaymentOrchestrator::pay_player_to_system(gc, winner, price, &reason).await;
                if outcome.is_settled() {
                    gc.state.tile_mut(square_id).unwrap().owner = Some(winner);
                    gc.state.players[winner].owned.insert(square_id);
                    gc.state
                        .log(format!("{} now owns {}", winner_name, square_name));
                    gc.emit(ServerEvent::AuctionLog {
                        message: format!("{} wins {} at ${}", winner_name, square_name, price),
                    });
                } else {
                    // Winner defaults: the square stays unowned
                    gc.state.log(format!(
                        "{} failed to settle the auction for {}",
                        winner_name, square_name
                    ));
                    BankruptcyManager::check(gc, winner, price, None).await;
                }
            }
            _ => {
                gc.state
                    .log(format!("Auction for {} ended with no bids", square_name));
                gc.emit(ServerEvent::AuctionLog {
                    message: format!("Auction for {} ended with no winner", square_name),
                });
            }
        }

        if gc.state.pending_decision.is_none() {
            gc.resolve_segment();
        } else {
            // A liquidation slot raised by a defaulting winner stays pending
            gc.state.dice_outcome_processed = true;
        }
    }
}
