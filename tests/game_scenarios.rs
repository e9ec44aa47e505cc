//! End-to-end scenarios driven through the dispatcher with injected dice

mod common;

use common::{grant_square, new_game, set_cash};
use magnate_arena::game::{PendingDecision, ToolKind, TradeStatus, STARTING_CASH};
use serde_json::json;

#[tokio::test]
async fn rent_pipeline_settles_between_players() {
    let (mut gc, _ledger) = new_game(2).await;

    // Player 0 owns Tokyo (price 400, base rent 50), unmortgaged, no houses
    grant_square(&mut gc, 0, 39);

    // Player 1 rolls onto it
    gc.state.current_player_index = 1;
    gc.state.players[1].position = 33;
    let result = gc.apply_roll(1, 2, 4).await;

    assert!(result.is_ok());
    assert_eq!(gc.state.players[1].position, 39);
    assert_eq!(gc.state.players[1].cash, STARTING_CASH - 50);
    assert_eq!(gc.state.players[0].cash, STARTING_CASH + 50);
    assert!(gc.state.dice_outcome_processed);
    assert!(gc.state.pending_decision.is_none());
}

#[tokio::test]
async fn rent_doubles_on_unimproved_full_group() {
    let (mut gc, _ledger) = new_game(2).await;

    // Whole DarkBlue group (37, 39) owned by player 0, no houses
    grant_square(&mut gc, 0, 37);
    grant_square(&mut gc, 0, 39);

    gc.state.current_player_index = 1;
    gc.state.players[1].position = 33;
    gc.apply_roll(1, 2, 4).await;

    // Tokyo base rent 50, doubled for the complete unimproved group
    assert_eq!(gc.state.players[1].cash, STARTING_CASH - 100);
}

#[tokio::test]
async fn three_doubles_divert_to_jail_without_moving() {
    let (mut gc, _ledger) = new_game(2).await;

    // Land on own property, then the visiting corner, to keep rolls clean
    grant_square(&mut gc, 0, 6);

    let r1 = gc.apply_roll(0, 3, 3).await;
    assert!(r1.is_ok());
    assert_eq!(gc.state.doubles_streak, 1);
    assert_eq!(gc.state.players[0].position, 6);

    let r2 = gc.apply_roll(0, 2, 2).await;
    assert!(r2.is_ok());
    assert_eq!(gc.state.doubles_streak, 2);
    assert_eq!(gc.state.players[0].position, 10);

    let r3 = gc.apply_roll(0, 1, 1).await;
    assert!(r3.went_to_jail);
    // No move on the third roll: straight to prison
    assert_eq!(gc.state.players[0].position, 10);
    assert!(gc.state.players[0].in_jail);
    assert_eq!(gc.state.doubles_streak, 0);
    assert!(gc.state.dice_outcome_processed);
}

#[tokio::test]
async fn auction_happy_path() {
    let (mut gc, _ledger) = new_game(4).await;

    // Player 0 lands on unowned New York (price 350) and passes
    gc.state.players[0].position = 31;
    gc.apply_roll(0, 2, 4).await;
    assert_eq!(
        gc.state.pending_decision,
        Some(PendingDecision::BuyOrAuction {
            player: 0,
            square_id: 37
        })
    );

    let result = gc.dispatch(0, ToolKind::PassOnBuying, &json!({})).await;
    assert!(result.is_ok());
    assert!(gc.state.auction.is_some());

    // Rotation starts at seat 0
    assert!(gc.dispatch(0, ToolKind::PassAuctionBid, &json!({})).await.is_ok());
    assert!(gc
        .dispatch(1, ToolKind::BidOnAuction, &json!({"bid_amount": 100}))
        .await
        .is_ok());
    assert!(gc
        .dispatch(2, ToolKind::BidOnAuction, &json!({"bid_amount": 150}))
        .await
        .is_ok());
    assert!(gc.dispatch(3, ToolKind::PassAuctionBid, &json!({})).await.is_ok());
    // Back to seat 1, who gives up; seat 2 remains alone and wins at 150
    assert!(gc.dispatch(1, ToolKind::PassAuctionBid, &json!({})).await.is_ok());

    assert!(gc.state.auction.is_none());
    assert_eq!(gc.state.owner_of(37), Some(2));
    assert!(gc.state.players[2].owned.contains(&37));
    assert_eq!(gc.state.players[2].cash, STARTING_CASH - 150);
    assert!(gc.state.pending_decision.is_none());
    assert!(gc.state.dice_outcome_processed);
}

#[tokio::test]
async fn auction_with_no_raise_leaves_square_unowned() {
    let (mut gc, _ledger) = new_game(3).await;

    gc.state.players[0].position = 31;
    gc.apply_roll(0, 2, 4).await;
    gc.dispatch(0, ToolKind::PassOnBuying, &json!({})).await;

    for seat in [0, 1] {
        assert!(gc
            .dispatch(seat, ToolKind::PassAuctionBid, &json!({}))
            .await
            .is_ok());
    }

    // The last remaining participant never raised: no winner
    assert!(gc.state.auction.is_none());
    assert_eq!(gc.state.owner_of(37), None);
    assert!(gc.state.pending_decision.is_none());
}

#[tokio::test]
async fn trade_acceptance_transfers_mortgaged_property_with_task() {
    let (mut gc, _ledger) = new_game(2).await;

    // Player 0 offers mortgaged Salvador plus $50 for player 1's Rio
    grant_square(&mut gc, 0, 1);
    gc.state.tile_mut(1).unwrap().is_mortgaged = true;
    grant_square(&mut gc, 1, 3);

    let propose = gc
        .dispatch(
            0,
            ToolKind::ProposeTrade,
            &json!({
                "recipient_id": 1,
                "offered_property_ids": [1],
                "offered_money": 50,
                "requested_property_ids": [3],
                "message": "Salvador and cash for Rio?",
            }),
        )
        .await;
    assert!(propose.is_ok(), "{}", propose.message);
    assert!(matches!(
        gc.state.pending_decision,
        Some(PendingDecision::RespondToTrade { player: 1, .. })
    ));

    let accept = gc.dispatch(1, ToolKind::AcceptTrade, &json!({})).await;
    assert!(accept.is_ok(), "{}", accept.message);

    // Properties swapped, money leg settled, mortgage preserved
    assert_eq!(gc.state.owner_of(1), Some(1));
    assert_eq!(gc.state.owner_of(3), Some(0));
    assert!(gc.state.tile(1).unwrap().is_mortgaged);
    assert_eq!(gc.state.players[0].cash, STARTING_CASH - 50);
    assert_eq!(gc.state.players[1].cash, STARTING_CASH + 50);

    // Recipient owes a decision on the mortgaged arrival at their next turn
    assert_eq!(gc.state.players[1].pending_mortgaged.len(), 1);
    assert_eq!(gc.state.players[1].pending_mortgaged[0].square_id, 1);

    // Player 1 is not the current-turn player, so no slot is raised yet
    assert!(gc.state.pending_decision.is_none());
    let offer = gc.state.trades.values().next().unwrap();
    assert_eq!(offer.status, TradeStatus::Accepted);
}

#[tokio::test]
async fn received_mortgaged_task_raised_at_turn_start() {
    let (mut gc, _ledger) = new_game(2).await;

    grant_square(&mut gc, 0, 1);
    gc.state.tile_mut(1).unwrap().is_mortgaged = true;
    grant_square(&mut gc, 1, 3);

    gc.dispatch(
        0,
        ToolKind::ProposeTrade,
        &json!({
            "recipient_id": 1,
            "offered_property_ids": [1],
            "requested_property_ids": [3],
        }),
    )
    .await;
    gc.dispatch(1, ToolKind::AcceptTrade, &json!({})).await;

    gc.advance_turn();
    assert_eq!(gc.state.current_player_index, 1);
    assert_eq!(
        gc.state.pending_decision,
        Some(PendingDecision::HandleReceivedMortgaged {
            player: 1,
            square_id: 1
        })
    );

    // Paying the 10% fee keeps the mortgage and clears the task
    let fee_result = gc
        .dispatch(1, ToolKind::PayMortgageFee, &json!({"square_id": 1}))
        .await;
    assert!(fee_result.is_ok(), "{}", fee_result.message);
    assert!(gc.state.tile(1).unwrap().is_mortgaged);
    assert!(gc.state.players[1].pending_mortgaged.is_empty());
    assert!(gc.state.pending_decision.is_none());
    // Salvador price 60, mortgage value 30, fee is 10% rounded up
    assert_eq!(gc.state.players[1].cash, STARTING_CASH - 3);
}

#[tokio::test]
async fn negotiation_terminates_at_rejection_cap() {
    let (mut gc, _ledger) = new_game(2).await;
    grant_square(&mut gc, 0, 1);

    let offer = json!({
        "recipient_id": 1,
        "offered_property_ids": [1],
        "requested_money": 500,
    });

    assert!(gc.dispatch(0, ToolKind::ProposeTrade, &offer).await.is_ok());
    for round in 1..=5u32 {
        let reject = gc.dispatch(1, ToolKind::RejectTrade, &json!({})).await;
        assert!(reject.is_ok(), "{}", reject.message);

        if round < 5 {
            match gc.state.pending_decision {
                Some(PendingDecision::ProposeAfterRejection {
                    player: 0,
                    rejection_count,
                    ..
                }) => assert_eq!(rejection_count, round),
                ref other => panic!("unexpected pending state: {other:?}"),
            }
            assert!(gc.dispatch(0, ToolKind::ProposeTrade, &offer).await.is_ok());
        }
    }

    // Fifth rejection kills the negotiation outright
    assert!(gc.state.pending_decision.is_none());
    assert!(gc.state.dice_outcome_processed);
}

#[tokio::test]
async fn negotiation_lock_rejects_other_recipients() {
    let (mut gc, _ledger) = new_game(3).await;
    grant_square(&mut gc, 0, 1);

    let offer = json!({
        "recipient_id": 1,
        "offered_property_ids": [1],
        "requested_money": 200,
    });
    gc.dispatch(0, ToolKind::ProposeTrade, &offer).await;
    gc.dispatch(1, ToolKind::RejectTrade, &json!({})).await;

    // Mid-negotiation, a proposal to a different player must be refused
    let elsewhere = gc
        .dispatch(
            0,
            ToolKind::ProposeTrade,
            &json!({
                "recipient_id": 2,
                "offered_property_ids": [1],
                "requested_money": 200,
            }),
        )
        .await;
    assert!(!elsewhere.is_ok());

    // Walking away clears the slot
    let ended = gc.dispatch(0, ToolKind::EndNegotiation, &json!({})).await;
    assert!(ended.is_ok());
    assert!(gc.state.pending_decision.is_none());
}

#[tokio::test]
async fn counter_offer_swaps_roles() {
    let (mut gc, _ledger) = new_game(2).await;
    grant_square(&mut gc, 0, 1);
    grant_square(&mut gc, 1, 3);

    gc.dispatch(
        0,
        ToolKind::ProposeTrade,
        &json!({
            "recipient_id": 1,
            "offered_property_ids": [1],
            "requested_property_ids": [3],
        }),
    )
    .await;

    let counter = gc
        .dispatch(
            1,
            ToolKind::CounterTrade,
            &json!({
                "offered_property_ids": [3],
                "requested_property_ids": [1],
                "requested_money": 100,
            }),
        )
        .await;
    assert!(counter.is_ok(), "{}", counter.message);

    assert_eq!(gc.state.trades[&1].status, TradeStatus::Countered);
    let counter_offer = &gc.state.trades[&2];
    assert_eq!(counter_offer.proposer, 1);
    assert_eq!(counter_offer.recipient, 0);
    assert_eq!(counter_offer.counter_of, Some(1));
    assert!(matches!(
        gc.state.pending_decision,
        Some(PendingDecision::RespondToTrade { player: 0, trade_id: 2 })
    ));
}

#[tokio::test]
async fn hopeless_debt_finalizes_bankruptcy_and_ends_two_player_game() {
    let (mut gc, ledger) = new_game(2).await;

    // Player 0 has a hotel on Tokyo; rent is 2000
    grant_square(&mut gc, 0, 39);
    gc.state.tile_mut(39).unwrap().houses = 5;

    // Player 1 holds $20 cash and one small unmortgaged property
    grant_square(&mut gc, 1, 1);
    set_cash(&mut gc, &ledger, 1, 20).await;

    gc.state.current_player_index = 1;
    gc.state.players[1].position = 33;
    gc.apply_roll(1, 2, 4).await;

    // Total liquidation value ($20 + $30 mortgage) cannot cover the rent
    assert!(gc.state.players[1].is_bankrupt);
    assert_eq!(gc.state.players[1].cash, 0);
    assert!(gc.state.players[1].owned.is_empty());
    // The creditor takes the estate
    assert_eq!(gc.state.owner_of(1), Some(0));
    // Last opponent gone: the game is over with player 0 as winner
    assert!(gc.state.game_over);
    assert_eq!(gc.state.winner, Some(0));
}

#[tokio::test]
async fn liquidation_window_lets_debtor_raise_cash() {
    let (mut gc, ledger) = new_game(3).await;

    // Player 1 will owe 100 rent on Tokyo (base 50, doubled for the full
    // unimproved DarkBlue group)
    grant_square(&mut gc, 0, 37);
    grant_square(&mut gc, 0, 39);

    // Player 1: $60 cash plus Venice (mortgage value 70) to liquidate
    grant_square(&mut gc, 1, 11);
    set_cash(&mut gc, &ledger, 1, 60).await;

    gc.state.current_player_index = 1;
    gc.state.players[1].position = 33;
    gc.apply_roll(1, 2, 4).await;

    // Rent 100 exceeds cash but not total assets: liquidation window opens
    assert_eq!(
        gc.state.pending_decision,
        Some(PendingDecision::AssetLiquidation {
            player: 1,
            debt: 100,
            creditor: Some(0)
        })
    );
    assert!(!gc.state.players[1].is_bankrupt);

    // Mortgaging Venice raises $70
    let mortgage = gc
        .dispatch(1, ToolKind::MortgageProperty, &json!({"square_id": 11}))
        .await;
    assert!(mortgage.is_ok(), "{}", mortgage.message);
    assert_eq!(gc.state.players[1].cash, 130);

    let done = gc
        .dispatch(1, ToolKind::ConfirmLiquidationDone, &json!({}))
        .await;
    assert!(done.is_ok(), "{}", done.message);

    assert!(!gc.state.players[1].is_bankrupt);
    assert_eq!(gc.state.players[1].cash, 30);
    assert_eq!(gc.state.players[0].cash, magnate_arena::game::STARTING_CASH + 100);
    assert!(gc.state.pending_decision.is_none());
}

#[tokio::test]
async fn confirm_done_with_shortfall_finalizes_bankruptcy() {
    let (mut gc, ledger) = new_game(3).await;

    grant_square(&mut gc, 0, 37);
    grant_square(&mut gc, 0, 39);

    // Assets cover the debt only if Venice is actually liquidated
    grant_square(&mut gc, 1, 11);
    set_cash(&mut gc, &ledger, 1, 60).await;

    gc.state.current_player_index = 1;
    gc.state.players[1].position = 33;
    gc.apply_roll(1, 2, 4).await;
    assert!(matches!(
        gc.state.pending_decision,
        Some(PendingDecision::AssetLiquidation { player: 1, .. })
    ));

    // Confirming without raising cash forfeits the estate to the creditor
    let done = gc
        .dispatch(1, ToolKind::ConfirmLiquidationDone, &json!({}))
        .await;
    assert!(done.is_ok());
    assert!(gc.state.players[1].is_bankrupt);
    assert_eq!(gc.state.owner_of(11), Some(0));
    // Game continues with two players left
    assert!(!gc.state.game_over);
}
