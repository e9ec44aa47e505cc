//! Rule-level tests: purchases, mortgage and house round-trips, jail flow,
//! dispatcher legality and state invariants

mod common;

use common::{grant_square, new_game, set_cash};
use magnate_arena::game::jail::JailManager;
use magnate_arena::game::{PendingDecision, ToolKind, STARTING_CASH};
use serde_json::json;

#[tokio::test]
async fn buy_property_through_dispatcher() {
    let (mut gc, _ledger) = new_game(2).await;

    gc.apply_roll(0, 2, 3).await; // lands on TLV Airport (5), price 200
    assert_eq!(
        gc.state.pending_decision,
        Some(PendingDecision::BuyOrAuction {
            player: 0,
            square_id: 5
        })
    );

    let result = gc.dispatch(0, ToolKind::BuyProperty, &json!({})).await;
    assert!(result.is_ok(), "{}", result.message);
    assert_eq!(gc.state.owner_of(5), Some(0));
    assert!(gc.state.players[0].owned.contains(&5));
    assert_eq!(gc.state.players[0].cash, STARTING_CASH - 200);
    assert!(gc.state.pending_decision.is_none());
    assert!(gc.state.dice_outcome_processed);
}

#[tokio::test]
async fn mortgage_unmortgage_round_trip_costs_ten_percent() {
    let (mut gc, _ledger) = new_game(2).await;
    grant_square(&mut gc, 0, 1); // Salvador, price 60, mortgage value 30

    let mortgage = gc
        .dispatch(0, ToolKind::MortgageProperty, &json!({"square_id": 1}))
        .await;
    assert!(mortgage.is_ok(), "{}", mortgage.message);
    assert!(gc.state.tile(1).unwrap().is_mortgaged);
    assert_eq!(gc.state.players[0].cash, STARTING_CASH + 30);

    let unmortgage = gc
        .dispatch(0, ToolKind::UnmortgageProperty, &json!({"square_id": 1}))
        .await;
    assert!(unmortgage.is_ok(), "{}", unmortgage.message);
    assert!(!gc.state.tile(1).unwrap().is_mortgaged);

    // Round trip costs ceil(30 * 0.10) = 3
    assert_eq!(gc.state.players[0].cash, STARTING_CASH - 3);
}

#[tokio::test]
async fn build_sell_round_trip_costs_half_house_price() {
    let (mut gc, _ledger) = new_game(2).await;
    grant_square(&mut gc, 0, 1);
    grant_square(&mut gc, 0, 3);

    let build = gc
        .dispatch(0, ToolKind::BuildHouse, &json!({"square_id": 1}))
        .await;
    assert!(build.is_ok(), "{}", build.message);
    assert_eq!(gc.state.tile(1).unwrap().houses, 1);

    let sell = gc
        .dispatch(0, ToolKind::SellHouse, &json!({"square_id": 1}))
        .await;
    assert!(sell.is_ok(), "{}", sell.message);
    assert_eq!(gc.state.tile(1).unwrap().houses, 0);

    // House costs 50, sells back at 25
    assert_eq!(gc.state.players[0].cash, STARTING_CASH - 25);
}

#[tokio::test]
async fn even_building_rule_is_enforced() {
    let (mut gc, _ledger) = new_game(2).await;
    grant_square(&mut gc, 0, 1);
    grant_square(&mut gc, 0, 3);

    assert!(gc
        .dispatch(0, ToolKind::BuildHouse, &json!({"square_id": 1}))
        .await
        .is_ok());

    // A second house on the same square would break the even rule
    let uneven = gc
        .dispatch(0, ToolKind::BuildHouse, &json!({"square_id": 1}))
        .await;
    assert!(!uneven.is_ok());
    assert_eq!(gc.state.tile(1).unwrap().houses, 1);

    // Building on the sibling square is fine
    assert!(gc
        .dispatch(0, ToolKind::BuildHouse, &json!({"square_id": 3}))
        .await
        .is_ok());
}

#[tokio::test]
async fn mortgage_blocked_while_group_has_houses() {
    let (mut gc, _ledger) = new_game(2).await;
    grant_square(&mut gc, 0, 1);
    grant_square(&mut gc, 0, 3);
    gc.state.tile_mut(3).unwrap().houses = 1;

    let result = gc
        .dispatch(0, ToolKind::MortgageProperty, &json!({"square_id": 1}))
        .await;
    assert!(!result.is_ok());
    assert!(!gc.state.tile(1).unwrap().is_mortgaged);
}

#[tokio::test]
async fn jail_roll_failures_then_forced_bail() {
    let (mut gc, _ledger) = new_game(2).await;
    gc.state.players[0].go_to_jail();
    JailManager::begin_jail_turn(&mut gc, 0);
    assert!(matches!(
        gc.state.pending_decision,
        Some(PendingDecision::JailOptions { player: 0, .. })
    ));

    // Two failed rolls end their segments in prison
    for attempt in 1..=2u8 {
        let result = JailManager::roll_for_doubles_with(&mut gc, 0, 1, 2).await;
        assert!(result.is_ok());
        assert!(gc.state.players[0].in_jail);
        assert_eq!(gc.state.players[0].jail_turns_attempted, attempt);
        assert!(gc.state.dice_outcome_processed);
        JailManager::begin_jail_turn(&mut gc, 0);
    }

    // Third failure forces bail in the same segment
    let result = JailManager::roll_for_doubles_with(&mut gc, 0, 1, 2).await;
    assert!(result.is_ok(), "{}", result.message);
    assert!(!gc.state.players[0].in_jail);
    assert_eq!(gc.state.players[0].cash, STARTING_CASH - 50);
    // Segment stays open: the movement roll is still due
    assert!(gc.state.dice_outcome_processed);
    assert!(!gc.state.has_rolled_this_turn);
    assert!(gc.available_actions(0).contains(&ToolKind::RollDice));
}

#[tokio::test]
async fn jail_release_by_doubles_moves_without_bonus() {
    let (mut gc, _ledger) = new_game(2).await;
    gc.state.players[0].go_to_jail();
    JailManager::begin_jail_turn(&mut gc, 0);

    let result = JailManager::roll_for_doubles_with(&mut gc, 0, 4, 4).await;
    assert!(result.is_ok());
    assert!(!gc.state.players[0].in_jail);
    assert_eq!(gc.state.players[0].position, 18);
    // Release doubles never start a doubles streak
    assert_eq!(gc.state.doubles_streak, 0);
}

#[tokio::test]
async fn jail_card_prefers_chance_and_keeps_segment_open() {
    let (mut gc, _ledger) = new_game(2).await;
    gc.state.players[0].go_to_jail();
    gc.state.players[0].gooj_chance = true;
    gc.state.players[0].gooj_community = true;
    JailManager::begin_jail_turn(&mut gc, 0);

    let result = gc.dispatch(0, ToolKind::UseGoojCard, &json!({})).await;
    assert!(result.is_ok());
    assert!(!gc.state.players[0].in_jail);
    assert!(!gc.state.players[0].gooj_chance);
    assert!(gc.state.players[0].gooj_community);
    assert!(gc.available_actions(0).contains(&ToolKind::RollDice));
}

#[tokio::test]
async fn forced_bail_without_assets_bankrupts() {
    let (mut gc, ledger) = new_game(3).await;
    gc.state.players[0].go_to_jail();
    gc.state.players[0].jail_turns_attempted = 2;
    set_cash(&mut gc, &ledger, 0, 20).await;
    JailManager::begin_jail_turn(&mut gc, 0);

    let result = JailManager::roll_for_doubles_with(&mut gc, 0, 1, 2).await;
    assert!(result.is_ok());
    // $20 in assets cannot cover the $50 bail
    assert!(gc.state.players[0].is_bankrupt);
}

#[tokio::test]
async fn dispatcher_rejects_out_of_turn_and_illegal_tools() {
    let (mut gc, _ledger) = new_game(2).await;

    // Player 1 is not the active player
    let result = gc.dispatch(1, ToolKind::RollDice, &json!({})).await;
    assert!(!result.is_ok());

    // Player 0 cannot buy with no purchase pending
    let cash_before = gc.state.players[0].cash;
    let result = gc.dispatch(0, ToolKind::BuyProperty, &json!({})).await;
    assert!(!result.is_ok());
    assert_eq!(gc.state.players[0].cash, cash_before);
}

#[tokio::test]
async fn non_active_players_only_see_wait_while_slot_is_held() {
    let (mut gc, _ledger) = new_game(3).await;
    grant_square(&mut gc, 0, 1);

    gc.dispatch(
        0,
        ToolKind::ProposeTrade,
        &json!({
            "recipient_id": 1,
            "offered_property_ids": [1],
            "requested_money": 10,
        }),
    )
    .await;

    // Seat 1 holds the decision; everyone else is spectating
    assert_eq!(gc.state.active_decision_player(), 1);
    assert_eq!(gc.available_actions(0), vec![ToolKind::Wait]);
    assert_eq!(gc.available_actions(2), vec![ToolKind::Wait]);
    assert!(!gc.available_actions(1).is_empty());
}

#[tokio::test]
async fn player_to_player_payments_conserve_total_cash() {
    let (mut gc, _ledger) = new_game(3).await;
    grant_square(&mut gc, 0, 39);

    let total_before: i64 = gc.state.players.iter().map(|p| p.cash).sum();

    gc.state.current_player_index = 1;
    gc.state.players[1].position = 33;
    gc.apply_roll(1, 2, 4).await;

    let total_after: i64 = gc.state.players.iter().map(|p| p.cash).sum();
    assert_eq!(total_before, total_after);
}

#[tokio::test]
async fn advance_turn_skips_bankrupt_and_counts_wraps() {
    let (mut gc, _ledger) = new_game(3).await;
    gc.state.players[1].is_bankrupt = true;

    assert_eq!(gc.state.turn_count, 1);
    gc.advance_turn();
    assert_eq!(gc.state.current_player_index, 2);
    assert_eq!(gc.state.turn_count, 1);

    gc.advance_turn();
    // Wrapping past seat 0 starts a new turn
    assert_eq!(gc.state.current_player_index, 0);
    assert_eq!(gc.state.turn_count, 2);
}

#[tokio::test]
async fn go_salary_paid_when_passing_start() {
    let (mut gc, _ledger) = new_game(2).await;
    grant_square(&mut gc, 0, 1);
    gc.state.players[0].position = 37;

    // Roll 4: passes GO, lands on own Salvador
    gc.apply_roll(0, 1, 3).await;
    assert_eq!(gc.state.players[0].position, 1);
    assert_eq!(gc.state.players[0].cash, STARTING_CASH + 200);
    assert!(gc.state.dice_outcome_processed);
}
