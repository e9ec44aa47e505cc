//! Shared fixtures for integration tests

use std::sync::Arc;

use tokio::sync::mpsc;

use magnate_arena::game::{GameController, GameStatus, Player, STARTING_CASH};
use magnate_arena::ledger::{InMemoryLedger, LedgerService, MINOR_UNITS};

/// A controller wired to an instant-settling in-memory ledger, with every
/// seat funded at the standard starting cash.
pub async fn new_game(player_count: usize) -> (GameController, Arc<InMemoryLedger>) {
    let ledger = Arc::new(InMemoryLedger::new());
    let (events_tx, _events_rx) = mpsc::unbounded_channel();

    let players: Vec<Player> = (0..player_count)
        .map(|i| Player::new(i, format!("Player{i}"), format!("acct-{i}")))
        .collect();

    let mut gc = GameController::new(
        "g-test".into(),
        players,
        ledger.clone(),
        "treasury".into(),
        "AMN".into(),
        "solana".into(),
        events_tx,
    );

    for player in &gc.state.players {
        ledger
            .reset_asset_account(
                &player.ledger_account_id,
                "AMN",
                STARTING_CASH * MINOR_UNITS,
                "solana",
            )
            .await
            .unwrap();
    }
    gc.state.status = GameStatus::InProgress;

    (gc, ledger)
}

/// Hand a square to a player, bypassing the purchase flow
pub fn grant_square(gc: &mut GameController, player: usize, square_id: u8) {
    gc.state.tile_mut(square_id).unwrap().owner = Some(player);
    gc.state.players[player].owned.insert(square_id);
}

/// Set a player's cash both locally and on the ledger
pub async fn set_cash(gc: &mut GameController, ledger: &InMemoryLedger, player: usize, cash: i64) {
    gc.state.players[player].cash = cash;
    ledger
        .reset_asset_account(
            &gc.state.players[player].ledger_account_id,
            "AMN",
            cash * MINOR_UNITS,
            "solana",
        )
        .await
        .unwrap();
}
