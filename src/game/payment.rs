//! Payment orchestration against the external ledger.
//!
//! Every monetary event is an asynchronous external settlement. Cash fields
//! are only reconciled once the ledger reports success; until then the local
//! state is untouched. Callers must route any failure of a debt-like payment
//! into the bankruptcy path with the same debt amount and creditor.

use std::time::Duration;

use serde_json::{json, Value};

use super::controller::GameController;
use super::state::{Player, PlayerId};
use crate::ledger::{PaymentRequest, PaymentStatus, MINOR_UNITS};

/// How often completion is polled, and the hard cap on waiting
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const COMPLETION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Settled,
    /// The payment never reached the ledger (insufficient funds or rejection)
    InitiationFailed,
    /// The ledger accepted the payment but it did not settle in time
    CompletionFailed,
}

impl PaymentOutcome {
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentOutcome::Settled)
    }
}

pub struct PaymentOrchestrator;

impl PaymentOrchestrator {
    /// Player pays another player (rent, trade legs, bankruptcy transfer)
    pub async fn pay_player_to_player(
        gc: &mut GameController,
        payer: PlayerId,
        recipient: PlayerId,
        amount: i64,
        reason: &str,
        extra_context: Option<Value>,
    ) -> PaymentOutcome {
        if gc.state.players[payer].cash < amount {
            let msg = format!(
                "{} has insufficient funds for ${} payment ({})",
                gc.state.players[payer].name, amount, reason
            );
            gc.state.log(msg);
            return PaymentOutcome::InitiationFailed;
        }

        let trace = Self::trace_context(gc, "player_to_player", payer, Some(recipient), amount, reason, extra_context);
        let request = PaymentRequest {
            payer_account: gc.state.players[payer].ledger_account_id.clone(),
            recipient_account: gc.state.players[recipient].ledger_account_id.clone(),
            amount_minor: amount * MINOR_UNITS,
            asset: gc.asset.clone(),
            network: gc.network.clone(),
            trace_context: trace,
        };

        let outcome = Self::submit_and_await(gc, request).await;
        if outcome.is_settled() {
            gc.state.players[payer].cash -= amount;
            gc.state.players[recipient].cash += amount;
            let msg = format!(
                "{} paid ${} to {} for {}",
                gc.state.players[payer].name, amount, gc.state.players[recipient].name, reason
            );
            gc.state.log(msg);
        } else {
            let msg = format!(
                "Payment failed: {} -> {} ${} ({})",
                gc.state.players[payer].name, gc.state.players[recipient].name, amount, reason
            );
            gc.state.log(msg);
        }
        outcome
    }

    /// Player pays the treasury (purchases, tax, bail, fees)
    pub async fn pay_player_to_system(
        gc: &mut GameController,
        payer: PlayerId,
        amount: i64,
        reason: &str,
    ) -> PaymentOutcome {
        if gc.state.players[payer].cash < amount {
            let msg = format!(
                "{} has insufficient funds for ${} system payment ({})",
                gc.state.players[payer].name, amount, reason
            );
            gc.state.log(msg);
            return PaymentOutcome::InitiationFailed;
        }

        let trace = Self::trace_context(gc, "player_to_system", payer, None, amount, reason, None);
        let request = PaymentRequest {
            payer_account: gc.state.players[payer].ledger_account_id.clone(),
            recipient_account: gc.treasury_account.clone(),
            amount_minor: amount * MINOR_UNITS,
            asset: gc.asset.clone(),
            network: gc.network.clone(),
            trace_context: trace,
        };

        let outcome = Self::submit_and_await(gc, request).await;
        if outcome.is_settled() {
            gc.state.players[payer].cash -= amount;
            let msg = format!(
                "{} paid ${} to the bank for {}",
                gc.state.players[payer].name, amount, reason
            );
            gc.state.log(msg);
        } else {
            let msg = format!(
                "System payment failed: {} ${} ({})",
                gc.state.players[payer].name, amount, reason
            );
            gc.state.log(msg);
        }
        outcome
    }

    /// Treasury pays a player (salary, mortgage loans, house sales, rewards)
    pub async fn pay_system_to_player(
        gc: &mut GameController,
        recipient: PlayerId,
        amount: i64,
        reason: &str,
    ) -> PaymentOutcome {
        let trace = Self::trace_context(gc, "system_to_player", recipient, None, amount, reason, None);
        let request = PaymentRequest {
            payer_account: gc.treasury_account.clone(),
            recipient_account: gc.state.players[recipient].ledger_account_id.clone(),
            amount_minor: amount * MINOR_UNITS,
            asset: gc.asset.clone(),
            network: gc.network.clone(),
            trace_context: trace,
        };

        let outcome = Self::submit_and_await(gc, request).await;
        if outcome.is_settled() {
            gc.state.players[recipient].cash += amount;
            let msg = format!(
                "{} received ${} from the bank for {}",
                gc.state.players[recipient].name, amount, reason
            );
            gc.state.log(msg);
        } else {
            let msg = format!(
                "Bank payment failed: -> {} ${} ({})",
                gc.state.players[recipient].name, amount, reason
            );
            gc.state.log(msg);
        }
        outcome
    }

    async fn submit_and_await(gc: &GameController, request: PaymentRequest) -> PaymentOutcome {
        let handle = match gc.ledger.create_payment(request).await {
            Ok(h) => h,
            Err(e) => {
                tracing::warn!(game_uid = %gc.state.game_uid, "payment creation failed: {e}");
                return PaymentOutcome::InitiationFailed;
            }
        };

        let deadline = tokio::time::Instant::now() + COMPLETION_TIMEOUT;
        loop {
            match gc.ledger.payment_status(&handle.id).await {
                Ok(PaymentStatus::Success) => return PaymentOutcome::Settled,
                Ok(PaymentStatus::Failed) => return PaymentOutcome::CompletionFailed,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(game_uid = %gc.state.game_uid, payment_id = %handle.id, "status poll error: {e}");
                }
            }
            if tokio::time::Instant::now() + POLL_INTERVAL > deadline {
                tracing::warn!(game_uid = %gc.state.game_uid, payment_id = %handle.id, "payment timed out");
                return PaymentOutcome::CompletionFailed;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Deep snapshot attached to every payment, assembled at submission time
    fn trace_context(
        gc: &GameController,
        payment_type: &str,
        subject: PlayerId,
        counterparty: Option<PlayerId>,
        amount: i64,
        reason: &str,
        extra: Option<Value>,
    ) -> Value {
        let state = &gc.state;
        let mut trace = json!({
            "payment_type": payment_type,
            "game_context": {
                "game_uid": state.game_uid,
                "turn_count": state.turn_count,
                "current_player": state.current_player_index,
                "game_phase": gc.game_phase(),
                "dice_roll": if state.dice == (0, 0) { Value::Null } else { json!([state.dice.0, state.dice.1]) },
                "dice_outcome_processed": state.dice_outcome_processed,
                "game_over": state.game_over,
            },
            "players": {
                "subject": Self::player_snapshot(&state.players[subject]),
                "counterparty": counterparty.map(|id| Self::player_snapshot(&state.players[id])),
            },
            "all_players_summary": state
                .players
                .iter()
                .map(|p| json!({
                    "id": p.id,
                    "name": p.name,
                    "position": p.position,
                    "balance": p.cash,
                    "properties_count": p.owned.len(),
                    "is_bankrupt": p.is_bankrupt,
                    "is_in_jail": p.in_jail,
                }))
                .collect::<Vec<_>>(),
            "transaction": {
                "reason": reason,
                "amount": amount,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            },
            "game_history": {
                "recent_events": state.log_tail(10),
            },
        });
        if let Some(extra) = extra {
            trace["agent_decision"] = extra;
        }
        trace
    }

    fn player_snapshot(p: &Player) -> Value {
        json!({
            "id": p.id,
            "name": p.name,
            "position": p.position,
            "balance_before": p.cash,
            "properties_owned": p.owned.iter().collect::<Vec<_>>(),
            "properties_count": p.owned.len(),
            "is_in_jail": p.in_jail,
            "jail_turns_attempted": p.jail_turns_attempted,
            "is_bankrupt": p.is_bankrupt,
            "has_gooj_cards": {
                "chance": p.gooj_chance,
                "community_chest": p.gooj_community,
            },
        })
    }
}
