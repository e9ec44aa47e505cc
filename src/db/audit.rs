//! Audit store - relational record of games, turns and agent decisions

use serde_json::Value;
use sqlx::{PgPool, Row};

use crate::agent::{AgentProfile, DecisionAudit};
use crate::game::{ActionResult, GameStatus, PlayerId};

pub struct AuditStore {
    pool: PgPool,
}

impl AuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn record_game_start(
        &self,
        game_uid: &str,
        agents: &[AgentProfile],
        starting_balance: i64,
        max_turns: u32,
    ) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            "INSERT INTO games (game_uid, status, num_players, max_turns) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(game_uid)
        .bind("initializing")
        .bind(agents.len() as i32)
        .bind(max_turns as i32)
        .fetch_one(&self.pool)
        .await?;
        let game_id: i64 = row.get(0);

        for (seat, agent) in agents.iter().enumerate() {
            sqlx::query(
                "INSERT INTO game_players (game_id, agent_uid, seat, starting_balance) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(game_id)
            .bind(&agent.uid)
            .bind(seat as i32)
            .bind(starting_balance)
            .execute(&self.pool)
            .await?;
        }

        Ok(game_id)
    }

    pub async fn record_status(&self, game_id: i64, status: GameStatus) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE games SET status = $2 WHERE id = $1")
            .bind(game_id)
            .bind(status_str(status))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn record_turn_snapshot(
        &self,
        game_id: i64,
        turn_number: u32,
        acting_seat: PlayerId,
        snapshot: &Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO game_turns (game_id, turn_number, acting_seat, state_snapshot) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(game_id)
        .bind(turn_number as i32)
        .bind(acting_seat as i32)
        .bind(snapshot)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn record_agent_action(
        &self,
        game_id: i64,
        turn_number: u32,
        seat: PlayerId,
        sequence: u32,
        state_before: &Value,
        audit: &DecisionAudit,
        result: &ActionResult,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO agent_actions \
             (game_id, turn_number, seat, sequence, state_before, thoughts, raw_response, \
              parsed_json, chosen_tool, parameters, result_status, result_message) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(game_id)
        .bind(turn_number as i32)
        .bind(seat as i32)
        .bind(sequence as i32)
        .bind(state_before)
        .bind(&audit.thoughts)
        .bind(&audit.raw_response)
        .bind(&audit.parsed_json)
        .bind(&audit.chosen_tool)
        .bind(&audit.parameters)
        .bind(result.status.as_str())
        .bind(&result.message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn record_game_end(
        &self,
        game_id: i64,
        status: GameStatus,
        winner_seat: Option<PlayerId>,
        final_balances: &[(PlayerId, i64, usize)],
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE games SET status = $2, winner_seat = $3, ended_at = now() WHERE id = $1",
        )
        .bind(game_id)
        .bind(status_str(status))
        .bind(winner_seat.map(|s| s as i32))
        .execute(&self.pool)
        .await?;

        for (seat, balance, rank) in final_balances {
            sqlx::query(
                "UPDATE game_players SET final_balance = $3, final_rank = $4 \
                 WHERE game_id = $1 AND seat = $2",
            )
            .bind(game_id)
            .bind(*seat as i32)
            .bind(*balance)
            .bind(*rank as i32)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    pub async fn upsert_agent(&self, agent: &AgentProfile) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO agents (uid, name, personality, ledger_account_id, games_played, games_won) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (uid) DO UPDATE SET \
               games_played = EXCLUDED.games_played, \
               games_won = EXCLUDED.games_won",
        )
        .bind(&agent.uid)
        .bind(&agent.name)
        .bind(&agent.personality)
        .bind(&agent.ledger_account_id)
        .bind(agent.games_played as i32)
        .bind(agent.games_won as i32)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn load_agents(&self) -> Result<Vec<AgentProfile>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT uid, name, personality, ledger_account_id, games_played, games_won \
             FROM agents ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| AgentProfile {
                uid: row.get(0),
                name: row.get(1),
                personality: row.get(2),
                ledger_account_id: row.get(3),
                games_played: row.get::<i32, _>(4) as u32,
                games_won: row.get::<i32, _>(5) as u32,
            })
            .collect())
    }
}

fn status_str(status: GameStatus) -> &'static str {
    match status {
        GameStatus::Initializing => "initializing",
        GameStatus::InProgress => "in_progress",
        GameStatus::Completed => "completed",
        GameStatus::MaxTurnsReached => "max_turns_reached",
        GameStatus::AbortedNoWinner => "aborted_no_winner",
        GameStatus::Crashed => "crashed",
    }
}
