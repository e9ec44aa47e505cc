//! Multi-game supervisor: agent pool, target concurrency, crash isolation.
//!
//! Agents are reserved from the pool *before* a game worker spawns so two
//! maintenance passes can never double-allocate a seat.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use serde_json::{json, Value};
use tokio::sync::{mpsc, RwLock};

use super::harness::{GameOutcome, GameRunner, MAX_TURNS};
use crate::agent::{AgentClient, AgentProfile, ChatCompletionService};
use crate::db::AuditStore;
use crate::game::{
    GameController, GameStatus, LobbyEvent, Player, ServerEvent, STARTING_CASH,
};
use crate::ledger::{LedgerService, MINOR_UNITS};
use crate::ws::Hub;

/// Cadence of the replenishment tick
pub const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(30);
/// Hard bound accepted by the admin config endpoint
pub const MAX_CONCURRENT_GAMES: usize = 10;

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub target_games: usize,
    pub agents_per_game: usize,
    pub auto_restart: bool,
}

/// Registry entry for one game
#[derive(Debug, Clone)]
struct GameEntry {
    status: GameStatus,
    players: Vec<String>,
    winner: Option<usize>,
}

/// Pool of idle agents plus the reservation map. One mutex guards both so
/// acquire-and-reserve is atomic.
#[derive(Default)]
struct AgentPool {
    available: Vec<AgentProfile>,
    reserved: HashMap<String, Vec<AgentProfile>>,
}

pub struct Supervisor {
    config: Mutex<SupervisorConfig>,
    pool: Mutex<AgentPool>,
    games: Mutex<HashMap<String, GameEntry>>,
    hub: Arc<RwLock<Hub>>,
    lobby_tx: mpsc::UnboundedSender<LobbyEvent>,
    ledger: Arc<dyn LedgerService>,
    llm: Arc<dyn ChatCompletionService>,
    audit: Option<Arc<AuditStore>>,
    treasury_account: String,
    asset: String,
    network: String,
}

impl Supervisor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: SupervisorConfig,
        hub: Arc<RwLock<Hub>>,
        lobby_tx: mpsc::UnboundedSender<LobbyEvent>,
        ledger: Arc<dyn LedgerService>,
        llm: Arc<dyn ChatCompletionService>,
        audit: Option<Arc<AuditStore>>,
        treasury_account: String,
        asset: String,
        network: String,
    ) -> Arc<Self> {
        Arc::new(Self {
            config: Mutex::new(config),
            pool: Mutex::new(AgentPool::default()),
            games: Mutex::new(HashMap::new()),
            hub,
            lobby_tx,
            ledger,
            llm,
            audit,
            treasury_account,
            asset,
            network,
        })
    }

    /// Seed the pool, preferring persisted agents over freshly minted ones
    pub async fn seed_agents(&self, minimum: usize) {
        let mut agents = match &self.audit {
            Some(audit) => audit.load_agents().await.unwrap_or_default(),
            None => Vec::new(),
        };
        if agents.len() < minimum {
            let fresh = crate::agent::generate_random_agents(minimum - agents.len());
            if let Some(audit) = &self.audit {
                for agent in &fresh {
                    let _ = audit.upsert_agent(agent).await;
                }
            }
            agents.extend(fresh);
        }
        tracing::info!("agent pool seeded with {} agents", agents.len());
        self.pool.lock().unwrap().available = agents;
    }

    pub fn add_agents(&self, agents: Vec<AgentProfile>) {
        self.pool.lock().unwrap().available.extend(agents);
    }

    /// Periodic replenishment loop; runs until the process exits
    pub async fn run_maintenance_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(MAINTENANCE_INTERVAL);
        loop {
            ticker.tick().await;
            self.clone().maintenance_tick().await;
        }
    }

    /// Bring the number of running games up to the configured target
    pub async fn maintenance_tick(self: Arc<Self>) -> usize {
        let (target, auto_restart) = {
            let config = self.config.lock().unwrap();
            (config.target_games, config.auto_restart)
        };
        if !auto_restart {
            return 0;
        }

        let running = self.running_game_count();
        let mut started = 0;
        for _ in running..target {
            match self.clone().spawn_game() {
                Some(_) => started += 1,
                None => break,
            }
        }
        if started > 0 {
            tracing::info!("maintenance started {} new games", started);
        }
        started
    }

    fn running_game_count(&self) -> usize {
        self.games
            .lock()
            .unwrap()
            .values()
            .filter(|g| matches!(g.status, GameStatus::Initializing | GameStatus::InProgress))
            .count()
    }

    /// Atomically reserve agents and launch a game worker. Returns the new
    /// game uid, or None when the pool cannot seat a full game.
    pub fn spawn_game(self: Arc<Self>) -> Option<String> {
        let agents_per_game = self.config.lock().unwrap().agents_per_game;

        let reserved = {
            let mut pool = self.pool.lock().unwrap();
            if pool.available.len() < agents_per_game {
                tracing::debug!(
                    "not enough agents for a new game ({} available, {} needed)",
                    pool.available.len(),
                    agents_per_game
                );
                return None;
            }
            let reserved: Vec<AgentProfile> =
                pool.available.drain(..agents_per_game).collect();
            reserved
        };

        let game_uid = format!("game_{}", uuid::Uuid::new_v4().simple());
        self.pool
            .lock()
            .unwrap()
            .reserved
            .insert(game_uid.clone(), reserved.clone());

        self.games.lock().unwrap().insert(
            game_uid.clone(),
            GameEntry {
                status: GameStatus::Initializing,
                players: reserved.iter().map(|a| a.name.clone()).collect(),
                winner: None,
            },
        );

        let (events_tx, events_rx) = mpsc::unbounded_channel::<ServerEvent>();
        crate::ws::spawn_game_fanout(self.hub.clone(), game_uid.clone(), events_rx);

        let players: Vec<Player> = reserved
            .iter()
            .enumerate()
            .map(|(seat, agent)| {
                Player::new(seat, agent.name.clone(), agent.ledger_account_id.clone())
            })
            .collect();
        let controller = GameController::new(
            game_uid.clone(),
            players,
            self.ledger.clone(),
            self.treasury_account.clone(),
            self.asset.clone(),
            self.network.clone(),
            events_tx.clone(),
        );
        let agent_clients: Vec<AgentClient> = reserved
            .iter()
            .map(|profile| AgentClient::new(profile.clone(), self.llm.clone()))
            .collect();
        let runner = GameRunner::new(
            controller,
            agent_clients,
            self.audit.clone(),
            self.lobby_tx.clone(),
        );

        tracing::info!(game_uid = %game_uid, "spawning game worker");
        let supervisor = self.clone();
        let worker_uid = game_uid.clone();
        tokio::spawn(async move {
            // A panic inside one game must never touch the others
            let result = std::panic::AssertUnwindSafe(runner.run()).catch_unwind().await;
            match result {
                Ok(outcome) => supervisor.finish_game(&worker_uid, outcome).await,
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".into());
                    tracing::error!(game_uid = %worker_uid, "game worker crashed: {message}");
                    let _ = events_tx.send(ServerEvent::CriticalError {
                        message: format!("game {} crashed: {}", worker_uid, message),
                    });
                    supervisor.mark_crashed(&worker_uid).await;
                }
            }
        });

        Some(game_uid)
    }

    /// Normal completion: update stats, release agents, update the registry
    async fn finish_game(&self, game_uid: &str, outcome: GameOutcome) {
        tracing::info!(
            game_uid = %game_uid,
            status = ?outcome.status,
            winner = ?outcome.winner,
            turns = outcome.turns,
            "game finished"
        );

        self.release_agents(game_uid, outcome.winner).await;

        let mut games = self.games.lock().unwrap();
        if let Some(entry) = games.get_mut(game_uid) {
            entry.status = outcome.status;
            entry.winner = outcome.winner;
        }
    }

    async fn mark_crashed(&self, game_uid: &str) {
        self.release_agents(game_uid, None).await;
        let mut games = self.games.lock().unwrap();
        if let Some(entry) = games.get_mut(game_uid) {
            entry.status = GameStatus::Crashed;
        }
        drop(games);

        let _ = self.lobby_tx.send(LobbyEvent::GameStatusUpdate {
            game_uid: game_uid.to_string(),
            status: GameStatus::Crashed,
            turn_count: 0,
            winner: None,
        });
    }

    /// Return a game's agents to the pool with updated win/play statistics
    async fn release_agents(&self, game_uid: &str, winner_seat: Option<usize>) -> usize {
        let mut released = {
            let mut pool = self.pool.lock().unwrap();
            pool.reserved.remove(game_uid).unwrap_or_default()
        };

        for (seat, agent) in released.iter_mut().enumerate() {
            agent.games_played += 1;
            if winner_seat == Some(seat) {
                agent.games_won += 1;
            }
        }
        if let Some(audit) = &self.audit {
            for agent in &released {
                let _ = audit.upsert_agent(agent).await;
            }
        }

        let count = released.len();
        self.pool.lock().unwrap().available.extend(released);
        tracing::debug!(game_uid = %game_uid, "released {} agents back to pool", count);
        count
    }

    // === Admin and query surface ===

    pub fn update_config(&self, target_games: Option<usize>, auto_restart: Option<bool>) -> SupervisorConfig {
        let mut config = self.config.lock().unwrap();
        if let Some(target) = target_games {
            config.target_games = target.min(MAX_CONCURRENT_GAMES);
        }
        if let Some(auto) = auto_restart {
            config.auto_restart = auto;
        }
        config.clone()
    }

    pub async fn create_agents(&self, count: usize) -> Vec<AgentProfile> {
        let fresh = crate::agent::generate_random_agents(count);
        if let Some(audit) = &self.audit {
            for agent in &fresh {
                let _ = audit.upsert_agent(agent).await;
            }
        }
        self.add_agents(fresh.clone());
        fresh
    }

    /// Zero-set one agent's game balance on the ledger
    pub async fn reset_agent_balance(&self, agent_uid: &str) -> Result<(), crate::ledger::LedgerError> {
        let account = {
            let pool = self.pool.lock().unwrap();
            pool.available
                .iter()
                .chain(pool.reserved.values().flatten())
                .find(|a| a.uid == agent_uid)
                .map(|a| a.ledger_account_id.clone())
        };
        match account {
            Some(account) => {
                self.ledger
                    .reset_asset_account(
                        &account,
                        &self.asset,
                        STARTING_CASH * MINOR_UNITS,
                        &self.network,
                    )
                    .await
            }
            None => Err(crate::ledger::LedgerError::NotFound(agent_uid.to_string())),
        }
    }

    pub fn list_games(&self) -> Value {
        let games = self.games.lock().unwrap();
        json!(games
            .iter()
            .map(|(uid, entry)| json!({
                "game_uid": uid,
                "status": entry.status,
                "players": entry.players,
                "winner_seat": entry.winner,
            }))
            .collect::<Vec<_>>())
    }

    pub fn status(&self) -> Value {
        let config = self.config.lock().unwrap().clone();
        json!({
            "target_games": config.target_games,
            "agents_per_game": config.agents_per_game,
            "auto_restart_games": config.auto_restart,
            "running_games": self.running_game_count(),
            "total_games": self.games.lock().unwrap().len(),
            "max_turns": MAX_TURNS,
        })
    }

    pub fn pool_status(&self) -> Value {
        let pool = self.pool.lock().unwrap();
        json!({
            "available": pool
                .available
                .iter()
                .map(|a| json!({
                    "uid": a.uid,
                    "name": a.name,
                    "games_played": a.games_played,
                    "games_won": a.games_won,
                }))
                .collect::<Vec<_>>(),
            "reserved": pool
                .reserved
                .iter()
                .map(|(game, agents)| json!({
                    "game_uid": game,
                    "agents": agents.iter().map(|a| a.name.clone()).collect::<Vec<_>>(),
                }))
                .collect::<Vec<_>>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;

    /// Never answers, so spawned game workers block at their first decision
    /// and pool assertions stay race-free
    struct HangingChat;

    #[async_trait::async_trait]
    impl ChatCompletionService for HangingChat {
        async fn complete(
            &self,
            _system: &str,
            _user: &str,
        ) -> Result<String, crate::agent::LlmError> {
            futures::future::pending::<()>().await;
            unreachable!()
        }
    }

    fn test_supervisor(target: usize, agents_per_game: usize) -> Arc<Supervisor> {
        let hub = Arc::new(RwLock::new(Hub::new()));
        let (lobby_tx, _lobby_rx) = mpsc::unbounded_channel();
        Supervisor::new(
            SupervisorConfig {
                target_games: target,
                agents_per_game,
                auto_restart: true,
            },
            hub,
            lobby_tx,
            Arc::new(InMemoryLedger::new()),
            Arc::new(HangingChat),
            None,
            "treasury".into(),
            "AMN".into(),
            "solana".into(),
        )
    }

    #[test]
    fn spawn_refused_when_pool_too_small() {
        let supervisor = test_supervisor(1, 4);
        supervisor.add_agents(crate::agent::generate_random_agents(3));
        assert!(supervisor.clone().spawn_game().is_none());
        assert_eq!(supervisor.pool.lock().unwrap().available.len(), 3);
    }

    #[tokio::test]
    async fn reservation_removes_agents_from_pool_before_spawn() {
        let supervisor = test_supervisor(1, 2);
        supervisor.add_agents(crate::agent::generate_random_agents(5));

        let game_uid = supervisor.clone().spawn_game().unwrap();
        let pool = supervisor.pool.lock().unwrap();
        assert_eq!(pool.available.len(), 3);
        assert_eq!(pool.reserved.get(&game_uid).map(|v| v.len()), Some(2));
    }

    #[tokio::test]
    async fn release_updates_statistics_and_returns_agents() {
        let supervisor = test_supervisor(1, 2);
        supervisor.add_agents(crate::agent::generate_random_agents(2));
        let game_uid = supervisor.clone().spawn_game().unwrap();

        supervisor.release_agents(&game_uid, Some(1)).await;
        let pool = supervisor.pool.lock().unwrap();
        assert_eq!(pool.available.len(), 2);
        assert!(pool.reserved.is_empty());
        let winner = &pool.available[1];
        assert_eq!(winner.games_played, 1);
        assert_eq!(winner.games_won, 1);
        assert_eq!(pool.available[0].games_won, 0);
    }

    #[test]
    fn config_update_clamps_target() {
        let supervisor = test_supervisor(2, 4);
        let config = supervisor.update_config(Some(50), None);
        assert_eq!(config.target_games, MAX_CONCURRENT_GAMES);
    }
}
