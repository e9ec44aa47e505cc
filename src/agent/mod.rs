//! Agent module - LLM-backed decision making for game seats

mod client;
mod llm;
mod prompt;

pub use client::{AgentClient, AgentDecision, DecisionAudit};
pub use llm::{ChatCompletionService, HttpChatCompletion, LlmError};

use serde::{Deserialize, Serialize};

/// Persistent identity of an agent, pooled across games
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub uid: String,
    pub name: String,
    pub personality: String,
    pub ledger_account_id: String,
    pub games_played: u32,
    pub games_won: u32,
}

const AGENT_FIRST_NAMES: &[&str] = &[
    "Ada", "Blaise", "Curie", "Dijkstra", "Euler", "Fermat", "Gauss", "Hopper", "Ishizaka",
    "Jacobi", "Kepler", "Lovelace", "Mandel", "Noether", "Oiler", "Pascal",
];

const AGENT_PERSONALITIES: &[&str] = &[
    "aggressive accumulator who buys everything affordable",
    "patient value investor who hoards cash until the midgame",
    "relentless negotiator who proposes trades constantly",
    "cautious builder who only develops completed color groups",
    "risk-taker who bids high in auctions to deny opponents",
    "balanced strategist who adapts to the table",
];

/// Mint fresh agent identities for the pool
pub fn generate_random_agents(count: usize) -> Vec<AgentProfile> {
    use rand::seq::SliceRandom;
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| {
            let first = AGENT_FIRST_NAMES.choose(&mut rng).unwrap();
            let number: u32 = rng.gen_range(100..1000);
            let uid = format!("agent_{}", uuid::Uuid::new_v4().simple());
            AgentProfile {
                name: format!("{first}-{number}"),
                personality: AGENT_PERSONALITIES.choose(&mut rng).unwrap().to_string(),
                ledger_account_id: uid.clone(),
                uid,
                games_played: 0,
                games_won: 0,
            }
        })
        .collect()
}
