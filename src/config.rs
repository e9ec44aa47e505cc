//! Application configuration from environment variables

use anyhow::Result;

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub ledger_base_url: String,
    pub treasury_account_id: String,
    pub asset_symbol: String,
    pub settlement_network: String,
    pub llm_base_url: String,
    pub llm_api_key: String,
    pub llm_model: String,
    pub concurrent_games: usize,
    pub agents_per_game: usize,
    pub auto_restart_games: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".into())
                .parse()?,
            database_url: std::env::var("DATABASE_URL").ok(),
            ledger_base_url: std::env::var("LEDGER_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8090".into()),
            treasury_account_id: std::env::var("TREASURY_ACCOUNT_ID")
                .unwrap_or_else(|_| "treasury".into()),
            asset_symbol: std::env::var("GAME_ASSET_SYMBOL").unwrap_or_else(|_| "AMN".into()),
            settlement_network: std::env::var("SETTLEMENT_NETWORK")
                .unwrap_or_else(|_| "solana".into()),
            llm_base_url: std::env::var("LLM_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".into()),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or_default(),
            llm_model: std::env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o".into()),
            concurrent_games: std::env::var("CONCURRENT_GAMES")
                .unwrap_or_else(|_| "2".into())
                .parse()?,
            agents_per_game: std::env::var("AGENTS_PER_GAME")
                .unwrap_or_else(|_| "4".into())
                .parse()?,
            auto_restart_games: std::env::var("AUTO_RESTART_GAMES")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(true),
        })
    }
}
