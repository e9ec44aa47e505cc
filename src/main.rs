use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::sync::{mpsc, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use magnate_arena::{
    agent::HttpChatCompletion,
    api,
    config::Config,
    db,
    db::AuditStore,
    game::LobbyEvent,
    ledger::HttpLedger,
    runner::{Supervisor, SupervisorConfig},
    ws,
    ws::Hub,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "magnate_arena=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load config
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    // Audit store is optional; games run without it
    let audit = match &config.database_url {
        Some(url) => {
            let pool = db::create_pool(url).await?;
            Some(Arc::new(AuditStore::new(pool)))
        }
        None => {
            tracing::warn!("DATABASE_URL not set - audit trail disabled");
            None
        }
    };

    // External service clients
    let ledger = Arc::new(HttpLedger::new(config.ledger_base_url.clone()));
    let llm = Arc::new(HttpChatCompletion::new(
        config.llm_base_url.clone(),
        config.llm_api_key.clone(),
        config.llm_model.clone(),
    ));

    // Event fanout
    let hub = Arc::new(RwLock::new(Hub::new()));
    let (lobby_tx, lobby_rx) = mpsc::unbounded_channel::<LobbyEvent>();
    ws::spawn_lobby_fanout(hub.clone(), lobby_rx);

    // Supervisor
    let supervisor = Supervisor::new(
        SupervisorConfig {
            target_games: config.concurrent_games,
            agents_per_game: config.agents_per_game,
            auto_restart: config.auto_restart_games,
        },
        hub.clone(),
        lobby_tx,
        ledger,
        llm,
        audit,
        config.treasury_account_id.clone(),
        config.asset_symbol.clone(),
        config.settlement_network.clone(),
    );
    supervisor
        .seed_agents(config.concurrent_games * config.agents_per_game)
        .await;
    tokio::spawn(supervisor.clone().run_maintenance_loop());

    // Build router
    let app_state = api::AppState {
        supervisor,
        hub,
    };
    let app = Router::new()
        .merge(api::routes())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("🎲 Magnate Arena server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
