//! Magnate Arena - a multi-tenant AI board game server
//!
//! Concurrently runs many Monopoly-style games driven by LLM agents, built
//! with:
//! - Axum for HTTP/WebSocket
//! - SQLx for the PostgreSQL audit trail
//! - Reqwest clients for the external ledger and LLM services
//!
//! Architecture:
//! - `api/` - HTTP handlers and WebSocket endpoints
//! - `game/` - Core game state machine, rules engine and managers
//! - `agent/` - LLM-backed decision making for game seats
//! - `runner/` - Per-game harness loop and the multi-game supervisor
//! - `ledger` - External settlement service client
//! - `db/` - Audit trail persistence
//! - `ws/` - WebSocket hub for event fanout

pub mod agent;
pub mod api;
pub mod db;
pub mod game;
pub mod ledger;
pub mod runner;
pub mod ws;

pub mod config;
pub mod error;
