use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

mod auth;
mod config;
mod deck;
mod error;
mod game;
mod protocol;
mod room;
mod session;
mod telemetry;
mod typechart;
mod ws;

use crate::auth::JwtAuthenticator;
use crate::deck::InMemoryDeckRepository;
use crate::room::RoomRegistry;
use crate::session::SessionTable;
use crate::ws::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();

    let config = config::Config::from_env();

    let state = AppState {
        rooms: Arc::new(RoomRegistry::new()),
        sessions: Arc::new(SessionTable::new()),
        deck_repo: Arc::new(InMemoryDeckRepository::new()),
        authenticator: Arc::new(JwtAuthenticator::new(config.jwt_secret.clone())),
    };

    // The duel channel coexists on this router alongside the out-of-scope
    // HTTP surface (signup/signin, deck CRUD); this Router is meant to be
    // `.merge`d into that larger one, not to own the whole process.
    let app = Router::new()
        .route("/healthz", get(ws::healthz))
        .route("/ws", get(ws::ws_handler))
        .layer(CorsLayer::new().allow_methods(Any).allow_headers(Any).allow_origin(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if config.test_mode {
        info!("test mode: skipping network listener");
        return Ok(());
    }

    let addr: SocketAddr = config.server_addr();
    info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
