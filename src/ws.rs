//! Event dispatcher (C6) and channel lifecycle: binds inbound event names
//! to handlers on each authenticated session, emits outbound events to
//! individual sessions and room broadcasts, and tears the session's rooms
//! down on close.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::SessionAuthenticator;
use crate::deck::DeckRepository;
use crate::error::GameError;
use crate::game::{GameState, Role};
use crate::protocol::{coerce_int, ClientEvent, RoleInfo, ServerEvent};
use crate::room::RoomRegistry;
use crate::session::{AuthenticatedSession, SessionTable};

#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<RoomRegistry>,
    pub sessions: Arc<SessionTable>,
    pub deck_repo: Arc<dyn DeckRepository>,
    pub authenticator: Arc<dyn SessionAuthenticator>,
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

pub async fn healthz() -> &'static str {
    "ok"
}

/// Authenticates at the handshake (before any events are accepted) and
/// upgrades. A failed auth never reaches `on_upgrade`.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let claims = state
        .authenticator
        .authenticate(query.token.as_deref())
        .map_err(|e| (StatusCode::UNAUTHORIZED, e.wire_message()))?;

    let session = AuthenticatedSession { id: Uuid::new_v4(), user_id: claims.user_id, email: claims.email };
    Ok(ws.on_upgrade(move |socket| handle_socket(state, session, socket)))
}

async fn handle_socket(state: AppState, session: AuthenticatedSession, socket: WebSocket) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ServerEvent>();
    state.sessions.insert(session.id, out_tx);
    info!(session_id = %session.id, user_id = %session.user_id, "session connected");

    let forward = tokio::spawn(async move {
        while let Some(event) = out_rx.recv().await {
            if ws_tx.send(Message::Text(event.to_text())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = ws_rx.next().await {
        match msg {
            Message::Text(text) => handle_inbound(&state, &session, &text).await,
            Message::Close(_) => break,
            _ => {}
        }
    }

    forward.abort();
    state.sessions.remove(session.id);
    let changed = state.rooms.remove_by_session(session.id);
    if changed {
        state.sessions.broadcast(ServerEvent::RoomsListUpdated(state.rooms.list_waiting()));
    }
    info!(session_id = %session.id, "session disconnected");
}

async fn handle_inbound(state: &AppState, session: &AuthenticatedSession, text: &str) {
    match ClientEvent::parse(text) {
        None => warn!(session_id = %session.id, "dropped unparseable frame"),
        Some(Err(unknown_event)) => {
            state.sessions.send_to(
                session.id,
                ServerEvent::Error { event: unknown_event, message: "BAD_REQUEST".to_string() },
            );
        }
        Some(Ok(event)) => dispatch(state, session, event).await,
    }
}

fn reply_error(state: &AppState, session_id: Uuid, event_name: &str, err: GameError) {
    state.sessions.send_to(
        session_id,
        ServerEvent::Error { event: event_name.to_string(), message: err.wire_message() },
    );
}

fn require_room_id(value: &serde_json::Value) -> Result<u64, GameError> {
    coerce_int(value)
        .filter(|v| *v >= 0)
        .map(|v| v as u64)
        .ok_or_else(GameError::bad_request)
}

async fn dispatch(state: &AppState, session: &AuthenticatedSession, event: ClientEvent) {
    let event_name = event.name();
    match event {
        ClientEvent::GetRooms => {
            state.sessions.send_to(session.id, ServerEvent::RoomsList(state.rooms.list_waiting()));
        }
        ClientEvent::CreateRoom { deck_id } => {
            let Some(deck_id) = coerce_int(&deck_id) else {
                return reply_error(state, session.id, event_name, GameError::bad_request());
            };
            match state.rooms.create_room(&*state.deck_repo, session.id, &session.user_id, deck_id).await {
                Ok(view) => {
                    state.sessions.send_to(session.id, ServerEvent::RoomCreated(view));
                    state.sessions.broadcast(ServerEvent::RoomsListUpdated(state.rooms.list_waiting()));
                }
                Err(e) => reply_error(state, session.id, event_name, e),
            }
        }
        ClientEvent::JoinRoom { room_id, deck_id } => {
            let (Some(room_id), Some(deck_id)) = (coerce_int(&room_id), coerce_int(&deck_id)) else {
                return reply_error(state, session.id, event_name, GameError::bad_request());
            };
            if room_id < 0 {
                return reply_error(state, session.id, event_name, GameError::bad_request());
            }
            match state
                .rooms
                .join_room(&*state.deck_repo, session.id, &session.user_id, room_id as u64, deck_id)
                .await
            {
                Ok((joined, host_cards, guest_cards)) => {
                    let game = GameState::initialize(
                        joined.host_session_id,
                        joined.guest_session_id,
                        host_cards,
                        guest_cards,
                    );
                    state.rooms.set_game(room_id as u64, game);

                    state.sessions.send_to(
                        joined.host_session_id,
                        ServerEvent::GameStarted {
                            room_id: room_id as u64,
                            you: RoleInfo { role: Role::Host, user_id: joined.host_user_id.clone(), deck_id: joined.host_deck_id },
                            opponent: RoleInfo { role: Role::Guest, user_id: joined.guest_user_id.clone(), deck_id: joined.guest_deck_id },
                        },
                    );
                    state.sessions.send_to(
                        joined.guest_session_id,
                        ServerEvent::GameStarted {
                            room_id: room_id as u64,
                            you: RoleInfo { role: Role::Guest, user_id: joined.guest_user_id, deck_id: joined.guest_deck_id },
                            opponent: RoleInfo { role: Role::Host, user_id: joined.host_user_id, deck_id: joined.host_deck_id },
                        },
                    );
                    state.sessions.broadcast(ServerEvent::RoomsListUpdated(state.rooms.list_waiting()));
                }
                Err(e) => reply_error(state, session.id, event_name, e),
            }
        }
        ClientEvent::DrawCards { room_id } => {
            let room_id = match require_room_id(&room_id) {
                Ok(id) => id,
                Err(e) => return reply_error(state, session.id, event_name, e),
            };
            let result = state.rooms.with_game(room_id, |game| game.draw_cards(session.id));
            handle_mutation_result(state, session.id, event_name, room_id, result.unwrap_or_else(|| Err(GameError::bad_request())));
        }
        ClientEvent::PlayCard { room_id, card_index } => {
            let room_id = match require_room_id(&room_id) {
                Ok(id) => id,
                Err(e) => return reply_error(state, session.id, event_name, e),
            };
            let Some(card_index) = coerce_int(&card_index).filter(|i| *i >= 0) else {
                return reply_error(state, session.id, event_name, GameError::bad_request());
            };
            let result = state.rooms.with_game(room_id, |game| game.play_card(session.id, card_index as usize));
            handle_mutation_result(state, session.id, event_name, room_id, result.unwrap_or_else(|| Err(GameError::bad_request())));
        }
        ClientEvent::Attack { room_id } => {
            let room_id = match require_room_id(&room_id) {
                Ok(id) => id,
                Err(e) => return reply_error(state, session.id, event_name, e),
            };
            let result = state.rooms.with_game(room_id, |game| game.attack(session.id));
            match result {
                None => reply_error(state, session.id, event_name, GameError::bad_request()),
                Some(Err(e)) => reply_error(state, session.id, event_name, e),
                Some(Ok(None)) => broadcast_game_state(state, room_id),
                Some(Ok(Some(ended))) => {
                    let (host_id, guest_id) = room_session_ids(state, room_id);
                    let ended_event = ServerEvent::GameEnded {
                        room_id,
                        winner_session_id: ended.winner_session_id,
                        host_score: ended.host_score,
                        guest_score: ended.guest_score,
                    };
                    if let Some(host_id) = host_id {
                        state.sessions.send_to(host_id, ended_event.clone());
                    }
                    if let Some(guest_id) = guest_id {
                        state.sessions.send_to(guest_id, ended_event);
                    }
                    state.rooms.remove_room(room_id);
                    state.sessions.broadcast(ServerEvent::RoomsListUpdated(state.rooms.list_waiting()));
                }
            }
        }
        ClientEvent::EndTurn { room_id } => {
            let room_id = match require_room_id(&room_id) {
                Ok(id) => id,
                Err(e) => return reply_error(state, session.id, event_name, e),
            };
            let result = state.rooms.with_game(room_id, |game| game.end_turn(session.id));
            handle_mutation_result(state, session.id, event_name, room_id, result.unwrap_or_else(|| Err(GameError::bad_request())));
        }
    }
}

fn handle_mutation_result(
    state: &AppState,
    session_id: Uuid,
    event_name: &str,
    room_id: u64,
    result: Result<(), GameError>,
) {
    match result {
        Ok(()) => broadcast_game_state(state, room_id),
        Err(e) => reply_error(state, session_id, event_name, e),
    }
}

fn room_session_ids(state: &AppState, room_id: u64) -> (Option<Uuid>, Option<Uuid>) {
    state
        .rooms
        .with_game(room_id, |game| (game.host_session_id, game.guest_session_id))
        .map(|(h, g)| (Some(h), Some(g)))
        .unwrap_or((None, None))
}

fn broadcast_game_state(state: &AppState, room_id: u64) {
    let views = state.rooms.with_game(room_id, |game| {
        let host_view = game.view_for(game.host_session_id);
        let guest_view = game.view_for(game.guest_session_id);
        (game.host_session_id, game.guest_session_id, host_view, guest_view)
    });
    if let Some((host_id, guest_id, Some(host_view), Some(guest_view))) = views {
        state.sessions.send_to(host_id, ServerEvent::GameStateUpdated(host_view));
        state.sessions.send_to(guest_id, ServerEvent::GameStateUpdated(guest_view));
    }
}
