//! Wire protocol: inbound commands and outbound events the dispatcher
//! (C6) matches over. Every message on the channel is one JSON object
//! `{"event": <name>, "payload": <value>}` — the raw-websocket analogue
//! of a socket.io `(eventName, payload)` emission, modeled here as a
//! closed enum rather than string-keyed dynamic dispatch.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::game::{GameStateView, Role};
use crate::room::PublicRoomView;

#[derive(Debug, Deserialize)]
struct InboundFrame {
    event: String,
    #[serde(default)]
    payload: Value,
}

/// Inbound events accepted from an authenticated session.
///
/// `roomId`/`deckId`/`cardIndex` are `serde_json::Value` rather than
/// `i64` because the dispatcher must tolerate JSON clients that send ids
/// as numeric strings; [`coerce_int`] normalizes them before a handler
/// ever sees one.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    GetRooms,
    CreateRoom { deck_id: Value },
    JoinRoom { room_id: Value, deck_id: Value },
    DrawCards { room_id: Value },
    PlayCard { room_id: Value, card_index: Value },
    Attack { room_id: Value },
    EndTurn { room_id: Value },
}

impl ClientEvent {
    /// The event name this variant was parsed from, used to address an
    /// `error` reply back to the originating request.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::GetRooms => "getRooms",
            ClientEvent::CreateRoom { .. } => "createRoom",
            ClientEvent::JoinRoom { .. } => "joinRoom",
            ClientEvent::DrawCards { .. } => "drawCards",
            ClientEvent::PlayCard { .. } => "playCard",
            ClientEvent::Attack { .. } => "attack",
            ClientEvent::EndTurn { .. } => "endTurn",
        }
    }

    /// Parses one raw text frame. `Err(event_name)` is only returned when
    /// the envelope itself can be read but the event name is unrecognized;
    /// a frame that isn't even a valid envelope returns `None`.
    pub fn parse(raw: &str) -> Option<Result<ClientEvent, String>> {
        let frame: InboundFrame = serde_json::from_str(raw).ok()?;
        let field = |key: &str| frame.payload.get(key).cloned().unwrap_or(Value::Null);
        let event = match frame.event.as_str() {
            "getRooms" => ClientEvent::GetRooms,
            "createRoom" => ClientEvent::CreateRoom { deck_id: field("deckId") },
            "joinRoom" => ClientEvent::JoinRoom { room_id: field("roomId"), deck_id: field("deckId") },
            "drawCards" => ClientEvent::DrawCards { room_id: field("roomId") },
            "playCard" => ClientEvent::PlayCard { room_id: field("roomId"), card_index: field("cardIndex") },
            "attack" => ClientEvent::Attack { room_id: field("roomId") },
            "endTurn" => ClientEvent::EndTurn { room_id: field("roomId") },
            other => return Some(Err(other.to_string())),
        };
        Some(Ok(event))
    }
}

/// Normalizes an id/index field that may arrive as a JSON number or a
/// numeric string. Anything else (missing, float, non-numeric string)
/// is `BAD_REQUEST`.
pub fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse::<i64>().ok(),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleInfo {
    pub role: Role,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "deckId")]
    pub deck_id: i64,
}

/// Outbound events. Direct to one session unless noted otherwise by the
/// caller at the send site (`roomsListUpdated` is always a broadcast).
#[derive(Debug, Clone)]
pub enum ServerEvent {
    RoomsList(Vec<PublicRoomView>),
    RoomCreated(PublicRoomView),
    RoomsListUpdated(Vec<PublicRoomView>),
    GameStarted { room_id: u64, you: RoleInfo, opponent: RoleInfo },
    GameStateUpdated(GameStateView),
    GameEnded { room_id: u64, winner_session_id: Uuid, host_score: u8, guest_score: u8 },
    Error { event: String, message: String },
}

impl ServerEvent {
    /// Renders the `{"event": ..., "payload": ...}` wire frame.
    pub fn to_frame_json(&self) -> Value {
        match self {
            ServerEvent::RoomsList(rooms) => json!({ "event": "roomsList", "payload": rooms }),
            ServerEvent::RoomCreated(room) => json!({ "event": "roomCreated", "payload": room }),
            ServerEvent::RoomsListUpdated(rooms) => json!({ "event": "roomsListUpdated", "payload": rooms }),
            ServerEvent::GameStarted { room_id, you, opponent } => json!({
                "event": "gameStarted",
                "payload": { "roomId": room_id, "you": you, "opponent": opponent },
            }),
            ServerEvent::GameStateUpdated(view) => json!({ "event": "gameStateUpdated", "payload": view }),
            ServerEvent::GameEnded { room_id, winner_session_id, host_score, guest_score } => json!({
                "event": "gameEnded",
                "payload": {
                    "roomId": room_id,
                    "winnerSessionId": winner_session_id,
                    "hostScore": host_score,
                    "guestScore": guest_score,
                },
            }),
            ServerEvent::Error { event, message } => json!({
                "event": "error",
                "payload": { "event": event, "message": message },
            }),
        }
    }

    pub fn to_text(&self) -> String {
        self.to_frame_json().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create_room_with_string_deck_id() {
        let raw = r#"{"event":"createRoom","payload":{"deckId":"7"}}"#;
        let parsed = ClientEvent::parse(raw).unwrap().unwrap();
        match parsed {
            ClientEvent::CreateRoom { deck_id } => assert_eq!(coerce_int(&deck_id), Some(7)),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn unknown_event_name_is_reported() {
        let raw = r#"{"event":"doSomethingElse","payload":{}}"#;
        let parsed = ClientEvent::parse(raw).unwrap();
        assert_eq!(parsed.unwrap_err(), "doSomethingElse");
    }

    #[test]
    fn garbage_frame_is_none() {
        assert!(ClientEvent::parse("not json").is_none());
    }

    #[test]
    fn coerce_int_rejects_non_numeric() {
        assert_eq!(coerce_int(&Value::String("abc".into())), None);
        assert_eq!(coerce_int(&Value::Null), None);
        assert_eq!(coerce_int(&Value::from(1.5)), None);
    }

    #[test]
    fn error_event_wire_shape_matches_spec() {
        let ev = ServerEvent::Error { event: "drawCards".into(), message: "NOT_YOUR_TURN".into() };
        let v = ev.to_frame_json();
        assert_eq!(v["event"], "error");
        assert_eq!(v["payload"]["event"], "drawCards");
        assert_eq!(v["payload"]["message"], "NOT_YOUR_TURN");
    }

    #[test]
    fn rooms_list_payload_is_a_bare_array() {
        let ev = ServerEvent::RoomsList(vec![]);
        let v = ev.to_frame_json();
        assert!(v["payload"].is_array());
    }
}
