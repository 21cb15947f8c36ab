//! Shared error taxonomy for the duel service.
//!
//! Every fallible operation in the core — authentication, deck loading,
//! room lifecycle, match actions — resolves to a [`GameError`]. Handlers
//! never let one of these escape as a torn-down channel; they are always
//! turned into an `error` event addressed back to the offending session.

#[derive(Debug, Clone, thiserror::Error)]
pub enum GameError {
    #[error("missing auth token")]
    AuthMissing,
    #[error("invalid or expired auth token")]
    AuthInvalid,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    #[error("deck does not have exactly 10 cards")]
    InvalidDeck,
    #[error("cannot join a room you created")]
    SelfJoin,
    #[error("internal error: {0}")]
    Internal(String),
}

impl GameError {
    /// The message surfaced on the wire inside `error{event, message}`.
    ///
    /// A handful of kinds collapse to the fixed strings the wire protocol
    /// documents (`NOT_YOUR_TURN`, `ROOM_FULL`, ...); the rest carry their
    /// own detail.
    pub fn wire_message(&self) -> String {
        match self {
            GameError::AuthMissing => "AUTH_MISSING".to_string(),
            GameError::AuthInvalid => "AUTH_INVALID".to_string(),
            GameError::BadRequest(msg) => msg.clone(),
            GameError::NotFound(msg) => msg.clone(),
            GameError::Forbidden(msg) => msg.clone(),
            GameError::Conflict(msg) => msg.clone(),
            GameError::InvalidDeck => "INVALID_DECK".to_string(),
            GameError::SelfJoin => "SELF_JOIN".to_string(),
            GameError::Internal(_) => "INTERNAL".to_string(),
        }
    }

    pub fn bad_request() -> Self {
        GameError::BadRequest("BAD_REQUEST".to_string())
    }

    pub fn room_not_found() -> Self {
        GameError::NotFound("NOT_FOUND".to_string())
    }

    pub fn deck_not_found() -> Self {
        GameError::NotFound("NOT_FOUND".to_string())
    }

    pub fn not_your_turn() -> Self {
        GameError::Forbidden("NOT_YOUR_TURN".to_string())
    }

    pub fn deck_forbidden() -> Self {
        GameError::Forbidden("FORBIDDEN".to_string())
    }

    pub fn room_full() -> Self {
        GameError::Conflict("ROOM_FULL".to_string())
    }

    pub fn already_active() -> Self {
        GameError::Conflict("ALREADY_ACTIVE".to_string())
    }

    pub fn invalid_index() -> Self {
        GameError::BadRequest("INVALID_INDEX".to_string())
    }
}
