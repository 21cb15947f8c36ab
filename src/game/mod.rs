//! Match engine (C5): per-room game state, turn machine, action
//! validators, and asymmetric view projection.

use rand::seq::SliceRandom;
use serde::Serialize;
use uuid::Uuid;

use crate::deck::GameCard;
use crate::error::GameError;
use crate::typechart::damage;

const MAX_HAND_SIZE: usize = 5;
const WINNING_SCORE: u8 = 3;

/// Which side of the match a session is playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Guest,
}

/// State for one in-progress match. Owned by the room it belongs to.
#[derive(Debug, Clone)]
pub struct GameState {
    pub host_session_id: Uuid,
    pub guest_session_id: Uuid,
    host_deck: Vec<GameCard>,
    guest_deck: Vec<GameCard>,
    host_hand: Vec<GameCard>,
    guest_hand: Vec<GameCard>,
    host_active: Option<GameCard>,
    guest_active: Option<GameCard>,
    host_score: u8,
    guest_score: u8,
    current_player_session_id: Uuid,
}

/// Outcome of an `attack`/knockout that terminates the match.
pub struct MatchEnded {
    pub winner_session_id: Uuid,
    pub host_score: u8,
    pub guest_score: u8,
}

impl GameState {
    /// Initializes a fresh match: shuffles both decks, empties hands and
    /// actives, zeroes scores, and gives the host the first turn.
    pub fn initialize(
        host_session_id: Uuid,
        guest_session_id: Uuid,
        mut host_deck: Vec<GameCard>,
        mut guest_deck: Vec<GameCard>,
    ) -> Self {
        let mut rng = rand::thread_rng();
        host_deck.shuffle(&mut rng);
        guest_deck.shuffle(&mut rng);
        GameState {
            host_session_id,
            guest_session_id,
            host_deck,
            guest_deck,
            host_hand: Vec::new(),
            guest_hand: Vec::new(),
            host_active: None,
            guest_active: None,
            host_score: 0,
            guest_score: 0,
            current_player_session_id: host_session_id,
        }
    }

    fn role_of(&self, session_id: Uuid) -> Option<Role> {
        if session_id == self.host_session_id {
            Some(Role::Host)
        } else if session_id == self.guest_session_id {
            Some(Role::Guest)
        } else {
            None
        }
    }

    fn deck_mut(&mut self, role: Role) -> &mut Vec<GameCard> {
        match role {
            Role::Host => &mut self.host_deck,
            Role::Guest => &mut self.guest_deck,
        }
    }

    fn hand_mut(&mut self, role: Role) -> &mut Vec<GameCard> {
        match role {
            Role::Host => &mut self.host_hand,
            Role::Guest => &mut self.guest_hand,
        }
    }

    fn active_mut(&mut self, role: Role) -> &mut Option<GameCard> {
        match role {
            Role::Host => &mut self.host_active,
            Role::Guest => &mut self.guest_active,
        }
    }

    fn opponent(role: Role) -> Role {
        match role {
            Role::Host => Role::Guest,
            Role::Guest => Role::Host,
        }
    }

    fn session_id_of(&self, role: Role) -> Uuid {
        match role {
            Role::Host => self.host_session_id,
            Role::Guest => self.guest_session_id,
        }
    }

    fn score_mut(&mut self, role: Role) -> &mut u8 {
        match role {
            Role::Host => &mut self.host_score,
            Role::Guest => &mut self.guest_score,
        }
    }

    fn require_current_player(&self, session_id: Uuid) -> Result<Role, GameError> {
        if session_id != self.current_player_session_id {
            return Err(GameError::not_your_turn());
        }
        self.role_of(session_id).ok_or_else(GameError::not_your_turn)
    }

    /// `drawCards`: tops the actor's hand up to 5 from the tail of their
    /// deck. Idempotent once the hand is full or the deck is empty.
    /// Does not advance the turn.
    pub fn draw_cards(&mut self, session_id: Uuid) -> Result<(), GameError> {
        let role = self.require_current_player(session_id)?;
        loop {
            let hand_len = self.hand_mut(role).len();
            if hand_len >= MAX_HAND_SIZE {
                break;
            }
            let Some(card) = self.deck_mut(role).pop() else { break };
            self.hand_mut(role).push(card);
        }
        Ok(())
    }

    /// `playCard(cardIndex)`: moves a hand card to the board. Does not
    /// advance the turn.
    pub fn play_card(&mut self, session_id: Uuid, card_index: usize) -> Result<(), GameError> {
        let role = self.require_current_player(session_id)?;
        if self.active_mut(role).is_some() {
            return Err(GameError::already_active());
        }
        let hand = self.hand_mut(role);
        if card_index >= hand.len() {
            return Err(GameError::invalid_index());
        }
        let card = hand.remove(card_index);
        *self.active_mut(role) = Some(card);
        Ok(())
    }

    /// `attack`: computes type-effective damage against the opponent's
    /// active, applies a knockout and score if it falls to 0 hp, then
    /// hands the turn to the opponent regardless of outcome. Returns
    /// `Some(MatchEnded)` if either score just reached the winning total.
    pub fn attack(&mut self, session_id: Uuid) -> Result<Option<MatchEnded>, GameError> {
        let role = self.require_current_player(session_id)?;
        let opponent_role = Self::opponent(role);

        let attacker = self.active_mut(role).clone().ok_or_else(GameError::bad_request)?;
        let mut defender = self
            .active_mut(opponent_role)
            .clone()
            .ok_or_else(GameError::bad_request)?;

        let dealt = damage(attacker.attack, attacker.kind, defender.kind);
        defender.hp -= dealt;

        if defender.hp <= 0 {
            *self.active_mut(opponent_role) = None;
            *self.score_mut(role) += 1;
        } else {
            *self.active_mut(opponent_role) = Some(defender);
        }

        self.current_player_session_id = self.session_id_of(opponent_role);

        if self.host_score >= WINNING_SCORE || self.guest_score >= WINNING_SCORE {
            let winner_role = if self.host_score >= WINNING_SCORE { Role::Host } else { Role::Guest };
            return Ok(Some(MatchEnded {
                winner_session_id: self.session_id_of(winner_role),
                host_score: self.host_score,
                guest_score: self.guest_score,
            }));
        }

        Ok(None)
    }

    /// `endTurn`: flips the current player without any other state change.
    pub fn end_turn(&mut self, session_id: Uuid) -> Result<(), GameError> {
        let role = self.require_current_player(session_id)?;
        self.current_player_session_id = self.session_id_of(Self::opponent(role));
        Ok(())
    }

    pub fn current_player_session_id(&self) -> Uuid {
        self.current_player_session_id
    }

    /// Asymmetric projection for `session_id`: own hand in full, opponent's
    /// hand never appears.
    pub fn view_for(&self, session_id: Uuid) -> Option<GameStateView> {
        let role = self.role_of(session_id)?;
        let opponent_role = Self::opponent(role);
        Some(GameStateView {
            hand: match role {
                Role::Host => self.host_hand.clone(),
                Role::Guest => self.guest_hand.clone(),
            },
            active: match role {
                Role::Host => self.host_active.clone(),
                Role::Guest => self.guest_active.clone(),
            },
            deck_count: match role {
                Role::Host => self.host_deck.len(),
                Role::Guest => self.guest_deck.len(),
            },
            score: match role {
                Role::Host => self.host_score,
                Role::Guest => self.guest_score,
            },
            opponent_active: match opponent_role {
                Role::Host => self.host_active.clone(),
                Role::Guest => self.guest_active.clone(),
            },
            opponent_deck_count: match opponent_role {
                Role::Host => self.host_deck.len(),
                Role::Guest => self.guest_deck.len(),
            },
            opponent_score: match opponent_role {
                Role::Host => self.host_score,
                Role::Guest => self.guest_score,
            },
            current_player_session_id: self.current_player_session_id,
        })
    }

    #[cfg(test)]
    pub fn set_active_for_test(&mut self, role: Role, card: GameCard) {
        *self.active_mut(role) = Some(card);
    }
}

/// Per-recipient projection of a [`GameState`]. The opponent's hand and
/// deck contents never appear here.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateView {
    pub hand: Vec<GameCard>,
    pub active: Option<GameCard>,
    pub deck_count: usize,
    pub score: u8,
    pub opponent_active: Option<GameCard>,
    pub opponent_deck_count: usize,
    pub opponent_score: u8,
    pub current_player_session_id: Uuid,
}
