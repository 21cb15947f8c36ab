//! Deck loader (C2): an adapter in front of the out-of-scope relational
//! deck store. The core never touches SQL; it only depends on the
//! [`DeckRepository`] trait, so the real service can plug in its own
//! Postgres-backed implementation while tests use [`InMemoryDeckRepository`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GameError;
use crate::typechart::CardType;

/// A card as the catalog stores it, before it enters a match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardRecord {
    pub id: String,
    pub name: String,
    pub hp: i64,
    pub attack: i64,
    #[serde(rename = "type")]
    pub kind: CardType,
}

/// What the deck repository returns for a single deck lookup.
#[derive(Debug, Clone)]
pub struct DeckRecord {
    pub owner_user_id: String,
    pub owner_username: String,
    pub cards: Vec<CardRecord>,
}

/// The interface the core needs from the external deck-CRUD service.
#[async_trait]
pub trait DeckRepository: Send + Sync {
    async fn find_deck(&self, deck_id: i64) -> Option<DeckRecord>;
}

/// A card snapshot taken into a live match. `hp` is mutable damage-tracking
/// state; `attack`/`kind` never change for the match's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameCard {
    pub id: String,
    pub name: String,
    pub hp: i64,
    pub attack: i64,
    #[serde(rename = "type")]
    pub kind: CardType,
}

impl From<&CardRecord> for GameCard {
    fn from(c: &CardRecord) -> Self {
        GameCard {
            id: c.id.clone(),
            name: c.name.clone(),
            hp: c.hp,
            attack: c.attack,
            kind: c.kind,
        }
    }
}

/// Result of a successful deck load: the owner's display name plus the
/// deck's cards, in the order the repository yielded them.
pub struct LoadedDeck {
    pub owner_username: String,
    pub cards: Vec<GameCard>,
}

/// `loadDeck(deckId, forUserId)`.
///
/// Fails `NOT_FOUND` if the deck doesn't exist, `FORBIDDEN` if it belongs
/// to someone else, `INVALID_DECK` if it doesn't have exactly 10 cards.
pub async fn load_deck(
    repo: &dyn DeckRepository,
    deck_id: i64,
    for_user_id: &str,
) -> Result<LoadedDeck, GameError> {
    let record = repo.find_deck(deck_id).await.ok_or_else(GameError::deck_not_found)?;
    if record.owner_user_id != for_user_id {
        return Err(GameError::deck_forbidden());
    }
    if record.cards.len() != 10 {
        return Err(GameError::InvalidDeck);
    }
    Ok(LoadedDeck {
        owner_username: record.owner_username,
        cards: record.cards.iter().map(GameCard::from).collect(),
    })
}

/// Stand-in for the relational deck store, used by tests and by the
/// binary when no external store is wired in.
#[derive(Default)]
pub struct InMemoryDeckRepository {
    decks: dashmap::DashMap<i64, DeckRecord>,
}

impl InMemoryDeckRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, deck_id: i64, record: DeckRecord) {
        self.decks.insert(deck_id, record);
    }
}

#[async_trait]
impl DeckRepository for InMemoryDeckRepository {
    async fn find_deck(&self, deck_id: i64) -> Option<DeckRecord> {
        self.decks.get(&deck_id).map(|r| r.clone())
    }
}
