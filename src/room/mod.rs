//! Room registry (C4): process-wide room table, monotonic id allocation,
//! and the create/join/list/cleanup operations that manage a room's
//! lifecycle up to handing a started match off to the match engine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::deck::DeckRepository;
use crate::deck::load_deck;
use crate::error::GameError;
use crate::game::GameState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStatus {
    Waiting,
    InGame,
}

#[derive(Debug, Clone)]
pub struct Participant {
    pub session_id: Uuid,
    pub user_id: String,
    pub username: String,
    pub deck_id: i64,
}

/// A room's matchmaking metadata. The match engine's [`GameState`] is
/// stored alongside it once both players have joined.
pub struct RoomEntry {
    pub id: u64,
    pub created_at: OffsetDateTime,
    inner: Mutex<RoomInner>,
}

struct RoomInner {
    status: RoomStatus,
    host: Participant,
    guest: Option<Participant>,
    game: Option<GameState>,
}

/// Waiting-list projection: never exposes socket ids or deck contents.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicRoomView {
    pub id: u64,
    pub host_username: String,
    pub host_user_id: String,
    pub created_at: String,
}

pub struct JoinedRoom {
    pub host_session_id: Uuid,
    pub guest_session_id: Uuid,
    pub host_user_id: String,
    pub guest_user_id: String,
    pub host_deck_id: i64,
    pub guest_deck_id: i64,
}

impl RoomEntry {
    fn public_view(&self) -> PublicRoomView {
        let inner = self.inner.lock();
        PublicRoomView {
            id: self.id,
            host_username: inner.host.username.clone(),
            host_user_id: inner.host.user_id.clone(),
            created_at: self
                .created_at
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_default(),
        }
    }

    fn is_waiting(&self) -> bool {
        self.inner.lock().status == RoomStatus::Waiting
    }

    fn has_session(&self, session_id: Uuid) -> bool {
        let inner = self.inner.lock();
        inner.host.session_id == session_id
            || inner.guest.as_ref().map(|g| g.session_id) == Some(session_id)
    }
}

/// Process-wide mapping of room-id → room record, with a monotonic id
/// counter that never reuses an id within the process's lifetime.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: DashMap<u64, Arc<RoomEntry>>,
    next_id: AtomicU64,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self { rooms: DashMap::new(), next_id: AtomicU64::new(1) }
    }

    /// `createRoom(session, deckId)`. Loads the host's deck (may suspend;
    /// no lock held across the call) then inserts a `waiting` room.
    pub async fn create_room(
        &self,
        repo: &dyn DeckRepository,
        host_session_id: Uuid,
        host_user_id: &str,
        deck_id: i64,
    ) -> Result<PublicRoomView, GameError> {
        let loaded = load_deck(repo, deck_id, host_user_id).await?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let entry = Arc::new(RoomEntry {
            id,
            created_at: OffsetDateTime::now_utc(),
            inner: Mutex::new(RoomInner {
                status: RoomStatus::Waiting,
                host: Participant {
                    session_id: host_session_id,
                    user_id: host_user_id.to_string(),
                    username: loaded.owner_username,
                    deck_id,
                },
                guest: None,
                game: None,
            }),
        });
        let view = entry.public_view();
        self.rooms.insert(id, entry);
        Ok(view)
    }

    /// `listWaiting()`, ordered by room id ascending.
    pub fn list_waiting(&self) -> Vec<PublicRoomView> {
        let mut rooms: Vec<_> = self
            .rooms
            .iter()
            .filter(|entry| entry.is_waiting())
            .map(|entry| entry.public_view())
            .collect();
        rooms.sort_by_key(|r| r.id);
        rooms
    }

    /// `joinRoom(session, roomId, deckId)`. Re-loads both decks (the
    /// host's again, to recover its cards for match initialization) and
    /// re-checks the room is still joinable after the suspension point.
    pub async fn join_room(
        &self,
        repo: &dyn DeckRepository,
        guest_session_id: Uuid,
        guest_user_id: &str,
        room_id: u64,
        guest_deck_id: i64,
    ) -> Result<(JoinedRoom, Vec<crate::deck::GameCard>, Vec<crate::deck::GameCard>), GameError> {
        let entry = self.rooms.get(&room_id).map(|r| r.clone()).ok_or_else(GameError::room_not_found)?;

        let host_user_id = {
            let inner = entry.inner.lock();
            if inner.status != RoomStatus::Waiting || inner.guest.is_some() {
                return Err(GameError::room_full());
            }
            inner.host.user_id.clone()
        };
        if host_user_id == guest_user_id {
            return Err(GameError::SelfJoin);
        }

        let guest_loaded = load_deck(repo, guest_deck_id, guest_user_id).await?;
        let host_deck_id = {
            let inner = entry.inner.lock();
            inner.host.deck_id
        };
        let host_loaded = load_deck(repo, host_deck_id, &host_user_id).await?;

        let mut inner = entry.inner.lock();
        // The room could have been torn down by a concurrent `removeBySession`
        // (e.g. the host disconnecting) while either `load_deck().await` above
        // was suspended; `entry` is an `Arc` clone so its `Mutex` is still
        // live, but the room is gone from the registry and must not be joined.
        if !self.rooms.contains_key(&room_id) {
            return Err(GameError::room_not_found());
        }
        if inner.status != RoomStatus::Waiting || inner.guest.is_some() {
            return Err(GameError::room_full());
        }
        let host_session_id = inner.host.session_id;
        inner.guest = Some(Participant {
            session_id: guest_session_id,
            user_id: guest_user_id.to_string(),
            username: guest_loaded.owner_username,
            deck_id: guest_deck_id,
        });
        inner.status = RoomStatus::InGame;

        let joined = JoinedRoom {
            host_session_id,
            guest_session_id,
            host_user_id: host_user_id.clone(),
            guest_user_id: guest_user_id.to_string(),
            host_deck_id,
            guest_deck_id,
        };
        Ok((joined, host_loaded.cards, guest_loaded.cards))
    }

    pub fn room(&self, room_id: u64) -> Option<Arc<RoomEntry>> {
        self.rooms.get(&room_id).map(|r| r.clone())
    }

    pub fn set_game(&self, room_id: u64, game: GameState) {
        if let Some(entry) = self.rooms.get(&room_id) {
            entry.inner.lock().game = Some(game);
        }
    }

    pub fn with_game<R>(&self, room_id: u64, f: impl FnOnce(&mut GameState) -> R) -> Option<R> {
        let entry = self.rooms.get(&room_id)?;
        let mut inner = entry.inner.lock();
        inner.game.as_mut().map(f)
    }

    /// Deletes the room entry outright. Used when a match ends naturally
    /// (`gameEnded`); unlike the upstream behavior this spec was distilled
    /// from, the room is not left behind for a later disconnect to sweep
    /// up — see the matching decision in DESIGN.md.
    pub fn remove_room(&self, room_id: u64) {
        self.rooms.remove(&room_id);
    }

    /// `removeBySession(sessionId)`. Deletes every room where the session
    /// is host or guest. Returns `true` if anything changed, so callers
    /// know whether a `roomsListUpdated` broadcast is warranted.
    pub fn remove_by_session(&self, session_id: Uuid) -> bool {
        let to_remove: Vec<u64> = self
            .rooms
            .iter()
            .filter(|entry| entry.has_session(session_id))
            .map(|entry| entry.id)
            .collect();
        for id in &to_remove {
            self.rooms.remove(id);
        }
        !to_remove.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::{CardRecord, DeckRecord, InMemoryDeckRepository};
    use crate::typechart::CardType;

    fn ten_cards() -> Vec<CardRecord> {
        (0..10)
            .map(|i| CardRecord { id: format!("c{i}"), name: format!("c{i}"), hp: 50, attack: 10, kind: CardType::Normal })
            .collect()
    }

    fn repo_with_two_decks() -> InMemoryDeckRepository {
        let repo = InMemoryDeckRepository::new();
        repo.insert(1, DeckRecord { owner_user_id: "host".into(), owner_username: "hostname".into(), cards: ten_cards() });
        repo.insert(2, DeckRecord { owner_user_id: "guest".into(), owner_username: "guestname".into(), cards: ten_cards() });
        repo
    }

    #[tokio::test]
    async fn create_then_list_then_join_promotes_room() {
        let registry = RoomRegistry::new();
        let repo = repo_with_two_decks();
        let host_session = Uuid::new_v4();
        let guest_session = Uuid::new_v4();

        let created = registry.create_room(&repo, host_session, "host", 1).await.unwrap();
        assert_eq!(created.id, 1);
        assert_eq!(registry.list_waiting().len(), 1);

        let (joined, host_cards, guest_cards) =
            registry.join_room(&repo, guest_session, "guest", 1, 2).await.unwrap();
        assert_eq!(joined.host_session_id, host_session);
        assert_eq!(host_cards.len(), 10);
        assert_eq!(guest_cards.len(), 10);
        assert!(registry.list_waiting().is_empty());
        assert!(registry.room(1).is_some());
        assert!(registry.room(404).is_none());
    }

    #[tokio::test]
    async fn remove_room_deletes_entry_outright() {
        let registry = RoomRegistry::new();
        let repo = repo_with_two_decks();
        registry.create_room(&repo, Uuid::new_v4(), "host", 1).await.unwrap();
        registry.remove_room(1);
        assert!(registry.room(1).is_none());
    }

    #[tokio::test]
    async fn self_join_is_rejected() {
        let registry = RoomRegistry::new();
        let repo = repo_with_two_decks();
        let host_session = Uuid::new_v4();
        registry.create_room(&repo, host_session, "host", 1).await.unwrap();

        let err = registry.join_room(&repo, Uuid::new_v4(), "host", 1, 1).await.unwrap_err();
        assert_eq!(err.wire_message(), "SELF_JOIN");
    }

    #[tokio::test]
    async fn joining_full_room_is_rejected() {
        let registry = RoomRegistry::new();
        let repo = repo_with_two_decks();
        registry.create_room(&repo, Uuid::new_v4(), "host", 1).await.unwrap();
        registry.join_room(&repo, Uuid::new_v4(), "guest", 1, 2).await.unwrap();

        let err = registry.join_room(&repo, Uuid::new_v4(), "third", 1, 2).await.unwrap_err();
        assert_eq!(err.wire_message(), "ROOM_FULL");
    }

    /// A deck repository whose very first lookup suspends until released,
    /// so a test can force the registry to mutate while `join_room` is
    /// parked at its suspension point. Later lookups resolve immediately.
    struct SlowRepo {
        inner: InMemoryDeckRepository,
        first_call_pending: std::sync::atomic::AtomicBool,
        resume: tokio::sync::Notify,
    }

    #[async_trait::async_trait]
    impl DeckRepository for SlowRepo {
        async fn find_deck(&self, deck_id: i64) -> Option<DeckRecord> {
            if !self.first_call_pending.swap(true, std::sync::atomic::Ordering::SeqCst) {
                self.resume.notified().await;
            }
            self.inner.find_deck(deck_id).await
        }
    }

    #[tokio::test]
    async fn join_room_rejects_room_removed_during_suspension() {
        let registry = Arc::new(RoomRegistry::new());
        let repo = Arc::new(SlowRepo {
            inner: repo_with_two_decks(),
            first_call_pending: std::sync::atomic::AtomicBool::new(false),
            resume: tokio::sync::Notify::new(),
        });
        let host_session = Uuid::new_v4();
        registry.create_room(&*repo, host_session, "host", 1).await.unwrap();

        let registry_for_join = registry.clone();
        let repo_for_join = repo.clone();
        let join_task = tokio::spawn(async move {
            registry_for_join.join_room(&*repo_for_join, Uuid::new_v4(), "guest", 1, 2).await
        });

        // Let `join_room` run until it parks on the guest deck's lookup,
        // then simulate the host disconnecting mid-await and release it.
        tokio::task::yield_now().await;
        registry.remove_by_session(host_session);
        repo.resume.notify_one();

        let err = join_task.await.unwrap().unwrap_err();
        assert_eq!(err.wire_message(), "NOT_FOUND");
    }

    #[test]
    fn remove_by_session_deletes_owned_rooms() {
        let registry = RoomRegistry::new();
        let repo = repo_with_two_decks();
        let host_session = Uuid::new_v4();
        futures::executor::block_on(registry.create_room(&repo, host_session, "host", 1)).unwrap();

        assert!(registry.remove_by_session(host_session));
        assert!(registry.list_waiting().is_empty());
        assert!(!registry.remove_by_session(host_session));
    }
}
