//! Session table: the process-wide mapping from a stable opaque session
//! handle to the channel that can push events at it. The handle is
//! assigned once at handshake (see [`crate::ws`]) and carried by the
//! transport for the life of the connection; it never survives a close.

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::protocol::ServerEvent;

#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    pub id: Uuid,
    pub user_id: String,
    pub email: String,
}

/// Process-wide table of live sessions, keyed by the handle minted at
/// handshake. Only the dispatcher mutates it, on connect/disconnect.
#[derive(Default)]
pub struct SessionTable {
    senders: DashMap<Uuid, mpsc::UnboundedSender<ServerEvent>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session_id: Uuid, tx: mpsc::UnboundedSender<ServerEvent>) {
        self.senders.insert(session_id, tx);
    }

    pub fn remove(&self, session_id: Uuid) {
        self.senders.remove(&session_id);
    }

    /// Sends to one session. Silently drops the event if the session has
    /// already disconnected — emission failures never roll back a
    /// mutation that already committed.
    pub fn send_to(&self, session_id: Uuid, event: ServerEvent) {
        if let Some(tx) = self.senders.get(&session_id) {
            if tx.send(event).is_err() {
                debug!(%session_id, "dropped event: receiver gone");
            }
        }
    }

    /// Broadcasts to every currently-authenticated session.
    pub fn broadcast(&self, event: ServerEvent) {
        for entry in self.senders.iter() {
            let _ = entry.value().send(event.clone());
        }
    }
}
