//! Session registry: live connections, fan-out groups, delivery sinks.
//!
//! The registry is the only owner of session state. It is defined as a trait
//! so a single-instance deployment can use the in-memory implementation and
//! a multi-instance deployment can plug in a shared store behind the same
//! contract.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::debug;

use crate::models::OnlineUser;
use crate::protocol::ServerEvent;

pub type SessionId = String;

/// Per-session delivery channel. A closed sink means the session vanished;
/// delivery to it is a no-op, not an error.
pub type EventSink = mpsc::UnboundedSender<ServerEvent>;

/// Identity bound to one live transport connection.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: SessionId,
    pub participant_id: String,
    pub display_name: String,
    pub role: String,
}

/// Result of removing a session binding, explicit or by overwrite.
#[derive(Debug, Clone)]
pub struct RemovedBinding {
    pub session: Session,
    /// True when the bound participant has no other live session left, i.e.
    /// this removal is an online -> offline transition.
    pub participant_offline: bool,
}

#[async_trait]
pub trait SessionRegistry: Send + Sync {
    /// Idempotently (re-)bind a session id. Overwrites any prior binding for
    /// that id and returns it, so the caller can emit an offline transition
    /// for a displaced participant.
    async fn register(&self, session: Session, sink: EventSink) -> Option<RemovedBinding>;

    /// Remove the binding if present. `None` when the session was never
    /// registered (a no-op, not an error).
    async fn unregister(&self, session_id: &str) -> Option<RemovedBinding>;

    async fn session(&self, session_id: &str) -> Option<Session>;

    async fn is_registered(&self, session_id: &str) -> bool;

    async fn sessions_for(&self, participant_id: &str) -> Vec<SessionId>;

    /// Join a session to a conversation's fan-out group.
    async fn join_room(&self, room_id: &str, session_id: &str);

    async fn in_room(&self, room_id: &str, session_id: &str) -> bool;

    async fn room_members(&self, room_id: &str) -> Vec<SessionId>;

    /// Deliver one event to one session. Returns false when the session is
    /// gone; callers treat that as a successful no-op.
    async fn send_to(&self, session_id: &str, event: ServerEvent) -> bool;

    async fn broadcast_all(&self, event: ServerEvent);

    /// Currently registered participants, de-duplicated: a participant with
    /// several live sessions appears once.
    async fn online_users(&self) -> Vec<OnlineUser>;
}

struct SessionEntry {
    session: Session,
    sink: EventSink,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<SessionId, SessionEntry>,
    rooms: HashMap<String, HashSet<SessionId>>,
}

impl Inner {
    fn participant_session_count(&self, participant_id: &str) -> usize {
        self.sessions
            .values()
            .filter(|e| e.session.participant_id == participant_id)
            .count()
    }

    fn remove(&mut self, session_id: &str) -> Option<RemovedBinding> {
        let entry = self.sessions.remove(session_id)?;
        for members in self.rooms.values_mut() {
            members.remove(session_id);
        }
        let participant_offline =
            self.participant_session_count(&entry.session.participant_id) == 0;
        Some(RemovedBinding {
            session: entry.session,
            participant_offline,
        })
    }
}

/// Process-local registry for a single server instance.
///
/// All mutations run under a lock that is never held across a suspension
/// point, which makes every operation atomic with respect to concurrent
/// register/unregister calls.
pub struct InMemoryRegistry {
    inner: RwLock<Inner>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionRegistry for InMemoryRegistry {
    async fn register(&self, session: Session, sink: EventSink) -> Option<RemovedBinding> {
        let mut inner = self.inner.write();
        let session_id = session.session_id.clone();
        let previous = inner.sessions.insert(
            session_id.clone(),
            SessionEntry {
                session: session.clone(),
                sink,
            },
        );
        debug!(
            "registered session {} for participant {}",
            session_id, session.participant_id
        );
        previous.map(|entry| {
            let participant_offline =
                inner.participant_session_count(&entry.session.participant_id) == 0;
            RemovedBinding {
                session: entry.session,
                participant_offline,
            }
        })
    }

    async fn unregister(&self, session_id: &str) -> Option<RemovedBinding> {
        let removed = self.inner.write().remove(session_id);
        if let Some(ref binding) = removed {
            debug!(
                "unregistered session {} for participant {}",
                session_id, binding.session.participant_id
            );
        }
        removed
    }

    async fn session(&self, session_id: &str) -> Option<Session> {
        self.inner
            .read()
            .sessions
            .get(session_id)
            .map(|e| e.session.clone())
    }

    async fn is_registered(&self, session_id: &str) -> bool {
        self.inner.read().sessions.contains_key(session_id)
    }

    async fn sessions_for(&self, participant_id: &str) -> Vec<SessionId> {
        self.inner
            .read()
            .sessions
            .values()
            .filter(|e| e.session.participant_id == participant_id)
            .map(|e| e.session.session_id.clone())
            .collect()
    }

    async fn join_room(&self, room_id: &str, session_id: &str) {
        let mut inner = self.inner.write();
        if !inner.sessions.contains_key(session_id) {
            return;
        }
        inner
            .rooms
            .entry(room_id.to_string())
            .or_default()
            .insert(session_id.to_string());
    }

    async fn in_room(&self, room_id: &str, session_id: &str) -> bool {
        self.inner
            .read()
            .rooms
            .get(room_id)
            .is_some_and(|members| members.contains(session_id))
    }

    async fn room_members(&self, room_id: &str) -> Vec<SessionId> {
        self.inner
            .read()
            .rooms
            .get(room_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    async fn send_to(&self, session_id: &str, event: ServerEvent) -> bool {
        let sink = {
            let inner = self.inner.read();
            match inner.sessions.get(session_id) {
                Some(entry) => entry.sink.clone(),
                None => return false,
            }
        };
        sink.send(event).is_ok()
    }

    async fn broadcast_all(&self, event: ServerEvent) {
        let sinks: Vec<EventSink> = {
            let inner = self.inner.read();
            inner.sessions.values().map(|e| e.sink.clone()).collect()
        };
        for sink in sinks {
            let _ = sink.send(event.clone());
        }
    }

    async fn online_users(&self) -> Vec<OnlineUser> {
        let inner = self.inner.read();
        let mut by_participant = BTreeMap::new();
        for entry in inner.sessions.values() {
            by_participant
                .entry(entry.session.participant_id.clone())
                .or_insert_with(|| OnlineUser {
                    user_id: entry.session.participant_id.clone(),
                    user_name: entry.session.display_name.clone(),
                    role: entry.session.role.clone(),
                });
        }
        by_participant.into_values().collect()
    }
}
