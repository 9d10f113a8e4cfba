use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use super::{DEFAULT_TTL, SessionPatch, SessionStore};
use crate::conversation::ChatMessage;
use crate::model::{ExpandedDay, Session};

#[derive(Debug)]
struct Entry {
    session: Session,
    /// Monotonic mirror of `session.last_accessed`, used for expiry.
    touched: Instant,
}

impl Entry {
    fn expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.touched) > ttl
    }

    fn touch(&mut self, now: Instant) {
        self.touched = now;
        self.session.last_accessed = Utc::now();
    }
}

/// Process-local session store.
///
/// A `tokio::sync::RwLock<HashMap>` keyed by session id. Lazy expiry (on
/// access) and eager expiry ([`SessionStore::purge_expired`]) share one
/// predicate, so both always agree on whether a session is alive.
#[derive(Debug, Clone)]
pub struct MemorySessionStore {
    inner: Arc<RwLock<HashMap<String, Entry>>>,
    ttl: Duration,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Number of physically stored sessions, expired ones included.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Run `f` against a live entry, refreshing it; expired entries are
    /// dropped on the way.
    async fn with_live<R>(&self, id: &str, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let now = Instant::now();
        let mut guard = self.inner.write().await;
        if guard.get(id)?.expired(now, self.ttl) {
            guard.remove(id);
            debug!(session_id = %id, "session expired on access");
            return None;
        }
        let entry = guard.get_mut(id)?;
        entry.touch(now);
        Some(f(&mut entry.session))
    }
}

impl SessionStore for MemorySessionStore {
    async fn create(&self) -> Session {
        let session_id = uuid::Uuid::new_v4().to_string();
        let session = Session::new(session_id.clone(), Utc::now());
        let entry = Entry {
            session: session.clone(),
            touched: Instant::now(),
        };
        self.inner.write().await.insert(session_id, entry);
        session
    }

    async fn get(&self, id: &str) -> Option<Session> {
        self.with_live(id, |s| s.clone()).await
    }

    async fn update(&self, id: &str, patch: SessionPatch) -> Option<Session> {
        self.with_live(id, |s| {
            patch.apply(s);
            s.clone()
        })
        .await
    }

    async fn add_to_conversation(&self, id: &str, message: ChatMessage) -> bool {
        self.with_live(id, |s| s.conversation_history.push(message))
            .await
            .is_some()
    }

    async fn set_expanded_day(&self, id: &str, day: ExpandedDay) -> Option<Session> {
        self.update(id, SessionPatch::new().expanded_day(day)).await
    }

    async fn delete(&self, id: &str) -> bool {
        self.inner.write().await.remove(id).is_some()
    }

    async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut guard = self.inner.write().await;
        let before = guard.len();
        guard.retain(|_, entry| !entry.expired(now, self.ttl));
        before - guard.len()
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}
