//! Per-user conversation state shared between handlers.
//!
//! Entries expire after a fixed idle time so an abandoned prompt doesn't
//! swallow the user's next message forever.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use teloxide::types::UserId;
use tokio::sync::Mutex;

use crate::metadata::Status;

/// Input the bot is waiting for from a user's next text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingInput {
    SearchQuery,
    CategoryName { parent_id: Option<i64> },
    BroadcastMessage,
    DeleteVideoIds,
    MoveVideoId,
}

/// The last search a user ran, kept so filter buttons can refine it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LastSearch {
    pub query: String,
    pub quality: Option<String>,
    pub status: Option<Status>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub pending: Option<PendingInput>,
    pub last_search: Option<LastSearch>,
}

#[derive(Debug)]
struct Entry {
    session: Session,
    touched: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<UserId, Entry>>>,
    ttl: chrono::Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(365)),
        }
    }

    pub async fn get(&self, user: UserId) -> Session {
        self.get_at(user, Utc::now()).await
    }

    pub async fn set_pending(&self, user: UserId, pending: PendingInput) {
        self.update_at(user, Utc::now(), |s| s.pending = Some(pending))
            .await
    }

    /// Removes and returns what the user was prompted for, if still fresh.
    pub async fn take_pending(&self, user: UserId) -> Option<PendingInput> {
        self.take_pending_at(user, Utc::now()).await
    }

    pub async fn set_last_search(&self, user: UserId, search: LastSearch) {
        self.update_at(user, Utc::now(), |s| s.last_search = Some(search))
            .await
    }

    pub async fn last_search(&self, user: UserId) -> Option<LastSearch> {
        self.get(user).await.last_search
    }

    pub async fn clear(&self, user: UserId) {
        self.inner.lock().await.remove(&user);
    }

    /// Drops expired sessions and returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now()).await
    }

    fn is_live(&self, entry: &Entry, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(entry.touched) < self.ttl
    }

    async fn get_at(&self, user: UserId, now: DateTime<Utc>) -> Session {
        let sessions = self.inner.lock().await;
        sessions
            .get(&user)
            .filter(|entry| self.is_live(entry, now))
            .map(|entry| entry.session.clone())
            .unwrap_or_default()
    }

    async fn update_at(&self, user: UserId, now: DateTime<Utc>, f: impl FnOnce(&mut Session)) {
        let mut sessions = self.inner.lock().await;
        let entry = sessions.entry(user).or_insert_with(|| Entry {
            session: Session::default(),
            touched: now,
        });
        if !self.is_live(entry, now) {
            entry.session = Session::default();
        }
        f(&mut entry.session);
        entry.touched = now;
    }

    async fn take_pending_at(&self, user: UserId, now: DateTime<Utc>) -> Option<PendingInput> {
        let mut sessions = self.inner.lock().await;
        let entry = sessions.get_mut(&user)?;
        if !self.is_live(entry, now) {
            sessions.remove(&user);
            return None;
        }
        entry.touched = now;
        entry.session.pending.take()
    }

    async fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.inner.lock().await;
        let before = sessions.len();
        sessions.retain(|_, entry| now.signed_duration_since(entry.touched) < self.ttl);
        before - sessions.len()
    }
}

/// Periodically evicts idle sessions until the runtime shuts down.
pub fn spawn_purge_task(store: SessionStore, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let purged = store.purge_expired().await;
            if purged > 0 {
                log::debug!("Purged {purged} idle sessions");
            }
        }
    })
}
