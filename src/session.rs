use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::Role;

/// Session
///
/// A server-side login record. The cookie only carries a signed reference to `id`;
/// revoking the record here invalidates the cookie even before its token expires.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: Uuid,
    pub ssn: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// SessionStore
///
/// Contract for issuing, resolving and revoking sessions. Kept behind a trait so the
/// in-process store can later be swapped for a shared one without touching handlers.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Issues a fresh session for an authenticated identity.
    async fn create(&self, ssn: &str, role: Role, ttl: Duration) -> Session;

    /// Returns the live session for `id`. Expired sessions are dropped and reported as absent.
    async fn get(&self, id: Uuid) -> Option<Session>;

    /// Removes the session. Returns false if it did not exist.
    async fn revoke(&self, id: Uuid) -> bool;

    /// Drops every expired session, returning how many were removed.
    async fn purge_expired(&self) -> usize;
}

/// SessionState
///
/// The concrete type used to share the session store across the application state.
pub type SessionState = Arc<dyn SessionStore>;

/// MemorySessionStore
///
/// Process-local session store. Sessions do not survive a restart, which only forces
/// users to log in again.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, ssn: &str, role: Role, ttl: Duration) -> Session {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            ssn: ssn.to_string(),
            role,
            created_at: now,
            expires_at: now + ttl,
        };

        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());

        tracing::debug!(session_id = %session.id, %role, "session created");
        session
    }

    async fn get(&self, id: Uuid) -> Option<Session> {
        let now = Utc::now();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(&id) {
                Some(session) if !session.is_expired_at(now) => return Some(session.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: evict under the write lock.
        self.sessions.write().await.remove(&id);
        tracing::debug!(session_id = %id, "session expired");
        None
    }

    async fn revoke(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            tracing::debug!(session_id = %id, "session revoked");
        }
        removed
    }

    async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired_at(now));
        before - sessions.len()
    }
}
