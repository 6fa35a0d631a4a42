//! WebSocket session tracking and delivery plumbing.
//!
//! The registry maps user ids to the live sessions of that user in this
//! process only. Cross-process delivery works because every process
//! subscribes to the same broker channel and filters against its own
//! registry; an event with no local match is simply dropped here.

pub mod messages;
pub mod session;

pub use messages::{ClientMessage, ServerFrame};
pub use session::WsSession;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::metrics;

/// Unique identifier for one WebSocket session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Sending half of a session's frame queue.
pub type FrameSender = UnboundedSender<String>;

#[derive(Default)]
struct RegistryInner {
    /// user id -> frame senders of that user's live sessions
    users: HashMap<String, HashMap<SessionId, FrameSender>>,
    /// reverse index so unregister only needs the session id
    sessions: HashMap<SessionId, String>,
}

/// Per-process registry of live WebSocket sessions.
///
/// Both maps live under one lock so a reader can never observe a session
/// present in one and missing from the other.
#[derive(Default, Clone)]
pub struct SessionRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a session to a user and store its frame sender.
    ///
    /// Returns `true` if the session was new. Registering an already known
    /// session id changes nothing and returns `false`.
    pub async fn register(&self, user_id: &str, session_id: SessionId, sender: FrameSender) -> bool {
        let mut guard = self.inner.write().await;

        if let Some(existing) = guard.sessions.get(&session_id) {
            debug!(
                "Session {:?} already registered to user {}, ignoring",
                session_id, existing
            );
            return false;
        }

        guard.sessions.insert(session_id, user_id.to_string());
        guard
            .users
            .entry(user_id.to_string())
            .or_default()
            .insert(session_id, sender);

        metrics::set_active_sessions(guard.sessions.len());
        debug!("Registered session {:?} for user {}", session_id, user_id);

        true
    }

    /// Remove a session. Unknown session ids are ignored, so racing
    /// disconnect paths can all call this safely.
    pub async fn unregister(&self, session_id: SessionId) {
        let mut guard = self.inner.write().await;

        let user_id = match guard.sessions.remove(&session_id) {
            Some(user_id) => user_id,
            None => {
                debug!("Session {:?} not registered, nothing to remove", session_id);
                return;
            }
        };

        if let Some(sessions) = guard.users.get_mut(&user_id) {
            sessions.remove(&session_id);
            if sessions.is_empty() {
                guard.users.remove(&user_id);
            }
        }

        metrics::set_active_sessions(guard.sessions.len());
        debug!("Unregistered session {:?} for user {}", session_id, user_id);
    }

    /// Snapshot of the live sessions for one user.
    ///
    /// Senders are cloned out so delivery happens without holding the lock.
    pub async fn sessions_for(&self, user_id: &str) -> Vec<(SessionId, FrameSender)> {
        let guard = self.inner.read().await;
        guard
            .users
            .get(user_id)
            .map(|sessions| {
                sessions
                    .iter()
                    .map(|(id, sender)| (*id, sender.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of live sessions for one user.
    pub async fn session_count(&self, user_id: &str) -> usize {
        let guard = self.inner.read().await;
        guard.users.get(user_id).map(|s| s.len()).unwrap_or(0)
    }

    /// Number of live sessions across all users.
    pub async fn total_sessions(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    /// Number of distinct users with at least one live session.
    pub async fn connected_users(&self) -> usize {
        self.inner.read().await.users.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn sender() -> (FrameSender, tokio::sync::mpsc::UnboundedReceiver<String>) {
        mpsc::unbounded_channel()
    }

    #[tokio::test]
    async fn test_registry_starts_empty() {
        let registry = SessionRegistry::new();
        assert_eq!(registry.total_sessions().await, 0);
        assert_eq!(registry.connected_users().await, 0);
        assert_eq!(registry.session_count("u-1").await, 0);
    }

    #[tokio::test]
    async fn test_register_session() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = sender();

        assert!(registry.register("u-1", SessionId::new(), tx).await);
        assert_eq!(registry.session_count("u-1").await, 1);
        assert_eq!(registry.total_sessions().await, 1);
        assert_eq!(registry.connected_users().await, 1);
    }

    #[tokio::test]
    async fn test_multiple_sessions_same_user() {
        let registry = SessionRegistry::new();
        let (tx1, _rx1) = sender();
        let (tx2, _rx2) = sender();

        registry.register("u-1", SessionId::new(), tx1).await;
        registry.register("u-1", SessionId::new(), tx2).await;

        assert_eq!(registry.session_count("u-1").await, 2);
        assert_eq!(registry.total_sessions().await, 2);
        assert_eq!(registry.connected_users().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_register_is_ignored() {
        let registry = SessionRegistry::new();
        let session_id = SessionId::new();
        let (tx1, _rx1) = sender();
        let (tx2, _rx2) = sender();

        assert!(registry.register("u-1", session_id, tx1).await);
        // Same session id again, even for another user, is a no-op.
        assert!(!registry.register("u-2", session_id, tx2).await);

        assert_eq!(registry.total_sessions().await, 1);
        assert_eq!(registry.session_count("u-1").await, 1);
        assert_eq!(registry.session_count("u-2").await, 0);
    }

    #[tokio::test]
    async fn test_sessions_for_returns_working_senders() {
        let registry = SessionRegistry::new();
        let (tx, mut rx) = sender();
        registry.register("u-1", SessionId::new(), tx).await;

        let sessions = registry.sessions_for("u-1").await;
        assert_eq!(sessions.len(), 1);

        sessions[0].1.send("hello".to_string()).unwrap();
        assert_eq!(rx.recv().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_sessions_for_unknown_user_is_empty() {
        let registry = SessionRegistry::new();
        assert!(registry.sessions_for("nobody").await.is_empty());
    }

    #[tokio::test]
    async fn test_unregister_removes_session_and_user_entry() {
        let registry = SessionRegistry::new();
        let session_id = SessionId::new();
        let (tx, _rx) = sender();

        registry.register("u-1", session_id, tx).await;
        registry.unregister(session_id).await;

        assert_eq!(registry.total_sessions().await, 0);
        assert_eq!(registry.session_count("u-1").await, 0);
        // The empty per-user entry is cleaned up too.
        assert_eq!(registry.connected_users().await, 0);
    }

    #[tokio::test]
    async fn test_unregister_keeps_other_sessions_of_same_user() {
        let registry = SessionRegistry::new();
        let first = SessionId::new();
        let second = SessionId::new();
        let (tx1, _rx1) = sender();
        let (tx2, _rx2) = sender();

        registry.register("u-1", first, tx1).await;
        registry.register("u-1", second, tx2).await;
        registry.unregister(first).await;

        assert_eq!(registry.session_count("u-1").await, 1);
        assert_eq!(registry.connected_users().await, 1);
    }

    #[tokio::test]
    async fn test_double_unregister_is_noop() {
        let registry = SessionRegistry::new();
        let session_id = SessionId::new();
        let (tx, _rx) = sender();

        registry.register("u-1", session_id, tx).await;
        registry.unregister(session_id).await;
        registry.unregister(session_id).await;

        assert_eq!(registry.total_sessions().await, 0);
    }

    #[tokio::test]
    async fn test_session_id_can_be_reused_after_unregister() {
        let registry = SessionRegistry::new();
        let session_id = SessionId::new();
        let (tx1, _rx1) = sender();
        let (tx2, _rx2) = sender();

        registry.register("u-1", session_id, tx1).await;
        registry.unregister(session_id).await;

        assert!(registry.register("u-1", session_id, tx2).await);
        assert_eq!(registry.total_sessions().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_registration() {
        let registry = SessionRegistry::new();
        let mut handles = Vec::new();

        for _ in 0..10 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let (tx, _rx) = mpsc::unbounded_channel();
                registry.register("u-1", SessionId::new(), tx).await;
                registry.sessions_for("u-1").await.len()
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(registry.total_sessions().await, 10);
        assert_eq!(registry.session_count("u-1").await, 10);
        assert_eq!(registry.connected_users().await, 1);
    }
}
