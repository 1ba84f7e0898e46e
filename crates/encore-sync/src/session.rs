//! # Session Store
//!
//! Holds the bearer token and identity for the current booth session.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Session Lifecycle                                 │
//! │                                                                         │
//! │  login / resume                                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────┐   set(session)    ┌──────────────┐                    │
//! │  │   Absent    │ ────────────────► │   Present    │                    │
//! │  └─────────────┘                   └──────┬───────┘                    │
//! │       ▲                                   │                             │
//! │       │        clear()                    │  401 from ANY endpoint     │
//! │       │  (logout or unauthorized)         │  or explicit logout        │
//! │       └───────────────────────────────────┘                             │
//! │                                                                         │
//! │  clear() on a Present session broadcasts one session-invalidated       │
//! │  signal; clear() on an Absent session is a no-op, so concurrent 401    │
//! │  handlers cannot double-fire the signal.                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Token presence implies role presence by construction: the store holds a
//! whole [`Session`] or nothing, and replaces/clears it atomically.

use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

use encore_core::{Role, Session};

/// Capacity of the session-invalidated broadcast channel.
const SIGNAL_CAPACITY: usize = 16;

/// Thread-safe holder of the current session.
///
/// Cheap to clone; all clones share the same state and signal channel.
#[derive(Debug, Clone)]
pub struct SessionStore {
    current: Arc<RwLock<Option<Session>>>,
    invalidated_tx: broadcast::Sender<()>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (invalidated_tx, _) = broadcast::channel(SIGNAL_CAPACITY);
        SessionStore {
            current: Arc::new(RwLock::new(None)),
            invalidated_tx,
        }
    }

    /// Stores a session, replacing any prior value.
    pub async fn set(&self, session: Session) {
        info!(role = %session.role, remote = session.remote, "Session established");
        *self.current.write().await = Some(session);
    }

    /// Clears the session and broadcasts the session-invalidated signal.
    ///
    /// All four identity fields go together (they live in one value).
    /// Clearing an already-absent session emits nothing.
    pub async fn clear(&self) {
        let had_session = {
            let mut guard = self.current.write().await;
            guard.take().is_some()
        };

        if had_session {
            info!("Session cleared");
            // No receivers is fine: nobody has subscribed yet.
            let _ = self.invalidated_tx.send(());
        } else {
            debug!("Session clear on empty store ignored");
        }
    }

    /// Returns the current session, if any.
    pub async fn get(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    /// Returns the current bearer token, if any.
    pub async fn token(&self) -> Option<String> {
        self.current.read().await.as_ref().map(|s| s.token.clone())
    }

    /// Returns the current role, if any.
    pub async fn role(&self) -> Option<Role> {
        self.current.read().await.as_ref().map(|s| s.role)
    }

    /// Returns true if a session is present.
    pub async fn is_present(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// Subscribes to session-invalidated signals.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.invalidated_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(token: &str) -> Session {
        Session {
            token: token.into(),
            role: Role::Dj,
            subject_id: None,
            subject_name: None,
            remote: false,
        }
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = SessionStore::new();
        assert!(store.get().await.is_none());

        store.set(session("tok-1")).await;
        assert_eq!(store.token().await.as_deref(), Some("tok-1"));
        assert_eq!(store.role().await, Some(Role::Dj));

        // Replacement, not merge.
        store.set(session("tok-2")).await;
        assert_eq!(store.token().await.as_deref(), Some("tok-2"));
    }

    #[tokio::test]
    async fn test_clear_emits_signal_once() {
        let store = SessionStore::new();
        let mut rx = store.subscribe();

        store.set(session("tok-1")).await;
        store.clear().await;

        assert!(store.get().await.is_none());
        assert!(rx.try_recv().is_ok());

        // Second clear on an empty store: no second signal.
        store.clear().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_clear_before_subscribe_is_harmless() {
        let store = SessionStore::new();
        store.set(session("tok-1")).await;
        // No subscribers yet; must not panic or error.
        store.clear().await;
        assert!(store.get().await.is_none());
    }
}
