//! Session registry and event fan-out.
//!
//! The registry is the single owner of the set of live client sessions.
//! Connection handlers add and remove their own session; the broadcaster
//! takes a snapshot per event and evicts sessions it cannot deliver to.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐   add/remove   ┌─────────────────┐
//! │ConnectionHandler│───────────────▶│ SessionRegistry │
//! │  (per client)   │                │ RwLock<HashMap> │
//! └─────────────────┘                └────────┬────────┘
//!                                             │ snapshot()
//!                                             ▼
//! ┌─────────────────┐     Frame      ┌─────────────────┐
//! │ session queues  │◀───────────────│   Broadcaster   │
//! │ (writer tasks)  │  concurrently  │                 │
//! └─────────────────┘                └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the crate's panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Delivery failures are reported as values and never escape `broadcast`

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use photobox_core::SessionId;

mod broadcast;
mod session;

pub use broadcast::{BroadcastReport, Broadcaster, SEND_TIMEOUT};
pub use session::{DeliveryError, Frame, SessionHandle, OUTBOUND_BUFFER};

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// A session with this ID is already registered.
    ///
    /// IDs come from the hub's connection counter, so this indicates a bug.
    #[error("session already registered: {0}")]
    AlreadyRegistered(SessionId),
}

/// The set of currently connected sessions.
///
/// Every mutation is a single atomic insert or remove under the write lock;
/// readers get a cloned snapshot and hold no lock while doing I/O.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session.
    ///
    /// # Errors
    ///
    /// - `RegistryError::AlreadyRegistered` if the ID is already present
    pub async fn add(&self, session: SessionHandle) -> Result<(), RegistryError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(session.id()) {
            return Err(RegistryError::AlreadyRegistered(session.id().clone()));
        }
        debug!(session_id = %session.id(), total = sessions.len() + 1, "Session registered");
        sessions.insert(session.id().clone(), session);
        Ok(())
    }

    /// Deregisters a session, returning its handle if it was present.
    ///
    /// Removing an unknown session is a no-op: the broadcaster and the
    /// connection handler may both try to remove the same session.
    pub async fn remove(&self, session_id: &SessionId) -> Option<SessionHandle> {
        let removed = self.sessions.write().await.remove(session_id);
        if removed.is_some() {
            debug!(session_id = %session_id, "Session deregistered");
        }
        removed
    }

    /// Returns the sessions registered right now.
    pub async fn snapshot(&self) -> Vec<SessionHandle> {
        self.sessions.read().await.values().cloned().collect()
    }

    /// Returns true if the session is registered.
    pub async fn contains(&self, session_id: &SessionId) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    /// Returns the number of registered sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns true if no session is registered.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn session(n: u64) -> SessionHandle {
        SessionHandle::channel(SessionId::from_connection(n), None).0
    }

    #[tokio::test]
    async fn test_add_and_snapshot() {
        let registry = SessionRegistry::new();
        registry.add(session(1)).await.unwrap();
        registry.add(session(2)).await.unwrap();

        let mut ids: Vec<String> = registry
            .snapshot()
            .await
            .iter()
            .map(|s| s.id().to_string())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["client-1", "client-2"]);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_add_duplicate_is_rejected() {
        let registry = SessionRegistry::new();
        registry.add(session(1)).await.unwrap();
        let result = registry.add(session(1)).await;
        assert!(matches!(result, Err(RegistryError::AlreadyRegistered(_))));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_remove_absent_is_noop() {
        let registry = SessionRegistry::new();
        assert!(registry.remove(&SessionId::from_connection(9)).await.is_none());

        registry.add(session(1)).await.unwrap();
        let id = SessionId::from_connection(1);
        assert!(registry.remove(&id).await.is_some());
        assert!(registry.remove(&id).await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_snapshot_is_stable_across_mutation() {
        let registry = SessionRegistry::new();
        registry.add(session(1)).await.unwrap();
        let snapshot = registry.snapshot().await;

        registry.add(session(2)).await.unwrap();
        registry.remove(&SessionId::from_connection(1)).await;

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id().as_str(), "client-1");
        assert!(registry.contains(&SessionId::from_connection(2)).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_add_remove() {
        let registry = Arc::new(SessionRegistry::new());
        let mut tasks = Vec::new();
        for n in 0..50 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                registry.add(session(n)).await.unwrap();
                if n % 2 == 0 {
                    registry.remove(&SessionId::from_connection(n)).await;
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(registry.len().await, 25);
    }
}
