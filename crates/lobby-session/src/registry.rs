//! The connection registry: which live connection reaches which user.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use lobby_transport::{Connection, ConnectionId};
use tokio::sync::Mutex;

use crate::SessionError;

/// Which of a user's two channels an entry refers to.
///
/// The primary entry is the request/response connection. The listener
/// entry is the auxiliary connection that receives pushed notifications.
/// They are independent: either can exist without the other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RegistryKey {
    Primary(String),
    Listener(String),
}

impl RegistryKey {
    pub fn user(&self) -> &str {
        match self {
            Self::Primary(user) | Self::Listener(user) => user,
        }
    }
}

impl fmt::Display for RegistryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary(user) => write!(f, "{user}"),
            Self::Listener(user) => write!(f, "{user}_listener"),
        }
    }
}

/// Process-wide map from [`RegistryKey`] to connection.
///
/// Entries hold [`Weak`] references: the registry never keeps a closed
/// connection alive, and a dropped connection simply stops resolving.
/// Every operation takes the one map lock. Sends happen after the lock is
/// released so a slow peer cannot stall unrelated lookups.
pub struct ConnectionRegistry<C> {
    entries: Mutex<HashMap<RegistryKey, Weak<C>>>,
}

impl<C: Connection> ConnectionRegistry<C> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Binds `key` to `conn`, replacing any earlier binding.
    pub async fn register(&self, key: RegistryKey, conn: &Arc<C>) {
        let id = conn.id();
        let mut entries = self.entries.lock().await;
        entries.insert(key.clone(), Arc::downgrade(conn));
        tracing::debug!(%key, conn = %id, "registered connection");
    }

    /// Removes `key`. Returns `false` if it was not registered.
    pub async fn unregister(&self, key: &RegistryKey) -> bool {
        let removed = self.entries.lock().await.remove(key).is_some();
        if removed {
            tracing::debug!(%key, "unregistered connection");
        }
        removed
    }

    /// Removes `key` only if it still points at connection `id` (or at a
    /// connection that no longer exists).
    ///
    /// Used on disconnect so a connection that lost its entry to a newer
    /// login does not evict the newer one.
    pub async fn release(&self, key: &RegistryKey, id: ConnectionId) -> bool {
        let mut entries = self.entries.lock().await;
        let owned = match entries.get(key).map(Weak::upgrade) {
            Some(Some(conn)) => conn.id() == id,
            Some(None) => true,
            None => false,
        };
        if owned {
            entries.remove(key);
            tracing::debug!(%key, conn = %id, "released connection");
        }
        owned
    }

    /// The live connection registered under `key`, if any.
    pub async fn lookup(&self, key: &RegistryKey) -> Option<Arc<C>> {
        self.entries.lock().await.get(key).and_then(Weak::upgrade)
    }

    /// Returns `true` if `key` has an entry, live or not.
    pub async fn contains(&self, key: &RegistryKey) -> bool {
        self.entries.lock().await.contains_key(key)
    }

    /// Sends one framed message to the connection under `key`.
    ///
    /// # Errors
    /// - [`SessionError::NotRegistered`] if there is no entry
    /// - [`SessionError::ConnectionGone`] if the connection was dropped
    /// - [`SessionError::SendFailed`] if the write failed
    ///
    /// The entry is left in place on failure; callers decide whether to
    /// prune it.
    pub async fn send_to(&self, key: &RegistryKey, payload: &[u8]) -> Result<(), SessionError> {
        let conn = {
            let entries = self.entries.lock().await;
            let weak = entries
                .get(key)
                .ok_or_else(|| SessionError::NotRegistered(key.to_string()))?;
            weak.upgrade()
                .ok_or_else(|| SessionError::ConnectionGone(key.to_string()))?
        };

        conn.send(payload)
            .await
            .map_err(|source| SessionError::SendFailed {
                key: key.to_string(),
                source,
            })
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

impl<C: Connection> Default for ConnectionRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use lobby_transport::TransportError;

    use super::*;

    /// In-memory connection that records what it was sent.
    struct MockConnection {
        id: ConnectionId,
        sent: StdMutex<Vec<Vec<u8>>>,
        broken: AtomicBool,
    }

    impl MockConnection {
        fn new(id: u64) -> Arc<Self> {
            Arc::new(Self {
                id: ConnectionId::new(id),
                sent: StdMutex::new(Vec::new()),
                broken: AtomicBool::new(false),
            })
        }

        fn sent(&self) -> Vec<Vec<u8>> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Connection for MockConnection {
        async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(TransportError::ConnectionClosed("broken pipe".into()));
            }
            self.sent.lock().unwrap().push(data.to_vec());
            Ok(())
        }

        async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
            Ok(None)
        }

        async fn close(&self) -> Result<(), TransportError> {
            Ok(())
        }

        fn id(&self) -> ConnectionId {
            self.id
        }
    }

    fn listener(user: &str) -> RegistryKey {
        RegistryKey::Listener(user.to_string())
    }

    #[test]
    fn test_registry_key_display() {
        assert_eq!(RegistryKey::Primary("bob".into()).to_string(), "bob");
        assert_eq!(listener("bob").to_string(), "bob_listener");
        assert_eq!(listener("bob").user(), "bob");
    }

    #[tokio::test]
    async fn test_send_to_registered_delivers() {
        let registry = ConnectionRegistry::new();
        let conn = MockConnection::new(1);
        registry.register(listener("bob"), &conn).await;

        registry.send_to(&listener("bob"), b"hello").await.unwrap();
        assert_eq!(conn.sent(), vec![b"hello".to_vec()]);
    }

    #[tokio::test]
    async fn test_send_to_missing_key_not_registered() {
        let registry: ConnectionRegistry<MockConnection> = ConnectionRegistry::new();
        let err = registry.send_to(&listener("ghost"), b"x").await.unwrap_err();
        assert!(matches!(err, SessionError::NotRegistered(ref k) if k == "ghost_listener"));
    }

    #[tokio::test]
    async fn test_send_to_dropped_connection_gone() {
        let registry = ConnectionRegistry::new();
        let conn = MockConnection::new(1);
        registry.register(listener("bob"), &conn).await;
        drop(conn);

        let err = registry.send_to(&listener("bob"), b"x").await.unwrap_err();
        assert!(matches!(err, SessionError::ConnectionGone(_)));
        assert!(registry.lookup(&listener("bob")).await.is_none());
    }

    #[tokio::test]
    async fn test_send_to_broken_connection_send_failed() {
        let registry = ConnectionRegistry::new();
        let conn = MockConnection::new(1);
        conn.broken.store(true, Ordering::SeqCst);
        registry.register(listener("bob"), &conn).await;

        let err = registry.send_to(&listener("bob"), b"x").await.unwrap_err();
        assert!(matches!(err, SessionError::SendFailed { .. }));
        assert!(registry.contains(&listener("bob")).await);
    }

    #[tokio::test]
    async fn test_primary_and_listener_are_independent() {
        let registry = ConnectionRegistry::new();
        let primary = MockConnection::new(1);
        let aux = MockConnection::new(2);
        registry.register(RegistryKey::Primary("bob".into()), &primary).await;
        registry.register(listener("bob"), &aux).await;

        assert!(registry.unregister(&RegistryKey::Primary("bob".into())).await);
        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.lookup(&listener("bob")).await.unwrap().id(), aux.id());
    }

    #[tokio::test]
    async fn test_release_ignores_other_connection() {
        let registry = ConnectionRegistry::new();
        let old = MockConnection::new(1);
        let new = MockConnection::new(2);
        registry.register(listener("bob"), &old).await;
        registry.register(listener("bob"), &new).await;

        assert!(!registry.release(&listener("bob"), old.id()).await);
        assert!(registry.release(&listener("bob"), new.id()).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_release_prunes_dead_entry() {
        let registry = ConnectionRegistry::new();
        let conn = MockConnection::new(5);
        registry.register(listener("bob"), &conn).await;
        let id = conn.id();
        drop(conn);

        assert!(registry.release(&listener("bob"), id).await);
        assert!(!registry.unregister(&listener("bob")).await);
    }
}
