//! Connection Registry
//!
//! Owns the set of live signaling connections, keyed by connection id.
//! Delivery goes through a per-connection unbounded channel drained by that
//! connection's write task, so delivering to one peer never blocks on another
//! peer's transport.

use std::collections::HashMap;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};

use super::envelope::Envelope;

/// Unique identifier for a live signaling connection
pub type ConnectionId = String;

/// State held for one live connection
struct Connection {
    /// Outbound channel to this connection's write task
    sender: mpsc::UnboundedSender<String>,
    /// When the connection was registered
    created_at: DateTime<Utc>,
    /// User identity, attached post-handshake; may stay unset for the
    /// connection's whole lifetime
    user_id: Option<String>,
}

/// Outcome of one `deliver` call
///
/// Per-target isolation: a failed write to one target never aborts delivery
/// to the others, it only shows up in these counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Targets the envelope was handed to
    pub delivered: usize,
    /// Targets that were no longer registered (peers disconnect asynchronously)
    pub skipped: usize,
    /// Targets whose outbound channel was gone
    pub failed: usize,
}

/// Tracks live connections and writes envelopes to them
pub struct ConnectionRegistry {
    connections: Arc<RwLock<HashMap<ConnectionId, Connection>>>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a new connection with its outbound channel
    ///
    /// A duplicate id is a transport-contract violation, surfaced as an error
    /// rather than silently replacing the live entry.
    pub async fn register(
        &self,
        id: ConnectionId,
        sender: mpsc::UnboundedSender<String>,
    ) -> Result<(), RegistryError> {
        let mut connections = self.connections.write().await;
        if connections.contains_key(&id) {
            return Err(RegistryError::DuplicateConnection(id));
        }

        connections.insert(
            id.clone(),
            Connection {
                sender,
                created_at: Utc::now(),
                user_id: None,
            },
        );
        drop(connections);

        tracing::info!(connection_id = %id, "signaling connection registered");
        Ok(())
    }

    /// Remove a connection; idempotent
    ///
    /// Disconnect teardown may race with explicit cleanup, so unregistering an
    /// already-absent id is a no-op, never an error.
    pub async fn unregister(&self, id: &str) {
        let removed = self.connections.write().await.remove(id);
        if let Some(conn) = removed {
            let lifetime = Utc::now() - conn.created_at;
            tracing::info!(
                connection_id = %id,
                user_id = ?conn.user_id,
                lifetime_secs = lifetime.num_seconds(),
                "signaling connection unregistered"
            );
        }
    }

    /// Attach a user identity to a live connection
    ///
    /// Returns false when the connection is gone (already torn down).
    pub async fn attach_user(&self, id: &str, user_id: impl Into<String>) -> bool {
        let mut connections = self.connections.write().await;
        match connections.get_mut(id) {
            Some(conn) => {
                conn.user_id = Some(user_id.into());
                true
            }
            None => false,
        }
    }

    /// Point-in-time snapshot of all registered ids other than the given one
    ///
    /// A copy, not a live view: iteration during delivery is unaffected by
    /// concurrent register/unregister.
    pub async fn all_except(&self, id: &str) -> Vec<ConnectionId> {
        self.connections
            .read()
            .await
            .keys()
            .filter(|k| k.as_str() != id)
            .cloned()
            .collect()
    }

    /// Write an envelope to each live target
    ///
    /// The envelope is serialized once and the text cloned per target. Targets
    /// that are no longer registered are silently skipped. A write failure to
    /// one target is counted and never aborts delivery to the others.
    pub async fn deliver(&self, targets: &[ConnectionId], envelope: &Envelope) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        let text = match envelope.encode() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode outbound envelope");
                report.failed = targets.len();
                return report;
            }
        };

        let connections = self.connections.read().await;
        for id in targets {
            match connections.get(id) {
                Some(conn) => {
                    if conn.sender.send(text.clone()).is_ok() {
                        report.delivered += 1;
                    } else {
                        // Write task gone but entry not yet unregistered
                        tracing::warn!(connection_id = %id, "outbound write failed");
                        report.failed += 1;
                    }
                }
                None => report.skipped += 1,
            }
        }

        report
    }

    /// Number of live connections
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

/// Errors raised by the connection registry
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("connection {0} is already registered")]
    DuplicateConnection(ConnectionId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn envelope() -> Envelope {
        Envelope {
            kind: "offerResponse".to_string(),
            data: Value::String("sdp".to_string()),
        }
    }

    #[tokio::test]
    async fn test_register_unregister() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        registry.register("a".to_string(), tx).await.unwrap();
        assert_eq!(registry.connection_count().await, 1);

        registry.unregister("a").await;
        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_register_fails() {
        let registry = ConnectionRegistry::new();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        registry.register("a".to_string(), tx1).await.unwrap();
        let err = registry.register("a".to_string(), tx2).await.unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateConnection(_)));
    }

    #[tokio::test]
    async fn test_unregister_absent_is_noop() {
        let registry = ConnectionRegistry::new();
        registry.unregister("never-registered").await;
        registry.unregister("never-registered").await;
        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_attach_user() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        registry.register("a".to_string(), tx).await.unwrap();
        assert!(registry.attach_user("a", "u1").await);
        assert!(!registry.attach_user("gone", "u1").await);
    }

    #[tokio::test]
    async fn test_all_except_is_a_snapshot() {
        let registry = ConnectionRegistry::new();
        for id in ["a", "b", "c"] {
            let (tx, _rx) = mpsc::unbounded_channel();
            registry.register(id.to_string(), tx).await.unwrap();
        }

        let others = registry.all_except("a").await;
        assert_eq!(others.len(), 2);
        assert!(!others.contains(&"a".to_string()));

        // Mutating the registry does not affect the snapshot
        registry.unregister("b").await;
        assert_eq!(others.len(), 2);
    }

    #[tokio::test]
    async fn test_deliver_to_registered_target() {
        let registry = ConnectionRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register("a".to_string(), tx).await.unwrap();

        let report = registry.deliver(&["a".to_string()], &envelope()).await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.failed, 0);

        let text = rx.try_recv().unwrap();
        assert!(text.contains("\"type\":\"offerResponse\""));
    }

    #[tokio::test]
    async fn test_deliver_skips_unregistered_target() {
        let registry = ConnectionRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register("a".to_string(), tx).await.unwrap();
        registry.unregister("a").await;

        let report = registry.deliver(&["a".to_string()], &envelope()).await;
        assert_eq!(report.delivered, 0);
        assert_eq!(report.skipped, 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_deliver_isolates_failures() {
        let registry = ConnectionRegistry::new();

        let (tx_ok, mut rx_ok) = mpsc::unbounded_channel();
        registry.register("ok".to_string(), tx_ok).await.unwrap();

        // Registered entry whose write task has already gone away
        let (tx_dead, rx_dead) = mpsc::unbounded_channel();
        drop(rx_dead);
        registry.register("dead".to_string(), tx_dead).await.unwrap();

        let targets = vec!["dead".to_string(), "ok".to_string(), "absent".to_string()];
        let report = registry.deliver(&targets, &envelope()).await;

        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 1);
        assert!(rx_ok.try_recv().is_ok());
    }
}
