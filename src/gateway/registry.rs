//! Connection registry and the event-push seam
//!
//! The registry maps an authenticated identity to its live connection handle
//! and enforces at most one live connection per identity. Delivery is
//! at-most-once and best-effort: `send_to` is a counted no-op when the target
//! is offline, and nothing is retried or persisted.

use crate::error::Result;
use crate::gateway::events::ServerEvent;
use crate::metrics::MetricsCollector;
use crate::types::PlayerId;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Frame sent to a connection's writer task
#[derive(Debug, Clone)]
pub enum OutboundFrame {
    /// A server event to serialize onto the socket
    Event(ServerEvent),
    /// Close the socket (eviction by a newer connection)
    Shutdown,
}

/// Handle to push frames to one connected client
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    /// Distinguishes this connection from a later one for the same identity
    pub connection_id: Uuid,
    pub player_id: PlayerId,
    tx: mpsc::UnboundedSender<OutboundFrame>,
}

/// Trait for pushing events to players and rooms
///
/// This is the seam the SessionManager depends on; the production
/// implementation is the ConnectionRegistry, tests use `MockEventSink`.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Push an event to one player; silently dropped if not connected
    async fn send_to(&self, player_id: &str, event: ServerEvent) -> Result<()>;

    /// Push an event to every participant of a room
    async fn broadcast_to_room(&self, participants: &[PlayerId], event: ServerEvent) -> Result<()>;
}

/// Registry of live connections, keyed by authenticated identity
pub struct ConnectionRegistry {
    connections: DashMap<PlayerId, ConnectionHandle>,
    metrics: Arc<MetricsCollector>,
}

impl ConnectionRegistry {
    pub fn new(metrics: Arc<MetricsCollector>) -> Self {
        Self {
            connections: DashMap::new(),
            metrics,
        }
    }

    /// Register a new connection for an identity.
    ///
    /// Any prior handle for the same identity is evicted and told to close:
    /// at most one live connection per identity is an enforced invariant.
    pub fn register(
        &self,
        player_id: PlayerId,
        tx: mpsc::UnboundedSender<OutboundFrame>,
    ) -> Uuid {
        let connection_id = Uuid::new_v4();
        let handle = ConnectionHandle {
            connection_id,
            player_id: player_id.clone(),
            tx,
        };

        if let Some(previous) = self.connections.insert(player_id.clone(), handle) {
            info!(
                "Evicting previous connection {} for player '{}'",
                previous.connection_id, player_id
            );
            let _ = previous.tx.send(OutboundFrame::Shutdown);
            self.metrics.gateway().connections_evicted_total.inc();
        } else {
            self.metrics.gateway().connected_players.inc();
        }

        debug!(
            "Registered connection {} for player '{}' ({} connected)",
            connection_id,
            player_id,
            self.connections.len()
        );
        connection_id
    }

    /// Remove a connection on disconnect.
    ///
    /// The connection id guards against a stale loop unregistering the
    /// newer connection that evicted it.
    pub fn unregister(&self, player_id: &str, connection_id: Uuid) {
        let removed = self
            .connections
            .remove_if(player_id, |_, handle| handle.connection_id == connection_id);

        if removed.is_some() {
            self.metrics.gateway().connected_players.dec();
            debug!(
                "Unregistered connection {} for player '{}'",
                connection_id, player_id
            );
        }
    }

    /// Whether an identity currently has a live connection
    pub fn is_connected(&self, player_id: &str) -> bool {
        self.connections.contains_key(player_id)
    }

    /// Number of live connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

#[async_trait]
impl EventSink for ConnectionRegistry {
    async fn send_to(&self, player_id: &str, event: ServerEvent) -> Result<()> {
        match self.connections.get(player_id) {
            Some(handle) => {
                if handle.tx.send(OutboundFrame::Event(event)).is_err() {
                    // Writer task already gone; the read loop will unregister.
                    warn!("Connection channel closed for player '{}'", player_id);
                    self.metrics.gateway().push_drops_total.inc();
                }
            }
            None => {
                debug!(
                    "Dropping '{}' push for offline player '{}'",
                    event.name(),
                    player_id
                );
                self.metrics.gateway().push_drops_total.inc();
            }
        }
        Ok(())
    }

    async fn broadcast_to_room(&self, participants: &[PlayerId], event: ServerEvent) -> Result<()> {
        for player_id in participants {
            self.send_to(player_id, event.clone()).await?;
        }
        Ok(())
    }
}

/// Mock event sink for testing: records every push
#[derive(Debug, Default)]
pub struct MockEventSink {
    pushed: std::sync::Mutex<Vec<(PlayerId, ServerEvent)>>,
}

impl MockEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All pushes so far as (target, event) pairs
    pub fn pushed_events(&self) -> Vec<(PlayerId, ServerEvent)> {
        self.pushed
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Count pushes of a given wire event name
    pub fn count_events_named(&self, name: &str) -> usize {
        self.pushed_events()
            .iter()
            .filter(|(_, event)| event.name() == name)
            .count()
    }

    /// Events pushed to a specific player
    pub fn events_for(&self, player_id: &str) -> Vec<ServerEvent> {
        self.pushed_events()
            .into_iter()
            .filter(|(target, _)| target == player_id)
            .map(|(_, event)| event)
            .collect()
    }

    /// Clear recorded pushes
    pub fn clear(&self) {
        if let Ok(mut events) = self.pushed.lock() {
            events.clear();
        }
    }
}

#[async_trait]
impl EventSink for MockEventSink {
    async fn send_to(&self, player_id: &str, event: ServerEvent) -> Result<()> {
        if let Ok(mut events) = self.pushed.lock() {
            events.push((player_id.to_string(), event));
        }
        Ok(())
    }

    async fn broadcast_to_room(&self, participants: &[PlayerId], event: ServerEvent) -> Result<()> {
        for player_id in participants {
            self.send_to(player_id, event.clone()).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ConnectionRegistry {
        ConnectionRegistry::new(Arc::new(MetricsCollector::default()))
    }

    #[tokio::test]
    async fn test_register_and_send() {
        let registry = registry();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register("p1".to_string(), tx);

        assert!(registry.is_connected("p1"));
        registry
            .send_to("p1", ServerEvent::error("boom"))
            .await
            .unwrap();

        match rx.recv().await {
            Some(OutboundFrame::Event(ServerEvent::Error(payload))) => {
                assert_eq!(payload.message, "boom");
            }
            other => panic!("Unexpected frame: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_to_offline_is_a_counted_noop() {
        let registry = registry();
        // No connection registered: must not error.
        registry
            .send_to("ghost", ServerEvent::error("dropped"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_second_connection_evicts_first() {
        let registry = registry();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let first_id = registry.register("p1".to_string(), tx1);

        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let second_id = registry.register("p1".to_string(), tx2);
        assert_ne!(first_id, second_id);

        // Evicted connection receives the shutdown frame.
        assert!(matches!(rx1.recv().await, Some(OutboundFrame::Shutdown)));

        // Pushes go to the new connection only.
        registry
            .send_to("p1", ServerEvent::error("to-new"))
            .await
            .unwrap();
        assert!(matches!(rx2.recv().await, Some(OutboundFrame::Event(_))));
        assert_eq!(registry.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_stale_unregister_keeps_new_connection() {
        let registry = registry();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let first_id = registry.register("p1".to_string(), tx1);

        let (tx2, _rx2) = mpsc::unbounded_channel();
        registry.register("p1".to_string(), tx2);

        // The evicted loop shutting down must not remove the newer handle.
        registry.unregister("p1", first_id);
        assert!(registry.is_connected("p1"));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_participants() {
        let registry = registry();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        registry.register("p1".to_string(), tx1);
        registry.register("p2".to_string(), tx2);

        registry
            .broadcast_to_room(
                &["p1".to_string(), "p2".to_string()],
                ServerEvent::error("room-wide"),
            )
            .await
            .unwrap();

        assert!(matches!(rx1.recv().await, Some(OutboundFrame::Event(_))));
        assert!(matches!(rx2.recv().await, Some(OutboundFrame::Event(_))));
    }

    #[tokio::test]
    async fn test_mock_sink_records_pushes() {
        let sink = MockEventSink::new();
        sink.send_to("p1", ServerEvent::error("x")).await.unwrap();
        sink.broadcast_to_room(
            &["p1".to_string(), "p2".to_string()],
            ServerEvent::error("y"),
        )
        .await
        .unwrap();

        assert_eq!(sink.count_events_named("error"), 3);
        assert_eq!(sink.events_for("p2").len(), 1);
    }
}
