use crate::strategy::{Delivery, EmitStrategy};
use dashmap::DashMap;
use events::Event;
use log::*;
use std::fmt;
use tokio::sync::mpsc::Sender;

/// Delivery queue of a single streaming connection.
pub type Subscriber = Sender<Event>;

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Concurrent map of open connections to their delivery queues.
///
/// One registry belongs to exactly one `Controller`, so independent servers
/// (for example in tests) never see each other's subscribers.
pub struct SubscriberRegistry {
    subscribers: DashMap<ConnectionId, Subscriber>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
        }
    }

    /// Register a connection's queue, returning the queue it replaced, if any.
    pub fn store(&self, connection_id: ConnectionId, queue: Subscriber) -> Option<Subscriber> {
        self.subscribers.insert(connection_id, queue)
    }

    /// Remove a connection. Returns `false` if it was not registered.
    pub fn delete(&self, connection_id: &ConnectionId) -> bool {
        self.subscribers.remove(connection_id).is_some()
    }

    pub fn has_subscriber(&self, connection_id: &ConnectionId) -> bool {
        self.subscribers.contains_key(connection_id)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Offer `event` to every registered queue according to `strategy`.
    ///
    /// Returns how many queues accepted the event. Queues are visited in
    /// no particular order; each queue stays FIFO.
    pub async fn broadcast(&self, event: &Event, strategy: EmitStrategy) -> usize {
        // Snapshot first: shard locks must not be held across an await.
        let subscribers: Vec<(ConnectionId, Subscriber)> = self
            .subscribers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut delivered = 0;
        for (connection_id, queue) in subscribers {
            match strategy.deliver(&queue, event.clone()).await {
                Delivery::Delivered => delivered += 1,
                Delivery::Full => {
                    warn!("Dropping event for slow subscriber {connection_id}: queue full")
                }
                Delivery::TimedOut => {
                    warn!("Dropping event for slow subscriber {connection_id}: delivery timed out")
                }
                Delivery::Closed => {
                    debug!("Skipping closed subscriber {connection_id}")
                }
            }
        }

        delivered
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[test]
    fn test_connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }

    #[test]
    fn test_store_has_and_delete() {
        let registry = SubscriberRegistry::new();
        let id = ConnectionId::new();
        let (tx, _rx) = mpsc::channel(1);

        assert!(registry.store(id.clone(), tx).is_none());
        assert!(registry.has_subscriber(&id));
        assert_eq!(registry.len(), 1);

        assert!(registry.delete(&id));
        assert!(!registry.has_subscriber(&id));
        assert!(!registry.delete(&id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_store_replaces_existing_queue() {
        let registry = SubscriberRegistry::new();
        let id = ConnectionId::new();
        let (first, _rx1) = mpsc::channel(1);
        let (second, _rx2) = mpsc::channel(1);

        registry.store(id.clone(), first);
        assert!(registry.store(id, second).is_some());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_subscriber() {
        let registry = SubscriberRegistry::new();
        let (tx1, mut rx1) = mpsc::channel(1);
        let (tx2, mut rx2) = mpsc::channel(1);
        registry.store(ConnectionId::new(), tx1);
        registry.store(ConnectionId::new(), tx2);

        let delivered = registry
            .broadcast(&Event::new("hello"), EmitStrategy::Block)
            .await;

        assert_eq!(delivered, 2);
        assert_eq!(rx1.recv().await, Some(Event::new("hello")));
        assert_eq!(rx2.recv().await, Some(Event::new("hello")));
    }

    #[tokio::test]
    async fn test_drop_strategy_skips_full_queue_only() {
        let registry = SubscriberRegistry::new();
        let (slow, mut slow_rx) = mpsc::channel(1);
        let (fast, mut fast_rx) = mpsc::channel(1);
        slow.try_send(Event::new("backlog")).unwrap();
        registry.store(ConnectionId::new(), slow);
        registry.store(ConnectionId::new(), fast);

        let delivered = registry
            .broadcast(&Event::new("fresh"), EmitStrategy::Drop)
            .await;

        assert_eq!(delivered, 1);
        assert_eq!(fast_rx.recv().await, Some(Event::new("fresh")));
        assert_eq!(slow_rx.recv().await, Some(Event::new("backlog")));
        assert!(slow_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_strategy_gives_up_on_full_queue() {
        let registry = SubscriberRegistry::new();
        let (slow, mut slow_rx) = mpsc::channel(1);
        slow.try_send(Event::new("backlog")).unwrap();
        registry.store(ConnectionId::new(), slow);

        let delivered = registry
            .broadcast(&Event::new("fresh"), EmitStrategy::Timeout(Duration::from_millis(20)))
            .await;

        assert_eq!(delivered, 0);
        assert_eq!(slow_rx.recv().await, Some(Event::new("backlog")));
        assert!(slow_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_block_strategy_waits_for_capacity() {
        let registry = Arc::new(SubscriberRegistry::new());
        let (slow, mut slow_rx) = mpsc::channel(1);
        slow.try_send(Event::new("backlog")).unwrap();
        registry.store(ConnectionId::new(), slow);

        let broadcaster = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                registry
                    .broadcast(&Event::new("fresh"), EmitStrategy::Block)
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!broadcaster.is_finished());

        assert_eq!(slow_rx.recv().await, Some(Event::new("backlog")));
        assert_eq!(broadcaster.await.unwrap(), 1);
        assert_eq!(slow_rx.recv().await, Some(Event::new("fresh")));
    }

    #[tokio::test]
    async fn test_broadcast_skips_closed_subscriber() {
        let registry = SubscriberRegistry::new();
        let (tx, rx) = mpsc::channel(1);
        registry.store(ConnectionId::new(), tx);
        drop(rx);

        let delivered = registry
            .broadcast(&Event::new("hello"), EmitStrategy::Block)
            .await;

        assert_eq!(delivered, 0);
    }
}
