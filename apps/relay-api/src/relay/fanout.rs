//! Broadcast hub for dispatching relay events to connected clients.
//!
//! Uses a single `tokio::sync::broadcast` channel. Each connection's event
//! loop subscribes and filters payloads locally by audience. The single
//! channel yields one total order over all dispatched events, so per-room
//! send order is automatically preserved for every recipient.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;

/// Capacity of the broadcast channel. Slow receivers that fall behind will
/// skip messages (RecvError::Lagged).
const BROADCAST_CAPACITY: usize = 4096;

/// Target set of a dispatched payload.
#[derive(Debug, Clone)]
pub enum Audience {
    /// Every connected client, room member or not (calendar invalidation).
    All,
    /// An explicit list of connection ids (room-scoped events).
    Connections(Vec<String>),
}

impl Audience {
    /// Whether the payload should be delivered to the given connection.
    pub fn includes(&self, connection_id: &str) -> bool {
        match self {
            Audience::All => true,
            Audience::Connections(ids) => ids.iter().any(|id| id == connection_id),
        }
    }
}

/// A payload broadcast to connected relay clients.
#[derive(Debug, Clone)]
pub struct BroadcastPayload {
    /// Which connections should deliver this payload to their socket.
    pub audience: Audience,
    /// The event name (e.g. "receive-message").
    pub event: String,
    /// Serialized event data (serde_json::Value).
    pub data: Value,
}

/// The global broadcast hub. Cloneable; held by the relay service.
#[derive(Clone)]
pub struct RelayBroadcast {
    sender: broadcast::Sender<Arc<BroadcastPayload>>,
}

impl RelayBroadcast {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { sender }
    }

    /// Subscribe to the broadcast channel. Each connection's event loop
    /// should call this once at handshake time.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<BroadcastPayload>> {
        self.sender.subscribe()
    }

    /// Dispatch a payload to all subscribed connections.
    pub fn dispatch(&self, payload: BroadcastPayload) {
        // send() returns Err if there are no receivers; that's fine.
        let _ = self.sender.send(Arc::new(payload));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(event: &str, audience: Audience) -> BroadcastPayload {
        BroadcastPayload {
            audience,
            event: event.to_string(),
            data: serde_json::json!({}),
        }
    }

    #[test]
    fn audience_all_includes_everyone() {
        assert!(Audience::All.includes("conn_a"));
        assert!(Audience::All.includes("conn_b"));
    }

    #[test]
    fn audience_list_includes_only_listed_connections() {
        let audience = Audience::Connections(vec!["conn_a".to_string()]);
        assert!(audience.includes("conn_a"));
        assert!(!audience.includes("conn_b"));
    }

    #[test]
    fn dispatch_without_receivers_does_not_panic() {
        let hub = RelayBroadcast::new();
        hub.dispatch(payload("user-joined", Audience::All));
    }

    #[test]
    fn subscribers_observe_dispatch_order() {
        let hub = RelayBroadcast::new();
        let mut rx = hub.subscribe();

        hub.dispatch(payload("first", Audience::All));
        hub.dispatch(payload("second", Audience::All));

        assert_eq!(rx.try_recv().unwrap().event, "first");
        assert_eq!(rx.try_recv().unwrap().event, "second");
    }
}
