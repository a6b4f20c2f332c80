//! Relay operations over the shared connection and room state.
//!
//! The WebSocket layer only touches the registry and room map through this
//! service, so the in-memory state could be swapped for a shared backing
//! store without changing call sites. All operations are non-blocking: the
//! only I/O in the hot path is the transport write performed by each
//! connection's own event loop.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;

use talents_common::MessageIdGenerator;

use super::events::EventName;
use super::fanout::{Audience, BroadcastPayload, RelayBroadcast};
use super::registry::ConnectionRegistry;
use super::rooms::RoomManager;

pub struct RelayService {
    registry: ConnectionRegistry,
    rooms: RoomManager,
    broadcast: RelayBroadcast,
    message_ids: MessageIdGenerator,
}

impl RelayService {
    pub fn new() -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            rooms: RoomManager::new(),
            broadcast: RelayBroadcast::new(),
            message_ids: MessageIdGenerator::new(),
        }
    }

    /// Subscribe to the outbound event stream. Each connection's event loop
    /// calls this once at handshake time, before any event of its own can
    /// be dispatched.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<BroadcastPayload>> {
        self.broadcast.subscribe()
    }

    /// Register a connection after a successful handshake.
    pub fn connect(&self, connection_id: &str, user_id: &str, user_name: &str) {
        self.registry.register(connection_id, user_id, user_name);
    }

    /// Tear down a connection: implicit leave plus registry removal.
    /// Safe to call for connections that never joined a room.
    pub fn disconnect(&self, connection_id: &str) {
        let Some(entry) = self.registry.remove(connection_id) else {
            return;
        };
        if let Some(room) = entry.room {
            self.rooms.remove_member(&room, connection_id);
            self.notify_left(&room, connection_id, &entry.user_id, &entry.user_name);
        }
    }

    /// Join a room, notifying its other members.
    ///
    /// The original relay let a second join silently overwrite the room
    /// association, leaving a ghost membership behind; here the old room is
    /// left explicitly, with the usual departure notification. A repeat
    /// join to the same room keeps membership idempotent but still
    /// re-notifies the other members.
    pub fn join(&self, connection_id: &str, room_id: &str) {
        let Some(entry) = self.registry.lookup(connection_id) else {
            tracing::debug!(%connection_id, "join from unregistered connection dropped");
            return;
        };

        if let Some(old_room) = &entry.room {
            if old_room != room_id {
                self.rooms.remove_member(old_room, connection_id);
                self.notify_left(old_room, connection_id, &entry.user_id, &entry.user_name);
            }
        }

        self.registry.assign_room(connection_id, room_id);
        self.rooms.add_member(room_id, connection_id);

        let others = self.other_members(room_id, connection_id);
        self.broadcast.dispatch(BroadcastPayload {
            audience: Audience::Connections(others),
            event: EventName::USER_JOINED.to_string(),
            data: serde_json::json!({
                "userId": entry.user_id,
                "userName": entry.user_name,
                "message": format!("{} joined the session", entry.user_name),
            }),
        });
    }

    /// Explicit leave without tearing down the connection. Silent no-op for
    /// connections that have no room.
    pub fn leave(&self, connection_id: &str) {
        let Some(entry) = self.registry.lookup(connection_id) else {
            return;
        };
        let Some(room) = self.registry.clear_room(connection_id) else {
            return;
        };
        self.rooms.remove_member(&room, connection_id);
        self.notify_left(&room, connection_id, &entry.user_id, &entry.user_name);
    }

    /// Forward a typing-state change to the other members of the room.
    /// No debouncing here; pacing is the client's job.
    pub fn set_typing(&self, connection_id: &str, is_typing: bool) {
        let Some(entry) = self.registry.lookup(connection_id) else {
            return;
        };
        let Some(room) = entry.room else {
            return;
        };

        let others = self.other_members(&room, connection_id);
        self.broadcast.dispatch(BroadcastPayload {
            audience: Audience::Connections(others),
            event: EventName::USER_TYPING.to_string(),
            data: serde_json::json!({
                "userId": entry.user_id,
                "userName": entry.user_name,
                "isTyping": is_typing,
            }),
        });
    }

    /// Relay a chat message to every member of the sender's room, sender
    /// included, since clients render their own echo rather than
    /// optimistically inserting the message.
    pub fn send_message(&self, connection_id: &str, content: &str) {
        let Some(entry) = self.registry.lookup(connection_id) else {
            tracing::debug!(%connection_id, "message from unregistered connection dropped");
            return;
        };
        let Some(room) = entry.room else {
            tracing::debug!(%connection_id, "message from roomless connection dropped");
            return;
        };

        let members = self.rooms.members_of(&room);
        self.broadcast.dispatch(BroadcastPayload {
            audience: Audience::Connections(members),
            event: EventName::RECEIVE_MESSAGE.to_string(),
            data: serde_json::json!({
                "id": self.message_ids.generate().to_string(),
                "sessionId": room,
                "userId": entry.user_id,
                "userName": entry.user_name,
                "content": content,
                "timestamp": chrono::Utc::now(),
            }),
        });
    }

    /// Global calendar invalidation: a newly created bookable session.
    /// Reaches every connected client regardless of room membership.
    pub fn announce_session_created(&self, connection_id: &str, session: Value) {
        let Some(entry) = self.registry.lookup(connection_id) else {
            tracing::debug!(%connection_id, "session announcement from unregistered connection dropped");
            return;
        };

        self.broadcast.dispatch(BroadcastPayload {
            audience: Audience::All,
            event: EventName::CALENDAR_UPDATED.to_string(),
            data: serde_json::json!({
                "session": session,
                "userId": entry.user_id,
                "message": "A new session was added to the calendar",
            }),
        });
    }

    /// Number of rooms currently holding members (bookkeeping).
    pub fn room_count(&self) -> usize {
        self.rooms.room_count()
    }

    fn other_members(&self, room_id: &str, connection_id: &str) -> Vec<String> {
        self.rooms
            .members_of(room_id)
            .into_iter()
            .filter(|member| member != connection_id)
            .collect()
    }

    fn notify_left(&self, room_id: &str, connection_id: &str, user_id: &str, user_name: &str) {
        let remaining = self.other_members(room_id, connection_id);
        self.broadcast.dispatch(BroadcastPayload {
            audience: Audience::Connections(remaining),
            event: EventName::USER_LEFT.to_string(),
            data: serde_json::json!({
                "userId": user_id,
                "userName": user_name,
                "message": format!("{user_name} left the session"),
            }),
        });
    }
}
