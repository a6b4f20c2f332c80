//! Connection registry mapping live connections to their user and room.

use dashmap::DashMap;

/// Association held for one live connection.
///
/// Identity is fixed at handshake time from the verified token; only the
/// room assignment changes over the connection's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEntry {
    pub user_id: String,
    pub user_name: String,
    /// Room the connection is currently joined to, `None` until a join.
    pub room: Option<String>,
}

/// Shared registry of all live relay connections.
///
/// Uses `DashMap` for shard-level concurrency. Entries are owned exclusively
/// by the registry; callers read them out as snapshots and never hold a
/// reference across operations.
pub struct ConnectionRegistry {
    conns: DashMap<String, ConnectionEntry>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            conns: DashMap::new(),
        }
    }

    /// Register a new connection after a successful handshake. No room yet.
    pub fn register(&self, connection_id: &str, user_id: &str, user_name: &str) {
        self.conns.insert(
            connection_id.to_string(),
            ConnectionEntry {
                user_id: user_id.to_string(),
                user_name: user_name.to_string(),
                room: None,
            },
        );
    }

    /// Point the connection at a room, returning the previously assigned
    /// room if any. Unknown connections are left untouched.
    pub fn assign_room(&self, connection_id: &str, room_id: &str) -> Option<String> {
        let mut entry = self.conns.get_mut(connection_id)?;
        entry.room.replace(room_id.to_string())
    }

    /// Clear the room association, returning the room that was cleared.
    pub fn clear_room(&self, connection_id: &str) -> Option<String> {
        let mut entry = self.conns.get_mut(connection_id)?;
        entry.room.take()
    }

    /// Remove the connection, returning its last known association.
    /// Removing an absent connection is a no-op.
    pub fn remove(&self, connection_id: &str) -> Option<ConnectionEntry> {
        self.conns.remove(connection_id).map(|(_, entry)| entry)
    }

    /// Snapshot of the connection's current association, `None` if unknown.
    /// Callers treat "unknown" as a normal case (e.g. an event racing a
    /// disconnect), never an error.
    pub fn lookup(&self, connection_id: &str) -> Option<ConnectionEntry> {
        self.conns.get(connection_id).map(|entry| entry.clone())
    }
}
