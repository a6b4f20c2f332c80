//! Room membership tracking.
//!
//! Rooms are keyed by session document id, or by a synthesized
//! `tutor-{tutorId}-{userId}` key for ad-hoc tutor chats; the manager makes
//! no distinction.

use std::collections::HashSet;

use dashmap::DashMap;

/// Shared map of room id → member connection ids.
pub struct RoomManager {
    rooms: DashMap<String, HashSet<String>>,
}

impl RoomManager {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    /// Add a connection to a room, creating the room on first join.
    /// Idempotent; returns whether the member was newly added.
    pub fn add_member(&self, room_id: &str, connection_id: &str) -> bool {
        self.rooms
            .entry(room_id.to_string())
            .or_default()
            .insert(connection_id.to_string())
    }

    /// Remove a connection from a room. Idempotent. The room entry is
    /// dropped once its membership reaches zero so stale rooms never
    /// accumulate.
    pub fn remove_member(&self, room_id: &str, connection_id: &str) {
        let Some(mut members) = self.rooms.get_mut(room_id) else {
            return;
        };
        members.remove(connection_id);
        let empty = members.is_empty();
        drop(members);
        if empty {
            // Re-check under the shard lock in case a join slipped in.
            self.rooms.remove_if(room_id, |_, members| members.is_empty());
        }
    }

    /// Snapshot of the room's current members (empty if the room is
    /// unknown). Safe to iterate while concurrent joins/leaves mutate the
    /// underlying set.
    pub fn members_of(&self, room_id: &str) -> Vec<String> {
        self.rooms
            .get(room_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of rooms currently holding at least one member.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_member_is_idempotent() {
        let rooms = RoomManager::new();
        assert!(rooms.add_member("ses_1", "conn_a"));
        assert!(!rooms.add_member("ses_1", "conn_a"));
        assert_eq!(rooms.members_of("ses_1").len(), 1);
    }

    #[test]
    fn remove_absent_member_is_a_noop() {
        let rooms = RoomManager::new();
        rooms.remove_member("ses_1", "conn_a");
        rooms.add_member("ses_1", "conn_a");
        rooms.remove_member("ses_1", "conn_b");
        assert_eq!(rooms.members_of("ses_1"), vec!["conn_a".to_string()]);
    }

    #[test]
    fn empty_room_is_reclaimed() {
        let rooms = RoomManager::new();
        rooms.add_member("ses_1", "conn_a");
        rooms.add_member("ses_1", "conn_b");
        assert_eq!(rooms.room_count(), 1);

        rooms.remove_member("ses_1", "conn_a");
        assert_eq!(rooms.room_count(), 1);

        rooms.remove_member("ses_1", "conn_b");
        assert_eq!(rooms.room_count(), 0);
        assert!(rooms.members_of("ses_1").is_empty());
    }

    #[test]
    fn members_of_unknown_room_is_empty() {
        let rooms = RoomManager::new();
        assert!(rooms.members_of("ses_unknown").is_empty());
    }

    #[test]
    fn members_of_returns_a_snapshot() {
        let rooms = RoomManager::new();
        rooms.add_member("ses_1", "conn_a");

        let snapshot = rooms.members_of("ses_1");
        rooms.remove_member("ses_1", "conn_a");

        // The snapshot is unaffected by the later mutation.
        assert_eq!(snapshot, vec!["conn_a".to_string()]);
        assert!(rooms.members_of("ses_1").is_empty());
    }

    #[test]
    fn rooms_are_independent() {
        let rooms = RoomManager::new();
        rooms.add_member("ses_1", "conn_a");
        rooms.add_member("tutor-usr_1-usr_2", "conn_a");
        assert_eq!(rooms.room_count(), 2);

        rooms.remove_member("ses_1", "conn_a");
        assert_eq!(rooms.members_of("tutor-usr_1-usr_2").len(), 1);
    }
}
