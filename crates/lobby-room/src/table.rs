//! The room table: every room and the rules for moving people between them.

use std::collections::BTreeMap;

use lobby_protocol::{RoomListEntry, RoomPhase};
use serde::{Deserialize, Serialize};

use crate::{Room, RoomError};

/// Seats an invitation can fill, whatever the room's own capacity.
///
/// Accepting an invitation succeeds only while the room holds fewer than
/// `min(INVITATION_SEAT_LIMIT, max_players)` members.
pub const INVITATION_SEAT_LIMIT: usize = 2;

/// What a `leave` did to the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Departure {
    pub room_name: String,
    /// The leaver was the last member and the room is gone.
    pub room_deleted: bool,
    /// Set when the host left and the room was handed to someone else.
    pub new_host: Option<String>,
}

/// All rooms, keyed by name.
///
/// A user is a member of at most one room. Every method either applies its
/// whole change or returns an error having changed nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomTable {
    rooms: BTreeMap<String, Room>,
}

impl RoomTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Room> {
        self.rooms.get(name)
    }

    /// The room `user` is a member of, if any.
    pub fn user_room(&self, user: &str) -> Option<&Room> {
        self.rooms.values().find(|room| room.is_member(user))
    }

    fn ensure_not_elsewhere(&self, user: &str, target: &str) -> Result<(), RoomError> {
        match self.user_room(user) {
            Some(room) if room.name == target => Err(RoomError::AlreadyMember {
                user: user.to_string(),
                room: target.to_string(),
            }),
            Some(room) => Err(RoomError::AlreadyInRoom {
                user: user.to_string(),
                room: room.name.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Creates a room with `host` as its only member.
    ///
    /// # Errors
    /// `AlreadyExists` if the name is taken, `AlreadyInRoom` if the host is
    /// a member of another room.
    pub fn create(
        &mut self,
        name: &str,
        host: &str,
        private: bool,
        game_id: Option<String>,
        max_players: usize,
    ) -> Result<&Room, RoomError> {
        if self.rooms.contains_key(name) {
            return Err(RoomError::AlreadyExists { room: name.to_string() });
        }
        if let Some(room) = self.user_room(host) {
            return Err(RoomError::AlreadyInRoom {
                user: host.to_string(),
                room: room.name.clone(),
            });
        }

        let room = Room::new(name, host, private, game_id, max_players);
        tracing::info!(room = %name, %host, max_players = room.max_players, "room created");
        Ok(self.rooms.entry(name.to_string()).or_insert(room))
    }

    /// Adds `user` to the room called `name`.
    ///
    /// # Errors
    /// Checked in order: `NotFound`, `Full`, `AlreadyMember`,
    /// `AlreadyInRoom`.
    pub fn join(&mut self, name: &str, user: &str) -> Result<&Room, RoomError> {
        let room = self
            .rooms
            .get(name)
            .ok_or_else(|| RoomError::NotFound { room: name.to_string() })?;
        if room.is_full() {
            return Err(RoomError::Full { room: name.to_string() });
        }
        self.ensure_not_elsewhere(user, name)?;

        self.admit(name, user)
    }

    /// Adds `user` to the room through an accepted invitation.
    ///
    /// Same checks as [`join`](Self::join), except that the seat limit is
    /// `min(INVITATION_SEAT_LIMIT, max_players)`.
    pub fn accept_invitation(
        &mut self,
        name: &str,
        user: &str,
    ) -> Result<&Room, RoomError> {
        let room = self
            .rooms
            .get(name)
            .ok_or_else(|| RoomError::NotFound { room: name.to_string() })?;
        let seats = INVITATION_SEAT_LIMIT.min(room.max_players);
        if room.members.len() >= seats {
            return Err(RoomError::Full { room: name.to_string() });
        }
        self.ensure_not_elsewhere(user, name)?;

        self.admit(name, user)
    }

    fn admit(&mut self, name: &str, user: &str) -> Result<&Room, RoomError> {
        let room = self
            .rooms
            .get_mut(name)
            .ok_or_else(|| RoomError::NotFound { room: name.to_string() })?;
        room.add_member(user);
        tracing::debug!(room = %name, %user, players = room.members.len(), "joined room");
        Ok(room)
    }

    /// Removes `user` from whatever room they are in.
    ///
    /// The room is deleted if it empties. Otherwise a departing host is
    /// replaced by the earliest remaining member, and the room reopens.
    pub fn leave(&mut self, user: &str) -> Result<Departure, RoomError> {
        let name = self
            .user_room(user)
            .map(|room| room.name.clone())
            .ok_or_else(|| RoomError::NotInRoom { user: user.to_string() })?;
        let room = self
            .rooms
            .get_mut(&name)
            .ok_or_else(|| RoomError::NotFound { room: name.clone() })?;

        room.members.retain(|m| m != user);
        room.ready.remove(user);

        if room.members.is_empty() {
            self.rooms.remove(&name);
            tracing::info!(room = %name, "room deleted");
            return Ok(Departure {
                room_name: name,
                room_deleted: true,
                new_host: None,
            });
        }

        let mut new_host = None;
        if room.host == user {
            room.host = room.members[0].clone();
            new_host = Some(room.host.clone());
            tracing::info!(room = %name, host = %room.host, "host reassigned");
        }
        room.open = true;
        room.phase = RoomPhase::Forming;

        Ok(Departure {
            room_name: name,
            room_deleted: false,
            new_host,
        })
    }

    /// Sets `user`'s ready flag in their current room.
    pub fn set_ready(&mut self, user: &str, ready: bool) -> Result<&Room, RoomError> {
        let room = self
            .rooms
            .values_mut()
            .find(|room| room.is_member(user))
            .ok_or_else(|| RoomError::NotInRoom { user: user.to_string() })?;
        room.ready.insert(user.to_string(), ready);
        Ok(room)
    }

    /// Re-checks the start conditions against the current room and marks
    /// it live, in one step.
    pub fn start(&mut self, name: &str, host: &str, min_players: usize) -> Result<&Room, RoomError> {
        let room = self
            .rooms
            .get_mut(name)
            .ok_or_else(|| RoomError::NotFound { room: name.to_string() })?;
        room.check_start(host, min_players)?;
        room.phase = RoomPhase::Live;
        tracing::info!(room = %name, players = room.members.len(), "room live");
        Ok(room)
    }

    /// Every room that is not private, in name order.
    pub fn list_public(&self) -> Vec<RoomListEntry> {
        self.rooms
            .values()
            .filter(|room| !room.private)
            .map(Room::summary)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with(name: &str, host: &str, max: usize) -> RoomTable {
        let mut table = RoomTable::new();
        table.create(name, host, false, None, max).unwrap();
        table
    }

    // =====================================================================
    // create
    // =====================================================================

    #[test]
    fn test_create_duplicate_name_already_exists() {
        let mut table = table_with("r1", "alice", 2);
        let err = table.create("r1", "bob", false, None, 2).unwrap_err();
        assert_eq!(err, RoomError::AlreadyExists { room: "r1".into() });
    }

    #[test]
    fn test_create_host_in_other_room_rejected() {
        let mut table = table_with("r1", "alice", 2);
        let err = table.create("r2", "alice", false, None, 2).unwrap_err();
        assert!(matches!(err, RoomError::AlreadyInRoom { .. }));
        assert!(table.get("r2").is_none());
    }

    // =====================================================================
    // join
    // =====================================================================

    #[test]
    fn test_join_fills_room_and_closes_it() {
        let mut table = table_with("r1", "alice", 2);
        let room = table.join("r1", "bob").unwrap();
        assert_eq!(room.members, vec!["alice", "bob"]);
        assert_eq!(room.ready.get("bob"), Some(&false));
        assert!(!room.open);
    }

    #[test]
    fn test_join_missing_room_not_found() {
        let mut table = RoomTable::new();
        let err = table.join("nope", "bob").unwrap_err();
        assert_eq!(err, RoomError::NotFound { room: "nope".into() });
    }

    #[test]
    fn test_join_full_room_rejected() {
        let mut table = table_with("r1", "alice", 2);
        table.join("r1", "bob").unwrap();
        let err = table.join("r1", "carol").unwrap_err();
        assert_eq!(err, RoomError::Full { room: "r1".into() });
    }

    #[test]
    fn test_join_same_room_twice_already_member() {
        let mut table = table_with("r1", "alice", 3);
        let err = table.join("r1", "alice").unwrap_err();
        assert!(matches!(err, RoomError::AlreadyMember { .. }));
    }

    #[test]
    fn test_join_while_in_other_room_rejected() {
        let mut table = table_with("r1", "alice", 3);
        table.create("r2", "bob", false, None, 3).unwrap();
        let err = table.join("r1", "bob").unwrap_err();
        assert_eq!(
            err,
            RoomError::AlreadyInRoom { user: "bob".into(), room: "r2".into() }
        );
    }

    #[test]
    fn test_join_resets_live_room_to_forming() {
        let mut table = table_with("r1", "alice", 3);
        table.set_ready("alice", true).unwrap();
        table.start("r1", "alice", 1).unwrap();
        let room = table.join("r1", "bob").unwrap();
        assert_eq!(room.phase, RoomPhase::Forming);
    }

    // =====================================================================
    // leave
    // =====================================================================

    #[test]
    fn test_leave_last_member_deletes_room() {
        let mut table = table_with("r1", "alice", 2);
        let departure = table.leave("alice").unwrap();
        assert!(departure.room_deleted);
        assert!(table.is_empty());
    }

    #[test]
    fn test_leave_host_hands_off_to_first_member() {
        let mut table = table_with("r1", "alice", 3);
        table.join("r1", "bob").unwrap();
        table.join("r1", "carol").unwrap();

        let departure = table.leave("alice").unwrap();
        assert_eq!(departure.new_host.as_deref(), Some("bob"));
        let room = table.get("r1").unwrap();
        assert_eq!(room.host, "bob");
        assert!(!room.ready.contains_key("alice"));
    }

    #[test]
    fn test_leave_reopens_room() {
        let mut table = table_with("r1", "alice", 2);
        table.join("r1", "bob").unwrap();
        let departure = table.leave("bob").unwrap();
        assert_eq!(departure.new_host, None);
        assert!(table.get("r1").unwrap().open);
    }

    #[test]
    fn test_leave_not_in_room_rejected() {
        let mut table = RoomTable::new();
        let err = table.leave("ghost").unwrap_err();
        assert_eq!(err, RoomError::NotInRoom { user: "ghost".into() });
    }

    // =====================================================================
    // ready, invitations, listing
    // =====================================================================

    #[test]
    fn test_set_ready_outside_room_rejected() {
        let mut table = RoomTable::new();
        assert!(matches!(
            table.set_ready("alice", true),
            Err(RoomError::NotInRoom { .. })
        ));
    }

    #[test]
    fn test_set_ready_updates_flag() {
        let mut table = table_with("r1", "alice", 2);
        let room = table.set_ready("alice", true).unwrap();
        assert_eq!(room.ready.get("alice"), Some(&true));
    }

    #[test]
    fn test_accept_invitation_capped_at_two_seats() {
        let mut table = table_with("big", "alice", 4);
        table.accept_invitation("big", "bob").unwrap();
        let err = table.accept_invitation("big", "carol").unwrap_err();
        assert_eq!(err, RoomError::Full { room: "big".into() });

        // A plain join still uses the room's own capacity.
        let room = table.join("big", "carol").unwrap();
        assert_eq!(room.members.len(), 3);
    }

    #[test]
    fn test_accept_invitation_recomputes_open_from_capacity() {
        let mut table = table_with("big", "alice", 4);
        let room = table.accept_invitation("big", "bob").unwrap();
        assert!(room.open);
    }

    #[test]
    fn test_accept_invitation_respects_smaller_capacity() {
        let mut table = table_with("solo", "alice", 1);
        assert!(matches!(
            table.accept_invitation("solo", "bob"),
            Err(RoomError::Full { .. })
        ));
    }

    #[test]
    fn test_list_public_skips_private_rooms() {
        let mut table = table_with("pub", "alice", 2);
        table.create("priv", "bob", true, None, 2).unwrap();
        let listed = table.list_public();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "pub");
        assert_eq!(listed[0].host, "alice");
    }
}
