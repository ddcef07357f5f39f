//! A single room: who is in it, who hosts it, who is ready.

use std::collections::BTreeMap;

use lobby_protocol::{DEFAULT_MIN_PLAYERS, RoomDetails, RoomListEntry, RoomPhase};
use serde::{Deserialize, Serialize};

use crate::RoomError;

/// Capacity of a room created without an explicit `max_players`.
pub const DEFAULT_MAX_PLAYERS: usize = 2;

/// One named room.
///
/// Invariants held by every [`RoomTable`](crate::RoomTable) transition:
/// - `members` is never empty (the room is deleted instead);
/// - `ready` has exactly one entry per member;
/// - `host` is a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    #[serde(rename = "room_name")]
    pub name: String,
    pub host: String,
    pub private: bool,
    pub game_id: Option<String>,
    pub max_players: usize,
    /// Whether the room takes new members. Recomputed from capacity on
    /// every join and forced to `true` after a departure.
    pub open: bool,
    /// Join order. The first member inherits the room when the host leaves.
    pub members: Vec<String>,
    pub ready: BTreeMap<String, bool>,
    /// Only `Forming` and `Live` are stored.
    pub phase: RoomPhase,
}

impl Room {
    /// Creates a room whose only member is `host`. Capacity is at least 1.
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        private: bool,
        game_id: Option<String>,
        max_players: usize,
    ) -> Self {
        let host = host.into();
        let mut room = Self {
            name: name.into(),
            host: host.clone(),
            private,
            game_id,
            max_players: max_players.max(1),
            open: false,
            members: vec![host.clone()],
            ready: BTreeMap::from([(host, false)]),
            phase: RoomPhase::Forming,
        };
        room.recompute_open();
        room
    }

    pub fn is_member(&self, user: &str) -> bool {
        self.members.iter().any(|m| m == user)
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= self.max_players
    }

    pub(crate) fn recompute_open(&mut self) {
        self.open = !self.is_full();
    }

    pub(crate) fn add_member(&mut self, user: &str) {
        self.members.push(user.to_string());
        self.ready.insert(user.to_string(), false);
        self.recompute_open();
        self.phase = RoomPhase::Forming;
    }

    /// Members whose ready flag is unset, in join order.
    pub fn unready_members(&self) -> Vec<String> {
        self.members
            .iter()
            .filter(|m| !self.ready.get(*m).copied().unwrap_or(false))
            .cloned()
            .collect()
    }

    /// Checks that `user` may start the game now: host, at least
    /// `min_players` members, everyone ready.
    pub fn check_start(&self, user: &str, min_players: usize) -> Result<(), RoomError> {
        if self.host != user {
            return Err(RoomError::NotHost { room: self.name.clone() });
        }
        if self.members.len() < min_players {
            return Err(RoomError::NotEnoughPlayers {
                required: min_players,
                current: self.members.len(),
            });
        }
        let players = self.unready_members();
        if !players.is_empty() {
            return Err(RoomError::PlayersNotReady { players });
        }
        Ok(())
    }

    /// The phase as seen by clients.
    ///
    /// A forming room with enough members who are all ready reports
    /// `Ready`; the stored phase never holds that value.
    pub fn effective_phase(&self) -> RoomPhase {
        match self.phase {
            RoomPhase::Forming
                if self.members.len() >= DEFAULT_MIN_PLAYERS
                    && self.unready_members().is_empty() =>
            {
                RoomPhase::Ready
            }
            phase => phase,
        }
    }

    /// Full view for `get_room_info`.
    pub fn details(&self) -> RoomDetails {
        RoomDetails {
            room_name: self.name.clone(),
            host: self.host.clone(),
            private: self.private,
            game_id: self.game_id.clone(),
            max_players: self.max_players,
            open: self.open,
            members: self.members.clone(),
            ready: self.ready.clone(),
            phase: self.effective_phase(),
        }
    }

    /// Listing view for `list_rooms`. `open` also accounts for capacity.
    pub fn summary(&self) -> RoomListEntry {
        RoomListEntry {
            name: self.name.clone(),
            host: self.host.clone(),
            open: self.open && !self.is_full(),
            private: self.private,
            players: self.members.len(),
            max_players: self.max_players,
            game_id: self.game_id.clone(),
        }
    }
}
