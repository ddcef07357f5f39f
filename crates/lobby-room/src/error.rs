//! Error types for the room layer.

use lobby_protocol::ErrorKind;
use serde::{Deserialize, Serialize};

/// Why a room transition was refused.
///
/// Serializable because the record store returns these to the lobby over
/// the wire unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RoomError {
    /// No room with this name exists.
    #[error("room {room} not found")]
    NotFound { room: String },

    /// A room with this name already exists.
    #[error("room {room} already exists")]
    AlreadyExists { room: String },

    /// No seats left.
    #[error("room {room} is full")]
    Full { room: String },

    /// The user is already a member of this room.
    #[error("{user} is already in room {room}")]
    AlreadyMember { user: String, room: String },

    /// The user is a member of a different room.
    #[error("{user} is already in another room ({room})")]
    AlreadyInRoom { user: String, room: String },

    /// The user is not a member of any room.
    #[error("{user} is not in a room")]
    NotInRoom { user: String },

    #[error("only the host of room {room} can start the game")]
    NotHost { room: String },

    #[error("not enough players: {required} required, {current} present")]
    NotEnoughPlayers { required: usize, current: usize },

    /// Members still unready, in join order.
    #[error("players not ready: {}", .players.join(", "))]
    PlayersNotReady { players: Vec<String> },
}

impl RoomError {
    /// Classifies the error for an error response.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyExists { .. }
            | Self::AlreadyMember { .. }
            | Self::AlreadyInRoom { .. } => ErrorKind::Conflict,
            Self::NotHost { .. } => ErrorKind::PermissionDenied,
            Self::Full { .. }
            | Self::NotInRoom { .. }
            | Self::NotEnoughPlayers { .. }
            | Self::PlayersNotReady { .. } => ErrorKind::PreconditionFailed,
        }
    }
}
