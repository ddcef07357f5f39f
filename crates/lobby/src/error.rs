//! Unified error type for the lobby.

use lobby_protocol::{ErrorKind, ProtocolError};
use lobby_room::RoomError;
use lobby_session::SessionError;
use lobby_store::StoreError;
use lobby_transport::TransportError;

use crate::{LaunchError, PackageError};

/// Top-level error that wraps all crate-specific errors, plus the rules
/// only the coordinator enforces.
///
/// The `#[from]` attribute on each wrapper variant generates a `From`
/// impl, so `?` converts sub-crate errors automatically. Every variant
/// maps to an [`ErrorKind`] and becomes a single error response.
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    /// A transport-level error (connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (not logged in, already bound, delivery).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room rule refused the change.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The record store refused or could not be reached.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A game package could not be read or installed.
    #[error(transparent)]
    Package(#[from] PackageError),

    /// The game server process could not be started.
    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error("room {room} has no game assigned")]
    NoGameAssigned { room: String },

    #[error("room {room} is already starting")]
    StartInProgress { room: String },

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("invalid request: {0}")]
    Invalid(String),
}

impl LobbyError {
    /// Classifies the error for an error response.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) => ErrorKind::Internal,
            Self::Protocol(e) => e.kind(),
            Self::Session(e) => e.kind(),
            Self::Room(e) => e.kind(),
            Self::Store(e) => e.kind(),
            Self::Package(e) => e.kind(),
            Self::Launch(_) => ErrorKind::Internal,
            Self::StartInProgress { .. } => ErrorKind::Conflict,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::NoGameAssigned { .. } => ErrorKind::PreconditionFailed,
            Self::Invalid(_) => ErrorKind::Invalid,
        }
    }
}
