//! Error types for the record store.

use lobby_protocol::ErrorKind;
use lobby_room::RoomError;
use serde::{Deserialize, Serialize};

/// Errors returned by the record store.
///
/// These cross the wire between [`StoreServer`](crate::StoreServer) and
/// [`RemoteStore`](crate::RemoteStore), so every variant carries plain
/// data only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "code", content = "detail", rename_all = "snake_case")]
pub enum StoreError {
    /// A room rule refused the change.
    #[error(transparent)]
    Room(#[from] RoomError),

    #[error("user {0} already exists")]
    AccountExists(String),

    #[error("user {0} not found")]
    AccountNotFound(String),

    #[error("user {0} is already logged in")]
    AlreadyOnline(String),

    #[error("wrong password")]
    WrongPassword,

    #[error("no invitation to room {0}")]
    InvitationNotFound(String),

    #[error("game {0} not found")]
    GameNotFound(String),

    /// The store could not be reached within the retry budget.
    #[error("record store unavailable: {0}")]
    Unavailable(String),

    /// A frame between lobby and store could not be encoded or decoded.
    #[error("record store protocol error: {0}")]
    Protocol(String),

    /// The store answered with a reply of the wrong shape.
    #[error("unexpected record store reply: {0}")]
    UnexpectedReply(String),
}

impl StoreError {
    /// Classifies the error for an error response.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Room(e) => e.kind(),
            Self::AccountExists(_) | Self::AlreadyOnline(_) => ErrorKind::Conflict,
            Self::WrongPassword => ErrorKind::PermissionDenied,
            Self::AccountNotFound(_)
            | Self::InvitationNotFound(_)
            | Self::GameNotFound(_) => ErrorKind::NotFound,
            Self::Unavailable(_) => ErrorKind::UpstreamUnavailable,
            Self::Protocol(_) | Self::UnexpectedReply(_) => ErrorKind::Internal,
        }
    }
}
