//! Error types for the session layer.

use lobby_protocol::ErrorKind;
use lobby_transport::TransportError;

/// Errors about connection identity and registry delivery.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The command needs a logged-in user and this connection has none.
    #[error("not logged in")]
    NotLoggedIn,

    /// This connection is already bound to a user.
    #[error("connection is already logged in as {0}")]
    AlreadyBound(String),

    /// Nothing is registered under the key.
    #[error("no connection registered for {0}")]
    NotRegistered(String),

    /// The registered connection has already been dropped.
    #[error("connection for {0} is gone")]
    ConnectionGone(String),

    /// The connection exists but the write failed.
    #[error("send to {key} failed: {source}")]
    SendFailed {
        key: String,
        #[source]
        source: TransportError,
    },
}

impl SessionError {
    /// Classifies the error for an error response.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotLoggedIn => ErrorKind::PermissionDenied,
            Self::AlreadyBound(_) => ErrorKind::Conflict,
            Self::NotRegistered(_) | Self::ConnectionGone(_) => ErrorKind::NotFound,
            Self::SendFailed { .. } => ErrorKind::Internal,
        }
    }
}
