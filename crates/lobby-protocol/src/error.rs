//! Error types for the protocol layer.
//!
//! Each crate in the lobby defines its own error enum. When you see a
//! `ProtocolError`, the problem is in serialization or message shape, not
//! in networking or room management.

use crate::ErrorKind;

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, an unknown `cmd`, missing
    /// required fields, or wrong field types.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded but breaks a protocol rule.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

impl ProtocolError {
    /// Classifies the error for an error response.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Encode(_) => ErrorKind::Internal,
            Self::Decode(_) | Self::InvalidMessage(_) => ErrorKind::Invalid,
        }
    }
}
