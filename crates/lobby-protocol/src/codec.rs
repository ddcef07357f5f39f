//! Codec trait and implementations for serializing/deserializing messages.
//!
//! A "codec" converts between Rust types and frame bodies. The handler
//! doesn't care HOW messages are serialized; it just needs something that
//! implements [`Codec`]. [`JsonCodec`] is the only implementation and the
//! one every lobby endpoint speaks.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because one codec value is shared by every
/// connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or don't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use lobby_protocol::{Codec, JsonCodec, Request};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&Request::ListRooms).unwrap();
/// assert_eq!(bytes, br#"{"cmd":"list_rooms"}"#);
///
/// let decoded: Request = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded, Request::ListRooms);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
