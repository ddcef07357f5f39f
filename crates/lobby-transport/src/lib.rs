//! Transport abstraction layer for the lobby.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! the network, plus the TCP implementation every lobby endpoint uses:
//! each message is a 4-byte big-endian length prefix followed by the body
//! (see [`frame`]). File transfers step outside the framing and move raw
//! bytes over the same socket.

mod error;
pub mod frame;
mod tcp;

pub use error::TransportError;
pub use frame::{MAX_FRAME_LEN, read_frame, write_frame};
pub use tcp::{TcpConnection, TcpTransport};

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;

    /// Waits for and accepts the next incoming connection.
    fn accept(
        &mut self,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;

    /// Returns the address the transport is listening on.
    fn local_addr(&self) -> Result<SocketAddr, TransportError>;
}

/// A single connection that carries framed messages.
///
/// Sending and receiving are independent: a task blocked in
/// [`recv`](Self::recv) does not stop another task from calling
/// [`send`](Self::send) on the same connection. The lobby relies on this
/// to push start notifications into a listener that is parked in its
/// receive loop.
pub trait Connection: Send + Sync + 'static {
    /// Sends one framed message to the remote peer.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next framed message from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;

    /// Closes the sending half of the connection.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
