//! Connection identity for the lobby.
//!
//! This crate answers two questions:
//!
//! 1. **Who is on this connection?**: a [`Session`] binds at most one
//!    authenticated user (and their role) to a connection.
//! 2. **Which connection reaches this user?**: the [`ConnectionRegistry`]
//!    maps a user's primary and listener channels to live connections so
//!    the coordinator can push notifications.
//!
//! # How it fits in the stack
//!
//! ```text
//! Coordinator (above)  ← binds sessions, pushes start notifications
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Transport Layer (below)  ← provides Connection, ConnectionId
//! ```

mod error;
mod registry;
mod session;

pub use error::SessionError;
pub use registry::{ConnectionRegistry, RegistryKey};
pub use session::Session;
