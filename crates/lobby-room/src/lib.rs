//! Room rules for the lobby.
//!
//! Everything in this crate is plain data plus pure transitions. The record
//! store owns a [`RoomTable`] and applies each transition under its own
//! lock, so the rules here never see a half-applied change.
//!
//! # Key types
//!
//! - [`Room`]: one named room: host, members, readiness, capacity
//! - [`RoomTable`]: every room, plus the create/join/leave/ready rules
//! - [`PendingInvitations`]: a user's outstanding invitations
//! - [`Departure`]: what happened to a room when someone left
//! - [`RoomError`]: why a transition was refused

mod error;
mod invitations;
mod room;
mod table;

pub use error::RoomError;
pub use invitations::PendingInvitations;
pub use lobby_protocol::RoomPhase;
pub use room::{DEFAULT_MAX_PLAYERS, Room};
pub use table::{Departure, INVITATION_SEAT_LIMIT, RoomTable};
