//! Wire protocol for the lobby.
//!
//! This crate defines the "language" that lobby clients and the lobby
//! server speak:
//!
//! - **Requests** ([`Request`]): one tagged variant per client command,
//!   selected by the `cmd` field.
//! - **Responses** ([`Response`]): `status` plus an optional `msg`, an
//!   [`ErrorKind`] on failures, and a command-specific [`ResponseBody`].
//! - **Notifications** ([`Notification`]): unsolicited pushes on a
//!   listener connection.
//! - **Catalog data** ([`GameManifest`], [`GameRecord`], [`Review`]).
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages are
//!   converted to/from frame bodies.
//!
//! ```text
//! Transport (frames) → Protocol (Request/Response) → Coordinator
//! ```

mod codec;
mod error;
mod game;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use game::{
    DEFAULT_MIN_PLAYERS, DEFAULT_VERSION, GameManifest, GameRecord, Review,
};
pub use types::{
    ErrorKind, Notification, Request, Response, ResponseBody, Role,
    RoomDetails, RoomListEntry, RoomPhase, Status, TRANSFER_READY,
};
