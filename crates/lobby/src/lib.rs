//! # Lobby
//!
//! A game lobby server. Clients register and log in, browse and upload
//! games, form rooms, mark themselves ready, and are handed off to a game
//! server process launched for their room.
//!
//! The crates underneath each own one layer:
//!
//! ```text
//! lobby-transport  framed TCP, raw transfers
//! lobby-protocol   Request / Response / Notification, GameManifest
//! lobby-session    Session binding, ConnectionRegistry
//! lobby-room       RoomTable rules, invitations
//! lobby-store      RecordStore: MemoryStore, RemoteStore, StoreServer
//! ```
//!
//! This crate ties them together: the [`Coordinator`] runs every command,
//! the per-connection handler speaks the wire protocol, and
//! [`LobbyServer`] accepts connections.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lobby::prelude::*;
//!
//! # async fn run() -> Result<(), LobbyError> {
//! let config = LobbyConfig::from_env();
//! let store = RemoteStore::new(config.store_addr.clone()).with_timeout(config.store_timeout);
//! let server = LobbyServer::builder().config(config).build(store).await?;
//! server.run().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod coordinator;
mod error;
mod games;
mod handler;
mod launcher;
mod server;

pub use config::LobbyConfig;
pub use coordinator::Coordinator;
pub use error::LobbyError;
pub use games::{GameRepository, MANIFEST_FILE, PackageError, package_manifest};
pub use launcher::{GameLauncher, LaunchError, LaunchSpec, ProcessLauncher};
pub use server::{LobbyServer, LobbyServerBuilder};

/// The types most binaries and tests need.
pub mod prelude {
    pub use crate::{
        Coordinator, GameLauncher, GameRepository, LaunchSpec, LobbyConfig,
        LobbyError, LobbyServer, LobbyServerBuilder, ProcessLauncher,
    };
    pub use lobby_protocol::{
        ErrorKind, GameManifest, GameRecord, Notification, Request, Response,
        ResponseBody, Role,
    };
    pub use lobby_store::{MemoryStore, RecordStore, RemoteStore, StoreServer};
}
