//! Lobby configuration.

use std::path::PathBuf;
use std::time::Duration;

use lobby_room::DEFAULT_MAX_PLAYERS;
use lobby_store::DEFAULT_STORE_TIMEOUT;

/// Port clients connect to.
pub const DEFAULT_LOBBY_PORT: u16 = 60001;
/// Port the record store listens on.
pub const DEFAULT_STORE_PORT: u16 = 10003;
/// Port announced to players for launched game servers.
pub const DEFAULT_GAME_PORT: u16 = 60002;

/// Settings for one lobby process.
///
/// `Default` gives a local setup; [`from_env`](Self::from_env) overlays
/// `LOBBY_*` environment variables on top of it.
#[derive(Debug, Clone)]
pub struct LobbyConfig {
    /// Address the lobby listens on.
    pub bind_addr: String,
    /// Address of the record store.
    pub store_addr: String,
    /// Per-attempt wait for a record store reply.
    pub store_timeout: Duration,
    /// Host players are told to connect to once a game starts.
    pub game_host: String,
    /// Port handed to launched game servers and announced to players.
    pub game_port: u16,
    /// Where installed games and uploaded packages live.
    pub games_dir: PathBuf,
    /// Program used to run a game's `server_entry` (for example
    /// `python3`). Without one the entry is executed directly.
    pub game_runner: Option<String>,
    /// Capacity of rooms created without `max_players`.
    pub default_max_players: usize,
    /// Largest accepted upload.
    pub max_package_bytes: u64,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{DEFAULT_LOBBY_PORT}"),
            store_addr: format!("127.0.0.1:{DEFAULT_STORE_PORT}"),
            store_timeout: DEFAULT_STORE_TIMEOUT,
            game_host: "127.0.0.1".to_string(),
            game_port: DEFAULT_GAME_PORT,
            games_dir: PathBuf::from("games_repo"),
            game_runner: None,
            default_max_players: DEFAULT_MAX_PLAYERS,
            max_package_bytes: 64 * 1024 * 1024,
        }
    }
}

impl LobbyConfig {
    /// Reads `LOBBY_BIND`, `LOBBY_STORE_ADDR`, `LOBBY_GAME_HOST`,
    /// `LOBBY_GAME_PORT`, `LOBBY_GAMES_DIR`, and `LOBBY_GAME_RUNNER`.
    /// Unset or unparsable values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(addr) = lookup("LOBBY_BIND") {
            config.bind_addr = addr;
        }
        if let Some(addr) = lookup("LOBBY_STORE_ADDR") {
            config.store_addr = addr;
        }
        if let Some(host) = lookup("LOBBY_GAME_HOST") {
            config.game_host = host;
        }
        if let Some(port) = lookup("LOBBY_GAME_PORT") {
            match port.parse() {
                Ok(port) => config.game_port = port,
                Err(e) => tracing::warn!(value = %port, error = %e, "ignoring LOBBY_GAME_PORT"),
            }
        }
        if let Some(dir) = lookup("LOBBY_GAMES_DIR") {
            config.games_dir = PathBuf::from(dir);
        }
        config.game_runner = lookup("LOBBY_GAME_RUNNER").filter(|r| !r.is_empty());
        config
    }
}
