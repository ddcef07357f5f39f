//! Core protocol types for the lobby's wire format.
//!
//! Every type here travels "on the wire": it gets serialized into a frame
//! body, sent over TCP, and deserialized on the other side.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::GameRecord;

/// Body of the frame a client sends to acknowledge a download header.
pub const TRANSFER_READY: &[u8] = b"READY";

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Which account table an identity belongs to.
///
/// Players and developers are registered separately; the same name may
/// exist in both tables.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Player,
    Developer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player => write!(f, "player"),
            Self::Developer => write!(f, "developer"),
        }
    }
}

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Coarse classification carried by every error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A room, user, invitation, or game does not exist.
    NotFound,
    /// Duplicate room name, already a member, already logged in.
    Conflict,
    /// Non-host start attempt, non-owner game deletion.
    PermissionDenied,
    /// Capacity, readiness, or player-count rule not met.
    PreconditionFailed,
    /// The record store could not be reached, even after a retry.
    UpstreamUnavailable,
    /// Malformed request body, manifest, or package.
    Invalid,
    /// Local I/O or process launch failure.
    Internal,
}

// ---------------------------------------------------------------------------
// RoomPhase
// ---------------------------------------------------------------------------

/// Where a room stands on its way to a running game.
///
/// ```text
/// Forming → Ready → Starting → Live
/// ```
///
/// - **Forming**: accepting players, or not everybody is ready yet.
/// - **Ready**: enough players, all of them ready.
/// - **Starting**: the host invoked `start_game` and validation is running.
/// - **Live**: the game server was launched and players were notified. The
///   room stays around as bookkeeping until its members leave.
///
/// Only `Forming` and `Live` are stored. `Ready` is derived from membership
/// and readiness, and `Starting` exists only inside the coordinator while a
/// start is in flight. Any membership change drops a room back to
/// `Forming`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RoomPhase {
    #[default]
    Forming,
    Ready,
    Starting,
    Live,
}

impl RoomPhase {
    /// Returns the phase that follows this one on the start path.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Forming => Some(Self::Ready),
            Self::Ready => Some(Self::Starting),
            Self::Starting => Some(Self::Live),
            Self::Live => None,
        }
    }

    /// Returns `true` if transitioning to `target` is a valid step.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }
}

impl fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forming => write!(f, "forming"),
            Self::Ready => write!(f, "ready"),
            Self::Starting => write!(f, "starting"),
            Self::Live => write!(f, "live"),
        }
    }
}

// ---------------------------------------------------------------------------
// Room views
// ---------------------------------------------------------------------------

/// A public room as shown by `list_rooms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomListEntry {
    pub name: String,
    pub host: String,
    /// `open` flag of the room AND not full.
    pub open: bool,
    pub private: bool,
    pub players: usize,
    pub max_players: usize,
    pub game_id: Option<String>,
}

/// The full state of one room, as returned by `get_room_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomDetails {
    pub room_name: String,
    pub host: String,
    pub private: bool,
    pub game_id: Option<String>,
    pub max_players: usize,
    pub open: bool,
    pub members: Vec<String>,
    pub ready: BTreeMap<String, bool>,
    pub phase: RoomPhase,
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A client command.
///
/// `#[serde(tag = "cmd")]` makes each variant an internally tagged object:
///   `{ "cmd": "join_room", "room_name": "lobby-1" }`
/// The whole frame is validated by serde before dispatch, so handlers
/// never probe for missing keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Request {
    // -- Accounts --
    Register {
        username: String,
        password: String,
        #[serde(default)]
        role: Role,
    },
    Login {
        username: String,
        password: String,
        #[serde(default)]
        role: Role,
    },
    Logout,
    /// List registered players, optionally only those online.
    List {
        #[serde(default)]
        online_only: bool,
    },

    // -- Rooms --
    CreateRoom {
        room_name: String,
        #[serde(default)]
        private: bool,
        #[serde(default)]
        game_id: Option<String>,
        /// Capacity; the lobby default applies when absent.
        #[serde(default)]
        max_players: Option<usize>,
    },
    ListRooms,
    JoinRoom {
        room_name: String,
    },
    LeaveRoom,
    /// Which room is `user` in? Defaults to the caller.
    GetUserRoom {
        #[serde(default)]
        user: Option<String>,
    },
    /// Full info on `user`'s room. Defaults to the caller.
    GetRoomInfo {
        #[serde(default)]
        user: Option<String>,
    },

    // -- Invitations --
    /// Who could I invite into my room?
    InvitePlayer,
    /// My pending invitations.
    ManageInvitations,
    Invite {
        user: String,
        room_name: String,
    },
    RespondInvitation {
        room_name: String,
        #[serde(default)]
        accept: bool,
    },

    // -- Game start --
    SetReady {
        ready: bool,
    },
    StartGame,

    // -- Game catalog --
    UploadGame {
        file_name: String,
        file_size: u64,
    },
    GetStoreList,
    DeleteGame {
        game_id: String,
    },
    DownloadGame {
        game_id: String,
    },
    GetGameDetails {
        game_id: String,
    },
    AddReview {
        game_id: String,
        rating: u8,
        #[serde(default)]
        comment: String,
    },

    // -- Connection --
    Exit,
    /// Promotes this connection into `user`'s notification channel.
    #[serde(rename = "_listener")]
    Listener {
        user: String,
    },
}

impl Request {
    /// The wire name of the command, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::Login { .. } => "login",
            Self::Logout => "logout",
            Self::List { .. } => "list",
            Self::CreateRoom { .. } => "create_room",
            Self::ListRooms => "list_rooms",
            Self::JoinRoom { .. } => "join_room",
            Self::LeaveRoom => "leave_room",
            Self::GetUserRoom { .. } => "get_user_room",
            Self::GetRoomInfo { .. } => "get_room_info",
            Self::InvitePlayer => "invite_player",
            Self::ManageInvitations => "manage_invitations",
            Self::Invite { .. } => "invite",
            Self::RespondInvitation { .. } => "respond_invitation",
            Self::SetReady { .. } => "set_ready",
            Self::StartGame => "start_game",
            Self::UploadGame { .. } => "upload_game",
            Self::GetStoreList => "get_store_list",
            Self::DeleteGame { .. } => "delete_game",
            Self::DownloadGame { .. } => "download_game",
            Self::GetGameDetails { .. } => "get_game_details",
            Self::AddReview { .. } => "add_review",
            Self::Exit => "exit",
            Self::Listener { .. } => "_listener",
        }
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// Outcome marker present on every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    Error,
}

/// Command-specific response fields, flattened next to `status`/`msg`.
///
/// Untagged: the variant is recognized by its field names. Variants with
/// overlapping fields are ordered most-specific first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Users {
        users: Vec<String>,
    },
    Rooms {
        rooms: Vec<RoomListEntry>,
    },
    RoomInfo {
        room_info: RoomDetails,
    },
    Invitable {
        available_users: Vec<String>,
        room_name: String,
    },
    Invitations {
        invitations: Vec<String>,
    },
    Games {
        games: Vec<GameRecord>,
    },
    Transfer {
        file_name: String,
        file_size: u64,
        game_info: GameRecord,
    },
    GameInfo {
        game_info: GameRecord,
    },
    UserRoom {
        /// Present as `null` when the user is in no room.
        #[serde(deserialize_with = "present_or_null")]
        room_name: Option<String>,
    },
}

/// Like the default `Option` impl, but a missing key is an error. Without
/// it every bare `{status, msg}` response would decode as `UserRoom`.
fn present_or_null<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)
}

/// A reply to one [`Request`].
///
/// ```json
/// { "status": "error", "msg": "room lobby-1 is full", "kind": "precondition_failed" }
/// { "status": "ok", "msg": "Room list", "rooms": [ ... ] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    #[serde(flatten)]
    pub body: Option<ResponseBody>,
}

impl Response {
    /// A successful reply with a human-readable message.
    pub fn ok(msg: impl Into<String>) -> Self {
        Self {
            status: Status::Ok,
            msg: Some(msg.into()),
            kind: None,
            body: None,
        }
    }

    /// A failed reply.
    pub fn error(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            msg: Some(msg.into()),
            kind: Some(kind),
            body: None,
        }
    }

    /// Attaches command-specific fields.
    pub fn with_body(mut self, body: ResponseBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Returns `true` for `status: ok`.
    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// Server → client pushes on a listener connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// The host started the room's game; connect to `game_host:game_port`.
    StartGame {
        game_host: String,
        game_port: u16,
        room_name: String,
        game_id: String,
        /// Members in join order.
        players: Vec<String>,
    },
}

// =========================================================================
// Tests
// =========================================================================
