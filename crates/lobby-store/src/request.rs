//! Messages between the lobby and the record store.
//!
//! ```json
//! { "cmd": "join_room", "room_name": "r1", "user": "bob" }
//! { "status": "ok", "reply": { "type": "room", "data": { ... } } }
//! { "status": "error", "error": { "code": "room", "detail": { "reason": "full", "room": "r1" } } }
//! ```

use lobby_protocol::{GameRecord, Review, Role, RoomListEntry};
use lobby_room::{Departure, Room};
use serde::{Deserialize, Serialize};

use crate::{Account, StoreError};

/// One operation on the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum StoreRequest {
    // -- Accounts --
    CreateAccount {
        role: Role,
        username: String,
        password: String,
    },
    ReadAccount {
        role: Role,
        username: String,
    },
    SetOnline {
        role: Role,
        username: String,
        online: bool,
    },
    /// Checks the password and marks the account online, refusing an
    /// account that is already online.
    Login {
        role: Role,
        username: String,
        password: String,
    },
    /// Player accounts, optionally only those online.
    ListUsers {
        online_only: bool,
    },

    // -- Rooms --
    CreateRoom {
        room_name: String,
        host: String,
        private: bool,
        game_id: Option<String>,
        max_players: usize,
    },
    ListRooms,
    JoinRoom {
        room_name: String,
        user: String,
    },
    LeaveRoom {
        user: String,
    },
    UserRoom {
        user: String,
    },
    RoomInfo {
        room_name: String,
    },
    SetReady {
        user: String,
        ready: bool,
    },
    /// Re-checks host, head count and readiness, then marks the room live.
    StartRoom {
        room_name: String,
        host: String,
        min_players: usize,
    },

    // -- Invitations --
    Invite {
        user: String,
        room_name: String,
    },
    RespondInvitation {
        user: String,
        room_name: String,
        accept: bool,
    },
    Invitations {
        user: String,
    },
    ClearInvitations {
        user: String,
    },

    // -- Catalog --
    UpdateGame {
        record: GameRecord,
    },
    GameDetails {
        game_id: String,
    },
    ListGames,
    DeleteGame {
        game_id: String,
    },
    AddReview {
        game_id: String,
        review: Review,
    },
}

impl StoreRequest {
    /// Returns `true` for requests that never change state.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            Self::ReadAccount { .. }
                | Self::ListUsers { .. }
                | Self::ListRooms
                | Self::UserRoom { .. }
                | Self::RoomInfo { .. }
                | Self::Invitations { .. }
                | Self::GameDetails { .. }
                | Self::ListGames
        )
    }
}

/// A successful store answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StoreReply {
    Done,
    Account(Account),
    Users(Vec<String>),
    Room(Room),
    /// A room lookup that may come back empty.
    MaybeRoom(Option<Room>),
    Rooms(Vec<RoomListEntry>),
    Departure(Departure),
    Invitations(Vec<String>),
    Game(GameRecord),
    Games(Vec<GameRecord>),
}

impl StoreReply {
    /// The wire name of the reply, for error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::Account(_) => "account",
            Self::Users(_) => "users",
            Self::Room(_) => "room",
            Self::MaybeRoom(_) => "maybe_room",
            Self::Rooms(_) => "rooms",
            Self::Departure(_) => "departure",
            Self::Invitations(_) => "invitations",
            Self::Game(_) => "game",
            Self::Games(_) => "games",
        }
    }
}

/// The frame a [`StoreServer`](crate::StoreServer) sends back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StoreResponse {
    Ok { reply: StoreReply },
    Error { error: StoreError },
}

impl From<Result<StoreReply, StoreError>> for StoreResponse {
    fn from(result: Result<StoreReply, StoreError>) -> Self {
        match result {
            Ok(reply) => Self::Ok { reply },
            Err(error) => Self::Error { error },
        }
    }
}

impl From<StoreResponse> for Result<StoreReply, StoreError> {
    fn from(response: StoreResponse) -> Self {
        match response {
            StoreResponse::Ok { reply } => Ok(reply),
            StoreResponse::Error { error } => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lobby_room::RoomError;
    use serde_json::json;

    #[test]
    fn test_request_tagged_by_cmd() {
        let req = StoreRequest::JoinRoom {
            room_name: "r1".into(),
            user: "bob".into(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json, json!({"cmd": "join_room", "room_name": "r1", "user": "bob"}));
    }

    #[test]
    fn test_response_ok_shape() {
        let resp = StoreResponse::from(Ok::<_, StoreError>(StoreReply::Users(vec!["a".into()])));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            json,
            json!({"status": "ok", "reply": {"type": "users", "data": ["a"]}})
        );
    }

    #[test]
    fn test_response_error_decodes_back() {
        let err = StoreError::Room(RoomError::Full { room: "r1".into() });
        let bytes = serde_json::to_vec(&StoreResponse::from(Err::<StoreReply, _>(err.clone()))).unwrap();
        let resp: StoreResponse = serde_json::from_slice(&bytes).unwrap();
        let result: Result<StoreReply, StoreError> = resp.into();
        assert_eq!(result, Err(err));
    }

    #[test]
    fn test_maybe_room_none_keeps_data_key() {
        let json = serde_json::to_value(StoreReply::MaybeRoom(None)).unwrap();
        assert_eq!(json, json!({"type": "maybe_room", "data": null}));
    }

    #[test]
    fn test_read_only_classification() {
        assert!(StoreRequest::ListRooms.is_read_only());
        assert!(!StoreRequest::LeaveRoom { user: "a".into() }.is_read_only());
    }
}
