//! Typed access to a record store.

use lobby_protocol::{GameRecord, Review, Role, RoomListEntry};
use lobby_room::{Departure, Room};

use crate::{Account, RecordStore, StoreError, StoreReply, StoreRequest};

/// Wraps a [`RecordStore`] with one method per request, each returning
/// the reply's payload.
pub struct StoreClient<S> {
    store: S,
}

fn unexpected(wanted: &str, reply: &StoreReply) -> StoreError {
    StoreError::UnexpectedReply(format!("wanted {wanted}, got {}", reply.name()))
}

impl<S: RecordStore> StoreClient<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.store
    }

    async fn done(&self, request: StoreRequest) -> Result<(), StoreError> {
        match self.store.call(request).await? {
            StoreReply::Done => Ok(()),
            other => Err(unexpected("done", &other)),
        }
    }

    async fn room(&self, request: StoreRequest) -> Result<Room, StoreError> {
        match self.store.call(request).await? {
            StoreReply::Room(room) => Ok(room),
            other => Err(unexpected("room", &other)),
        }
    }

    async fn maybe_room(&self, request: StoreRequest) -> Result<Option<Room>, StoreError> {
        match self.store.call(request).await? {
            StoreReply::MaybeRoom(room) => Ok(room),
            other => Err(unexpected("maybe_room", &other)),
        }
    }

    // -- Accounts --

    pub async fn create_account(
        &self,
        role: Role,
        username: &str,
        password: &str,
    ) -> Result<(), StoreError> {
        self.done(StoreRequest::CreateAccount {
            role,
            username: username.to_string(),
            password: password.to_string(),
        })
        .await
    }

    pub async fn read_account(&self, role: Role, username: &str) -> Result<Account, StoreError> {
        let request = StoreRequest::ReadAccount {
            role,
            username: username.to_string(),
        };
        match self.store.call(request).await? {
            StoreReply::Account(account) => Ok(account),
            other => Err(unexpected("account", &other)),
        }
    }

    /// Checks the password and marks the account online in one store step,
    /// so two logins racing for the same account cannot both succeed.
    pub async fn login(&self, role: Role, username: &str, password: &str) -> Result<(), StoreError> {
        self.done(StoreRequest::Login {
            role,
            username: username.to_string(),
            password: password.to_string(),
        })
        .await
    }

    pub async fn set_online(
        &self,
        role: Role,
        username: &str,
        online: bool,
    ) -> Result<(), StoreError> {
        self.done(StoreRequest::SetOnline {
            role,
            username: username.to_string(),
            online,
        })
        .await
    }

    pub async fn list_users(&self, online_only: bool) -> Result<Vec<String>, StoreError> {
        match self.store.call(StoreRequest::ListUsers { online_only }).await? {
            StoreReply::Users(users) => Ok(users),
            other => Err(unexpected("users", &other)),
        }
    }

    // -- Rooms --

    pub async fn create_room(
        &self,
        room_name: &str,
        host: &str,
        private: bool,
        game_id: Option<String>,
        max_players: usize,
    ) -> Result<Room, StoreError> {
        self.room(StoreRequest::CreateRoom {
            room_name: room_name.to_string(),
            host: host.to_string(),
            private,
            game_id,
            max_players,
        })
        .await
    }

    pub async fn list_rooms(&self) -> Result<Vec<RoomListEntry>, StoreError> {
        match self.store.call(StoreRequest::ListRooms).await? {
            StoreReply::Rooms(rooms) => Ok(rooms),
            other => Err(unexpected("rooms", &other)),
        }
    }

    pub async fn join_room(&self, room_name: &str, user: &str) -> Result<Room, StoreError> {
        self.room(StoreRequest::JoinRoom {
            room_name: room_name.to_string(),
            user: user.to_string(),
        })
        .await
    }

    pub async fn leave_room(&self, user: &str) -> Result<Departure, StoreError> {
        let request = StoreRequest::LeaveRoom { user: user.to_string() };
        match self.store.call(request).await? {
            StoreReply::Departure(departure) => Ok(departure),
            other => Err(unexpected("departure", &other)),
        }
    }

    pub async fn user_room(&self, user: &str) -> Result<Option<Room>, StoreError> {
        self.maybe_room(StoreRequest::UserRoom { user: user.to_string() })
            .await
    }

    pub async fn room_info(&self, room_name: &str) -> Result<Room, StoreError> {
        self.room(StoreRequest::RoomInfo { room_name: room_name.to_string() })
            .await
    }

    pub async fn set_ready(&self, user: &str, ready: bool) -> Result<Room, StoreError> {
        self.room(StoreRequest::SetReady { user: user.to_string(), ready })
            .await
    }

    /// Marks the room live if `host` still hosts it and the room still
    /// meets the start conditions. Returns the room as it was started.
    pub async fn start_room(
        &self,
        room_name: &str,
        host: &str,
        min_players: usize,
    ) -> Result<Room, StoreError> {
        self.room(StoreRequest::StartRoom {
            room_name: room_name.to_string(),
            host: host.to_string(),
            min_players,
        })
        .await
    }

    // -- Invitations --

    pub async fn invite(&self, user: &str, room_name: &str) -> Result<(), StoreError> {
        self.done(StoreRequest::Invite {
            user: user.to_string(),
            room_name: room_name.to_string(),
        })
        .await
    }

    /// Consumes the invitation; returns the joined room when accepted.
    pub async fn respond_invitation(
        &self,
        user: &str,
        room_name: &str,
        accept: bool,
    ) -> Result<Option<Room>, StoreError> {
        self.maybe_room(StoreRequest::RespondInvitation {
            user: user.to_string(),
            room_name: room_name.to_string(),
            accept,
        })
        .await
    }

    pub async fn invitations(&self, user: &str) -> Result<Vec<String>, StoreError> {
        let request = StoreRequest::Invitations { user: user.to_string() };
        match self.store.call(request).await? {
            StoreReply::Invitations(rooms) => Ok(rooms),
            other => Err(unexpected("invitations", &other)),
        }
    }

    pub async fn clear_invitations(&self, user: &str) -> Result<(), StoreError> {
        self.done(StoreRequest::ClearInvitations { user: user.to_string() })
            .await
    }

    // -- Catalog --

    pub async fn update_game(&self, record: GameRecord) -> Result<(), StoreError> {
        self.done(StoreRequest::UpdateGame { record }).await
    }

    pub async fn game_details(&self, game_id: &str) -> Result<GameRecord, StoreError> {
        let request = StoreRequest::GameDetails { game_id: game_id.to_string() };
        match self.store.call(request).await? {
            StoreReply::Game(record) => Ok(record),
            other => Err(unexpected("game", &other)),
        }
    }

    pub async fn list_games(&self) -> Result<Vec<GameRecord>, StoreError> {
        match self.store.call(StoreRequest::ListGames).await? {
            StoreReply::Games(games) => Ok(games),
            other => Err(unexpected("games", &other)),
        }
    }

    pub async fn delete_game(&self, game_id: &str) -> Result<(), StoreError> {
        self.done(StoreRequest::DeleteGame { game_id: game_id.to_string() })
            .await
    }

    pub async fn add_review(&self, game_id: &str, review: Review) -> Result<GameRecord, StoreError> {
        let request = StoreRequest::AddReview {
            game_id: game_id.to_string(),
            review,
        };
        match self.store.call(request).await? {
            StoreReply::Game(record) => Ok(record),
            other => Err(unexpected("game", &other)),
        }
    }
}
