//! The store's data and the single function that changes it.

use std::collections::BTreeMap;

use lobby_protocol::{GameRecord, Role};
use lobby_room::{PendingInvitations, RoomError, RoomTable};
use serde::{Deserialize, Serialize};

use crate::{StoreError, StoreReply, StoreRequest};

/// One registered identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub password: String,
    #[serde(default)]
    pub online: bool,
    /// Rooms this user has been invited to. Only players receive invites.
    #[serde(default)]
    pub invitations: PendingInvitations,
}

impl Account {
    fn new(password: String) -> Self {
        Self {
            password,
            online: false,
            invitations: PendingInvitations::new(),
        }
    }
}

/// Everything the record store knows.
///
/// Plain data: [`apply`](Self::apply) is the only way requests change it,
/// and callers provide the locking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default)]
    players: BTreeMap<String, Account>,
    #[serde(default)]
    developers: BTreeMap<String, Account>,
    #[serde(default)]
    rooms: RoomTable,
    #[serde(default)]
    games: BTreeMap<String, GameRecord>,
}

impl StoreState {
    pub fn new() -> Self {
        Self::default()
    }

    fn accounts(&self, role: Role) -> &BTreeMap<String, Account> {
        match role {
            Role::Player => &self.players,
            Role::Developer => &self.developers,
        }
    }

    fn accounts_mut(&mut self, role: Role) -> &mut BTreeMap<String, Account> {
        match role {
            Role::Player => &mut self.players,
            Role::Developer => &mut self.developers,
        }
    }

    fn account_mut(&mut self, role: Role, username: &str) -> Result<&mut Account, StoreError> {
        self.accounts_mut(role)
            .get_mut(username)
            .ok_or_else(|| StoreError::AccountNotFound(username.to_string()))
    }

    pub fn rooms(&self) -> &RoomTable {
        &self.rooms
    }

    /// Drops everything tied to live connections: presence, rooms, and
    /// invitations. Called when a snapshot is loaded at startup, since no
    /// connection survives a restart.
    pub fn reset_presence(&mut self) {
        for account in self.players.values_mut().chain(self.developers.values_mut()) {
            account.online = false;
            account.invitations.clear();
        }
        self.rooms = RoomTable::new();
    }

    /// Applies one request. On error nothing has changed.
    pub fn apply(&mut self, request: StoreRequest) -> Result<StoreReply, StoreError> {
        match request {
            // -- Accounts --
            StoreRequest::CreateAccount { role, username, password } => {
                let accounts = self.accounts_mut(role);
                if accounts.contains_key(&username) {
                    return Err(StoreError::AccountExists(username));
                }
                accounts.insert(username, Account::new(password));
                Ok(StoreReply::Done)
            }
            StoreRequest::ReadAccount { role, username } => self
                .accounts(role)
                .get(&username)
                .cloned()
                .map(StoreReply::Account)
                .ok_or(StoreError::AccountNotFound(username)),
            StoreRequest::SetOnline { role, username, online } => {
                self.account_mut(role, &username)?.online = online;
                Ok(StoreReply::Done)
            }
            StoreRequest::Login { role, username, password } => {
                let account = self.account_mut(role, &username)?;
                if account.online {
                    return Err(StoreError::AlreadyOnline(username));
                }
                if account.password != password {
                    return Err(StoreError::WrongPassword);
                }
                account.online = true;
                Ok(StoreReply::Done)
            }
            StoreRequest::ListUsers { online_only } => Ok(StoreReply::Users(
                self.players
                    .iter()
                    .filter(|(_, account)| !online_only || account.online)
                    .map(|(name, _)| name.clone())
                    .collect(),
            )),

            // -- Rooms --
            StoreRequest::CreateRoom {
                room_name,
                host,
                private,
                game_id,
                max_players,
            } => {
                let room = self
                    .rooms
                    .create(&room_name, &host, private, game_id, max_players)?;
                Ok(StoreReply::Room(room.clone()))
            }
            StoreRequest::ListRooms => Ok(StoreReply::Rooms(self.rooms.list_public())),
            StoreRequest::JoinRoom { room_name, user } => {
                let room = self.rooms.join(&room_name, &user)?;
                Ok(StoreReply::Room(room.clone()))
            }
            StoreRequest::LeaveRoom { user } => {
                Ok(StoreReply::Departure(self.rooms.leave(&user)?))
            }
            StoreRequest::UserRoom { user } => {
                Ok(StoreReply::MaybeRoom(self.rooms.user_room(&user).cloned()))
            }
            StoreRequest::RoomInfo { room_name } => self
                .rooms
                .get(&room_name)
                .cloned()
                .map(StoreReply::Room)
                .ok_or_else(|| RoomError::NotFound { room: room_name }.into()),
            StoreRequest::SetReady { user, ready } => {
                let room = self.rooms.set_ready(&user, ready)?;
                Ok(StoreReply::Room(room.clone()))
            }
            StoreRequest::StartRoom { room_name, host, min_players } => {
                let room = self.rooms.start(&room_name, &host, min_players)?;
                Ok(StoreReply::Room(room.clone()))
            }

            // -- Invitations --
            StoreRequest::Invite { user, room_name } => {
                if self.rooms.get(&room_name).is_none() {
                    return Err(RoomError::NotFound { room: room_name }.into());
                }
                self.account_mut(Role::Player, &user)?
                    .invitations
                    .offer(&room_name);
                Ok(StoreReply::Done)
            }
            StoreRequest::RespondInvitation { user, room_name, accept } => {
                let account = self.account_mut(Role::Player, &user)?;
                if !account.invitations.consume(&room_name) {
                    return Err(StoreError::InvitationNotFound(room_name));
                }
                if !accept {
                    return Ok(StoreReply::MaybeRoom(None));
                }
                // The invitation stays consumed even if the room refuses.
                let room = self.rooms.accept_invitation(&room_name, &user)?;
                Ok(StoreReply::MaybeRoom(Some(room.clone())))
            }
            StoreRequest::Invitations { user } => {
                let account = self
                    .players
                    .get(&user)
                    .ok_or(StoreError::AccountNotFound(user))?;
                Ok(StoreReply::Invitations(account.invitations.rooms().to_vec()))
            }
            StoreRequest::ClearInvitations { user } => {
                self.account_mut(Role::Player, &user)?.invitations.clear();
                Ok(StoreReply::Done)
            }

            // -- Catalog --
            StoreRequest::UpdateGame { mut record } => {
                let game_id = record.game_id().to_string();
                if let Some(existing) = self.games.get_mut(&game_id) {
                    record.reviews = std::mem::take(&mut existing.reviews);
                }
                self.games.insert(game_id, record);
                Ok(StoreReply::Done)
            }
            StoreRequest::GameDetails { game_id } => self
                .games
                .get(&game_id)
                .cloned()
                .map(StoreReply::Game)
                .ok_or(StoreError::GameNotFound(game_id)),
            StoreRequest::ListGames => {
                Ok(StoreReply::Games(self.games.values().cloned().collect()))
            }
            StoreRequest::DeleteGame { game_id } => match self.games.remove(&game_id) {
                Some(_) => Ok(StoreReply::Done),
                None => Err(StoreError::GameNotFound(game_id)),
            },
            StoreRequest::AddReview { game_id, review } => {
                let record = self
                    .games
                    .get_mut(&game_id)
                    .ok_or(StoreError::GameNotFound(game_id))?;
                record.upsert_review(review);
                Ok(StoreReply::Game(record.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use lobby_protocol::{GameManifest, Review};
    use serde_json::json;

    use super::*;

    fn player(state: &mut StoreState, name: &str) {
        state
            .apply(StoreRequest::CreateAccount {
                role: Role::Player,
                username: name.into(),
                password: "pw".into(),
            })
            .unwrap();
    }

    fn create_room(state: &mut StoreState, room: &str, host: &str, max: usize) {
        state
            .apply(StoreRequest::CreateRoom {
                room_name: room.into(),
                host: host.into(),
                private: false,
                game_id: None,
                max_players: max,
            })
            .unwrap();
    }

    fn record(game_id: &str, uploader: &str) -> GameRecord {
        let manifest: GameManifest = serde_json::from_value(json!({
            "game_id": game_id, "server_entry": "server.py"
        }))
        .unwrap();
        GameRecord {
            manifest,
            file_name: format!("{game_id}.zip"),
            file_size: 10,
            uploader: uploader.into(),
            reviews: vec![],
        }
    }

    // =====================================================================
    // Accounts
    // =====================================================================

    #[test]
    fn test_create_account_duplicate_rejected() {
        let mut state = StoreState::new();
        player(&mut state, "alice");
        let err = state
            .apply(StoreRequest::CreateAccount {
                role: Role::Player,
                username: "alice".into(),
                password: "x".into(),
            })
            .unwrap_err();
        assert_eq!(err, StoreError::AccountExists("alice".into()));
    }

    #[test]
    fn test_roles_have_separate_tables() {
        let mut state = StoreState::new();
        player(&mut state, "alice");
        state
            .apply(StoreRequest::CreateAccount {
                role: Role::Developer,
                username: "alice".into(),
                password: "dev".into(),
            })
            .unwrap();

        let reply = state
            .apply(StoreRequest::ReadAccount {
                role: Role::Developer,
                username: "alice".into(),
            })
            .unwrap();
        assert!(matches!(reply, StoreReply::Account(a) if a.password == "dev"));
    }

    #[test]
    fn test_list_users_online_only() {
        let mut state = StoreState::new();
        player(&mut state, "alice");
        player(&mut state, "bob");
        state
            .apply(StoreRequest::SetOnline {
                role: Role::Player,
                username: "bob".into(),
                online: true,
            })
            .unwrap();

        let all = state.apply(StoreRequest::ListUsers { online_only: false }).unwrap();
        assert_eq!(all, StoreReply::Users(vec!["alice".into(), "bob".into()]));
        let online = state.apply(StoreRequest::ListUsers { online_only: true }).unwrap();
        assert_eq!(online, StoreReply::Users(vec!["bob".into()]));
    }

    #[test]
    fn test_set_online_unknown_user_not_found() {
        let mut state = StoreState::new();
        let err = state
            .apply(StoreRequest::SetOnline {
                role: Role::Player,
                username: "ghost".into(),
                online: true,
            })
            .unwrap_err();
        assert_eq!(err.kind(), lobby_protocol::ErrorKind::NotFound);
    }

    fn login(state: &mut StoreState, name: &str, password: &str) -> Result<StoreReply, StoreError> {
        state.apply(StoreRequest::Login {
            role: Role::Player,
            username: name.into(),
            password: password.into(),
        })
    }

    #[test]
    fn test_login_marks_online_and_refuses_second() {
        let mut state = StoreState::new();
        player(&mut state, "alice");

        assert_eq!(login(&mut state, "alice", "pw").unwrap(), StoreReply::Done);
        let online = state.apply(StoreRequest::ListUsers { online_only: true }).unwrap();
        assert_eq!(online, StoreReply::Users(vec!["alice".into()]));

        let err = login(&mut state, "alice", "pw").unwrap_err();
        assert_eq!(err, StoreError::AlreadyOnline("alice".into()));
        assert_eq!(err.kind(), lobby_protocol::ErrorKind::Conflict);
    }

    #[test]
    fn test_login_wrong_password_stays_offline() {
        let mut state = StoreState::new();
        player(&mut state, "alice");

        let err = login(&mut state, "alice", "nope").unwrap_err();
        assert_eq!(err, StoreError::WrongPassword);
        assert_eq!(err.kind(), lobby_protocol::ErrorKind::PermissionDenied);
        let online = state.apply(StoreRequest::ListUsers { online_only: true }).unwrap();
        assert_eq!(online, StoreReply::Users(vec![]));

        let err = login(&mut state, "ghost", "pw").unwrap_err();
        assert_eq!(err, StoreError::AccountNotFound("ghost".into()));
    }

    // =====================================================================
    // Rooms
    // =====================================================================

    fn ready(state: &mut StoreState, user: &str, ready: bool) {
        state
            .apply(StoreRequest::SetReady { user: user.into(), ready })
            .unwrap();
    }

    fn start(state: &mut StoreState, host: &str) -> Result<StoreReply, StoreError> {
        state.apply(StoreRequest::StartRoom {
            room_name: "r1".into(),
            host: host.into(),
            min_players: 2,
        })
    }

    #[test]
    fn test_start_room_rechecks_current_state() {
        let mut state = StoreState::new();
        player(&mut state, "alice");
        player(&mut state, "bob");
        create_room(&mut state, "r1", "alice", 2);
        state
            .apply(StoreRequest::JoinRoom { room_name: "r1".into(), user: "bob".into() })
            .unwrap();
        ready(&mut state, "alice", true);
        ready(&mut state, "bob", true);
        ready(&mut state, "bob", false);

        let err = start(&mut state, "alice").unwrap_err();
        assert_eq!(
            err,
            StoreError::Room(RoomError::PlayersNotReady { players: vec!["bob".into()] })
        );
        assert_eq!(err.to_string(), "players not ready: bob");

        let err = start(&mut state, "bob").unwrap_err();
        assert_eq!(err.kind(), lobby_protocol::ErrorKind::PermissionDenied);

        state.apply(StoreRequest::LeaveRoom { user: "bob".into() }).unwrap();
        let err = start(&mut state, "alice").unwrap_err();
        assert_eq!(err.to_string(), "not enough players: 2 required, 1 present");
        assert_ne!(
            state.rooms().get("r1").unwrap().phase,
            lobby_protocol::RoomPhase::Live
        );
    }

    #[test]
    fn test_start_room_returns_current_members_live() {
        let mut state = StoreState::new();
        player(&mut state, "alice");
        player(&mut state, "bob");
        create_room(&mut state, "r1", "alice", 2);
        state
            .apply(StoreRequest::JoinRoom { room_name: "r1".into(), user: "bob".into() })
            .unwrap();
        ready(&mut state, "alice", true);
        ready(&mut state, "bob", true);

        let reply = start(&mut state, "alice").unwrap();
        assert!(matches!(
            reply,
            StoreReply::Room(ref r)
                if r.members == ["alice", "bob"] && r.phase == lobby_protocol::RoomPhase::Live
        ));
    }

    // =====================================================================
    // Invitations
    // =====================================================================

    #[test]
    fn test_respond_invitation_consumed_once() {
        let mut state = StoreState::new();
        player(&mut state, "host");
        player(&mut state, "bob");
        create_room(&mut state, "r1", "host", 2);
        state
            .apply(StoreRequest::Invite { user: "bob".into(), room_name: "r1".into() })
            .unwrap();

        let reply = state
            .apply(StoreRequest::RespondInvitation {
                user: "bob".into(),
                room_name: "r1".into(),
                accept: true,
            })
            .unwrap();
        assert!(matches!(reply, StoreReply::MaybeRoom(Some(ref r)) if r.members == ["host", "bob"]));

        let err = state
            .apply(StoreRequest::RespondInvitation {
                user: "bob".into(),
                room_name: "r1".into(),
                accept: true,
            })
            .unwrap_err();
        assert_eq!(err, StoreError::InvitationNotFound("r1".into()));
    }

    #[test]
    fn test_respond_invitation_full_room_still_consumes() {
        let mut state = StoreState::new();
        for name in ["host", "bob", "carol"] {
            player(&mut state, name);
        }
        create_room(&mut state, "r1", "host", 2);
        state
            .apply(StoreRequest::Invite { user: "carol".into(), room_name: "r1".into() })
            .unwrap();
        state
            .apply(StoreRequest::JoinRoom { room_name: "r1".into(), user: "bob".into() })
            .unwrap();

        let err = state
            .apply(StoreRequest::RespondInvitation {
                user: "carol".into(),
                room_name: "r1".into(),
                accept: true,
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Room(RoomError::Full { .. })));

        let pending = state
            .apply(StoreRequest::Invitations { user: "carol".into() })
            .unwrap();
        assert_eq!(pending, StoreReply::Invitations(vec![]));
    }

    #[test]
    fn test_invite_to_missing_room_not_found() {
        let mut state = StoreState::new();
        player(&mut state, "bob");
        let err = state
            .apply(StoreRequest::Invite { user: "bob".into(), room_name: "nope".into() })
            .unwrap_err();
        assert!(matches!(err, StoreError::Room(RoomError::NotFound { .. })));
    }

    // =====================================================================
    // Catalog
    // =====================================================================

    #[test]
    fn test_update_game_keeps_reviews() {
        let mut state = StoreState::new();
        state
            .apply(StoreRequest::UpdateGame { record: record("g", "dev") })
            .unwrap();
        state
            .apply(StoreRequest::AddReview {
                game_id: "g".into(),
                review: Review {
                    user: "alice".into(),
                    rating: 4,
                    comment: "fun".into(),
                    time: 1,
                },
            })
            .unwrap();

        state
            .apply(StoreRequest::UpdateGame { record: record("g", "dev") })
            .unwrap();
        let reply = state
            .apply(StoreRequest::GameDetails { game_id: "g".into() })
            .unwrap();
        assert!(matches!(reply, StoreReply::Game(r) if r.reviews.len() == 1));
    }

    #[test]
    fn test_delete_missing_game_not_found() {
        let mut state = StoreState::new();
        let err = state
            .apply(StoreRequest::DeleteGame { game_id: "g".into() })
            .unwrap_err();
        assert_eq!(err, StoreError::GameNotFound("g".into()));
    }

    // =====================================================================
    // Snapshots
    // =====================================================================

    #[test]
    fn test_reset_presence_clears_live_state() {
        let mut state = StoreState::new();
        player(&mut state, "alice");
        state
            .apply(StoreRequest::SetOnline {
                role: Role::Player,
                username: "alice".into(),
                online: true,
            })
            .unwrap();
        create_room(&mut state, "r1", "alice", 2);

        state.reset_presence();
        assert!(state.rooms().is_empty());
        let online = state.apply(StoreRequest::ListUsers { online_only: true }).unwrap();
        assert_eq!(online, StoreReply::Users(vec![]));
    }
}
