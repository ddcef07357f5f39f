//! The session coordinator: every lobby command, start to finish.
//!
//! The coordinator owns no room state itself. Rules about membership live
//! in `lobby-room` and are applied atomically inside the record store; the
//! coordinator sequences store calls, checks who is asking, reads game
//! manifests, launches game servers, and fans out notifications.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use lobby_protocol::{
    Codec, GameRecord, JsonCodec, Notification, Response, ResponseBody, Review, Role,
};
use lobby_room::{Room, RoomError};
use lobby_session::{ConnectionRegistry, RegistryKey, Session};
use lobby_store::{RecordStore, StoreClient, StoreError};
use lobby_transport::{Connection, ConnectionId};

use crate::games::{check_name, package_manifest};
use crate::{GameLauncher, GameRepository, LaunchSpec, LobbyConfig, LobbyError};

/// Rooms with a `start_game` in flight. Held for the duration of one start.
struct StartGuard<'a> {
    starting: &'a Mutex<HashSet<String>>,
    room: String,
}

impl Drop for StartGuard<'_> {
    fn drop(&mut self) {
        self.starting
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.room);
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Runs lobby commands on behalf of connections.
///
/// One coordinator is shared by every connection task. `S` is the record
/// store, `C` the connection type notifications go out on, and `L` the
/// game launcher.
pub struct Coordinator<S, C, L> {
    config: LobbyConfig,
    store: StoreClient<S>,
    registry: ConnectionRegistry<C>,
    games: GameRepository,
    launcher: L,
    codec: JsonCodec,
    starting: Mutex<HashSet<String>>,
}

impl<S, C, L> Coordinator<S, C, L>
where
    S: RecordStore,
    C: Connection,
    L: GameLauncher,
{
    pub fn new(config: LobbyConfig, store: S, launcher: L) -> Self {
        let games = GameRepository::new(config.games_dir.clone());
        Self {
            config,
            store: StoreClient::new(store),
            registry: ConnectionRegistry::new(),
            games,
            launcher,
            codec: JsonCodec,
            starting: Mutex::new(HashSet::new()),
        }
    }

    pub fn config(&self) -> &LobbyConfig {
        &self.config
    }

    pub fn registry(&self) -> &ConnectionRegistry<C> {
        &self.registry
    }

    pub fn store(&self) -> &StoreClient<S> {
        &self.store
    }

    pub fn games(&self) -> &GameRepository {
        &self.games
    }

    // =====================================================================
    // Accounts
    // =====================================================================

    pub async fn register(
        &self,
        username: &str,
        password: &str,
        role: Role,
    ) -> Result<Response, LobbyError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(LobbyError::Invalid("username and password are required".into()));
        }
        self.store.create_account(role, username, password).await?;
        tracing::info!(user = %username, %role, "account registered");
        Ok(Response::ok(format!("Registered {role} {username}")))
    }

    /// Authenticates `username` and binds it to `session` and `conn`.
    pub async fn login(
        &self,
        session: &mut Session,
        conn: &Arc<C>,
        username: &str,
        password: &str,
        role: Role,
    ) -> Result<Response, LobbyError> {
        if let Some(current) = session.user() {
            return Err(lobby_session::SessionError::AlreadyBound(current.to_string()).into());
        }
        self.store.login(role, username, password).await?;
        session.bind(username, role)?;
        self.registry
            .register(RegistryKey::Primary(username.to_string()), conn)
            .await;

        tracing::info!(user = %username, %role, conn = %conn.id(), "logged in");
        Ok(Response::ok(format!("Welcome, {username}")))
    }

    pub async fn logout(
        &self,
        session: &mut Session,
        conn_id: ConnectionId,
    ) -> Result<Response, LobbyError> {
        let user = session.require_user()?.to_string();
        let signed_out = self.sign_out(&user, session.role(), conn_id).await;
        session.release();
        signed_out?;
        tracing::info!(%user, "logged out");
        Ok(Response::ok("Logged out"))
    }

    /// Disconnect cleanup for a primary connection. Failures are logged,
    /// since there is nobody left to answer.
    pub async fn release(&self, session: &mut Session, conn_id: ConnectionId) {
        let Some(user) = session.user().map(str::to_string) else {
            return;
        };
        if let Err(e) = self.sign_out(&user, session.role(), conn_id).await {
            tracing::warn!(%user, error = %e, "cleanup after disconnect failed");
        }
        self.registry
            .unregister(&RegistryKey::Listener(user.clone()))
            .await;
        session.release();
        tracing::info!(%user, conn = %conn_id, "session released");
    }

    /// Leaves the room, drops invitations, marks the account offline, and
    /// removes the primary registry entry.
    ///
    /// Every step runs even when an earlier one fails; the first failure
    /// is returned.
    async fn sign_out(
        &self,
        user: &str,
        role: Role,
        conn_id: ConnectionId,
    ) -> Result<(), LobbyError> {
        let mut first_error: Option<StoreError> = None;
        let mut note = |step: &str, e: StoreError| {
            tracing::warn!(%user, step, error = %e, "sign-out step failed");
            first_error.get_or_insert(e);
        };

        match self.store.leave_room(user).await {
            Ok(departure) => {
                tracing::info!(%user, room = %departure.room_name, "left room on sign-out");
            }
            Err(StoreError::Room(RoomError::NotInRoom { .. })) => {}
            Err(e) => note("leave_room", e),
        }
        if role == Role::Player {
            if let Err(e) = self.store.clear_invitations(user).await {
                note("clear_invitations", e);
            }
        }
        if let Err(e) = self.store.set_online(role, user, false).await {
            note("set_online", e);
        }
        self.registry
            .release(&RegistryKey::Primary(user.to_string()), conn_id)
            .await;

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    pub async fn list_users(&self, online_only: bool) -> Result<Response, LobbyError> {
        let users = self.store.list_users(online_only).await?;
        Ok(Response::ok("User list").with_body(ResponseBody::Users { users }))
    }

    // =====================================================================
    // Rooms
    // =====================================================================

    pub async fn create_room(
        &self,
        session: &Session,
        room_name: &str,
        private: bool,
        game_id: Option<String>,
        max_players: Option<usize>,
    ) -> Result<Response, LobbyError> {
        let user = session.require_user()?;
        if room_name.trim().is_empty() {
            return Err(LobbyError::Invalid("room_name is required".into()));
        }
        let capacity = max_players.unwrap_or(self.config.default_max_players);
        let room = self
            .store
            .create_room(room_name, user, private, game_id, capacity)
            .await?;
        Ok(Response::ok(format!("Room {room_name} created"))
            .with_body(ResponseBody::RoomInfo { room_info: room.details() }))
    }

    pub async fn list_rooms(&self) -> Result<Response, LobbyError> {
        let rooms = self.store.list_rooms().await?;
        Ok(Response::ok("Room list").with_body(ResponseBody::Rooms { rooms }))
    }

    pub async fn join_room(
        &self,
        session: &Session,
        room_name: &str,
    ) -> Result<Response, LobbyError> {
        let user = session.require_user()?;
        let room = self.store.join_room(room_name, user).await?;
        tracing::info!(%user, room = %room_name, "joined room");
        Ok(Response::ok(format!("Joined room {room_name}"))
            .with_body(ResponseBody::RoomInfo { room_info: room.details() }))
    }

    pub async fn leave_room(&self, session: &Session) -> Result<Response, LobbyError> {
        let user = session.require_user()?;
        let departure = self.store.leave_room(user).await?;
        tracing::info!(%user, room = %departure.room_name, "left room");

        let msg = match (&departure.new_host, departure.room_deleted) {
            (_, true) => format!("Left room {}; room closed", departure.room_name),
            (Some(host), false) => {
                format!("Left room {}; {host} is now host", departure.room_name)
            }
            (None, false) => format!("Left room {}", departure.room_name),
        };
        Ok(Response::ok(msg))
    }

    /// The room `user` (or the caller) is in.
    pub async fn get_user_room(
        &self,
        session: &Session,
        user: Option<&str>,
    ) -> Result<Response, LobbyError> {
        let target = match user {
            Some(user) => user,
            None => session.require_user()?,
        };
        let room_name = self.store.user_room(target).await?.map(|room| room.name);
        Ok(Response::ok(format!("Room of {target}"))
            .with_body(ResponseBody::UserRoom { room_name }))
    }

    /// Full details of the room `user` (or the caller) is in.
    pub async fn get_room_info(
        &self,
        session: &Session,
        user: Option<&str>,
    ) -> Result<Response, LobbyError> {
        let target = match user {
            Some(user) => user,
            None => session.require_user()?,
        };
        let room = self.require_room(target).await?;
        Ok(Response::ok(format!("Room {}", room.name))
            .with_body(ResponseBody::RoomInfo { room_info: room.details() }))
    }

    async fn require_room(&self, user: &str) -> Result<Room, LobbyError> {
        self.store
            .user_room(user)
            .await?
            .ok_or_else(|| RoomError::NotInRoom { user: user.to_string() }.into())
    }

    // =====================================================================
    // Invitations
    // =====================================================================

    /// Online players the caller could invite into their room.
    pub async fn invite_player(&self, session: &Session) -> Result<Response, LobbyError> {
        let user = session.require_user()?;
        let room = self.require_room(user).await?;
        let available_users = self
            .store
            .list_users(true)
            .await?
            .into_iter()
            .filter(|candidate| candidate != user && !room.is_member(candidate))
            .collect();
        Ok(Response::ok("Invitable users").with_body(ResponseBody::Invitable {
            available_users,
            room_name: room.name,
        }))
    }

    pub async fn manage_invitations(&self, session: &Session) -> Result<Response, LobbyError> {
        let user = session.require_user()?;
        let invitations = self.store.invitations(user).await?;
        Ok(Response::ok("Pending invitations")
            .with_body(ResponseBody::Invitations { invitations }))
    }

    /// Invites `target` into `room_name`. Only members of the room may
    /// invite.
    pub async fn invite(
        &self,
        session: &Session,
        target: &str,
        room_name: &str,
    ) -> Result<Response, LobbyError> {
        let user = session.require_user()?;
        if target == user {
            return Err(LobbyError::Invalid("cannot invite yourself".into()));
        }
        let room = self.store.room_info(room_name).await?;
        if !room.is_member(user) {
            return Err(LobbyError::PermissionDenied(format!(
                "{user} is not a member of room {room_name}"
            )));
        }
        self.store.invite(target, room_name).await?;
        tracing::info!(%user, %target, room = %room_name, "invitation sent");
        Ok(Response::ok(format!("Invited {target} to {room_name}")))
    }

    /// Answers an invitation. The invitation is consumed either way.
    pub async fn respond_invitation(
        &self,
        session: &Session,
        room_name: &str,
        accept: bool,
    ) -> Result<Response, LobbyError> {
        let user = session.require_user()?;
        match self.store.respond_invitation(user, room_name, accept).await? {
            Some(room) => {
                tracing::info!(%user, room = %room_name, "invitation accepted");
                Ok(Response::ok(format!("Joined room {room_name}"))
                    .with_body(ResponseBody::RoomInfo { room_info: room.details() }))
            }
            None => Ok(Response::ok(format!("Declined invitation to {room_name}"))),
        }
    }

    // =====================================================================
    // Readiness and game start
    // =====================================================================

    pub async fn set_ready(&self, session: &Session, ready: bool) -> Result<Response, LobbyError> {
        let user = session.require_user()?;
        let room = self.set_ready_for(user, ready).await?;
        Ok(Response::ok(if ready { "Ready" } else { "Not ready" })
            .with_body(ResponseBody::RoomInfo { room_info: room.details() }))
    }

    /// Sets `user`'s ready flag. Used directly by listener connections.
    pub async fn set_ready_for(&self, user: &str, ready: bool) -> Result<Room, LobbyError> {
        let room = self.store.set_ready(user, ready).await?;
        tracing::debug!(%user, room = %room.name, ready, "ready flag set");
        Ok(room)
    }

    fn begin_start(&self, room: &str) -> Result<StartGuard<'_>, LobbyError> {
        let mut starting = self.starting.lock().unwrap_or_else(PoisonError::into_inner);
        if !starting.insert(room.to_string()) {
            return Err(LobbyError::StartInProgress { room: room.to_string() });
        }
        Ok(StartGuard {
            starting: &self.starting,
            room: room.to_string(),
        })
    }

    /// Launches the caller's room game and notifies every member.
    ///
    /// Checked in order, each failure leaving everything unchanged: logged
    /// in, in a room, host, game assigned, game files present, manifest
    /// valid, enough players, everyone ready.
    ///
    /// Host, head count and readiness are checked again by the store when
    /// the room goes live, and the notification goes to the members the
    /// store reports at that moment.
    pub async fn start_game(&self, session: &Session) -> Result<Response, LobbyError> {
        let user = session.require_user()?;
        let room = self.require_room(user).await?;
        if room.host != user {
            return Err(RoomError::NotHost { room: room.name }.into());
        }
        let game_id = room
            .game_id
            .clone()
            .ok_or_else(|| LobbyError::NoGameAssigned { room: room.name.clone() })?;
        let manifest = self.games.load_manifest(&game_id).await?;
        room.check_start(user, manifest.min_players)?;

        let _guard = self.begin_start(&room.name)?;
        tracing::info!(room = %room.name, game = %game_id, players = room.members.len(), "starting game");

        let spec = LaunchSpec {
            room_name: room.name.clone(),
            game_id: game_id.clone(),
            game_dir: self.games.game_dir(&game_id),
            server_entry: manifest.server_entry.clone(),
            game_port: self.config.game_port,
        };
        self.launcher.launch(&spec).await?;
        let live = match self
            .store
            .start_room(&room.name, user, manifest.min_players)
            .await
        {
            Ok(live) => live,
            Err(e) => {
                tracing::warn!(room = %room.name, error = %e, "room changed during launch, not started");
                return Err(e.into());
            }
        };

        let notification = Notification::StartGame {
            game_host: self.config.game_host.clone(),
            game_port: self.config.game_port,
            room_name: live.name.clone(),
            game_id,
            players: live.members.clone(),
        };
        let payload = self.codec.encode(&notification)?;
        self.broadcast(&live.members, &payload).await;

        Ok(Response::ok("Game started"))
    }

    /// Sends `payload` to each member's listener. A failed delivery is
    /// logged and the listener entry dropped.
    async fn broadcast(&self, members: &[String], payload: &[u8]) {
        for member in members {
            let key = RegistryKey::Listener(member.clone());
            match self.registry.send_to(&key, payload).await {
                Ok(()) => tracing::debug!(%member, "start notification sent"),
                Err(e) => {
                    tracing::warn!(%member, error = %e, "start notification failed");
                    self.registry.unregister(&key).await;
                }
            }
        }
    }

    // =====================================================================
    // Game catalog
    // =====================================================================

    /// Checks an upload header before any bytes are accepted.
    pub fn begin_upload(
        &self,
        session: &Session,
        file_name: &str,
        file_size: u64,
    ) -> Result<usize, LobbyError> {
        session.require_user()?;
        if session.role() != Role::Developer {
            return Err(LobbyError::PermissionDenied("only developers can upload games".into()));
        }
        check_name(file_name)?;
        if file_size == 0 || file_size > self.config.max_package_bytes {
            return Err(LobbyError::Invalid(format!(
                "file_size must be between 1 and {} bytes",
                self.config.max_package_bytes
            )));
        }
        usize::try_from(file_size)
            .map_err(|_| LobbyError::Invalid(format!("file_size {file_size} too large")))
    }

    /// Installs a received package and records it in the catalog.
    pub async fn finish_upload(
        &self,
        session: &Session,
        file_name: &str,
        package: Vec<u8>,
    ) -> Result<Response, LobbyError> {
        let uploader = session.require_user()?;
        let file_size = package.len() as u64;

        let offered = package_manifest(&package)?;
        if let Some(existing) = self.find_game(&offered.game_id).await? {
            if existing.uploader != uploader {
                return Err(LobbyError::PermissionDenied(format!(
                    "game {} belongs to {}",
                    existing.game_id(),
                    existing.uploader
                )));
            }
        }

        let manifest = self.games.install(package).await?;
        let label = format!(
            "Game '{}' v{} uploaded & installed",
            manifest.name.as_deref().unwrap_or(&manifest.game_id),
            manifest.version
        );
        self.store
            .update_game(GameRecord {
                manifest,
                file_name: file_name.to_string(),
                file_size,
                uploader: uploader.to_string(),
                reviews: Vec::new(),
            })
            .await?;
        tracing::info!(%uploader, %file_name, file_size, "game uploaded");
        Ok(Response::ok(label))
    }

    async fn find_game(&self, game_id: &str) -> Result<Option<GameRecord>, LobbyError> {
        match self.store.game_details(game_id).await {
            Ok(record) => Ok(Some(record)),
            Err(StoreError::GameNotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_store_list(&self) -> Result<Response, LobbyError> {
        let games = self.store.list_games().await?;
        Ok(Response::ok("Game store").with_body(ResponseBody::Games { games }))
    }

    pub async fn get_game_details(&self, game_id: &str) -> Result<Response, LobbyError> {
        let game_info = self.store.game_details(game_id).await?;
        Ok(Response::ok(format!("Details of {game_id}"))
            .with_body(ResponseBody::GameInfo { game_info }))
    }

    /// Removes a game from the catalog and from disk. Owner only.
    pub async fn delete_game(&self, session: &Session, game_id: &str) -> Result<Response, LobbyError> {
        let user = session.require_user()?;
        let record = self.store.game_details(game_id).await?;
        if record.uploader != user {
            return Err(LobbyError::PermissionDenied(format!(
                "{user} is not the owner of {game_id}"
            )));
        }
        self.store.delete_game(game_id).await?;
        self.games.remove(game_id).await?;
        tracing::info!(%user, game = %game_id, "game deleted");
        Ok(Response::ok(format!("Game {game_id} deleted")))
    }

    /// The download header and the package bytes that follow it.
    pub async fn prepare_download(&self, game_id: &str) -> Result<(Response, Vec<u8>), LobbyError> {
        let record = self.store.game_details(game_id).await?;
        let package = self.games.read_package(game_id).await?;
        let header = Response::ok(format!("Sending {}", record.file_name)).with_body(
            ResponseBody::Transfer {
                file_name: record.file_name.clone(),
                file_size: package.len() as u64,
                game_info: record,
            },
        );
        Ok((header, package))
    }

    pub async fn add_review(
        &self,
        session: &Session,
        game_id: &str,
        rating: u8,
        comment: &str,
    ) -> Result<Response, LobbyError> {
        let user = session.require_user()?;
        if !(1..=5).contains(&rating) {
            return Err(LobbyError::Invalid("rating must be between 1 and 5".into()));
        }
        let review = Review {
            user: user.to_string(),
            rating,
            comment: comment.to_string(),
            time: now_secs(),
        };
        let game_info = self.store.add_review(game_id, review).await?;
        Ok(Response::ok("Review saved").with_body(ResponseBody::GameInfo { game_info }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use lobby_protocol::ErrorKind;
    use lobby_store::MemoryStore;
    use lobby_transport::TransportError;

    use super::*;

    struct MockConnection {
        id: ConnectionId,
        sent: Mutex<Vec<Vec<u8>>>,
        broken: AtomicBool,
    }

    impl MockConnection {
        fn new(id: u64) -> Arc<Self> {
            Arc::new(Self {
                id: ConnectionId::new(id),
                sent: Mutex::new(Vec::new()),
                broken: AtomicBool::new(false),
            })
        }
    }

    impl Connection for MockConnection {
        async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(TransportError::ConnectionClosed("broken pipe".into()));
            }
            self.sent.lock().unwrap().push(data.to_vec());
            Ok(())
        }

        async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
            Ok(None)
        }

        async fn close(&self) -> Result<(), TransportError> {
            Ok(())
        }

        fn id(&self) -> ConnectionId {
            self.id
        }
    }

    #[derive(Default)]
    struct CountingLauncher {
        launches: Mutex<usize>,
    }

    impl GameLauncher for CountingLauncher {
        async fn launch(&self, _spec: &LaunchSpec) -> Result<(), crate::LaunchError> {
            *self.launches.lock().unwrap() += 1;
            Ok(())
        }
    }

    type TestCoordinator = Coordinator<MemoryStore, MockConnection, CountingLauncher>;

    /// Sets a member unready while the game server is "starting".
    struct UnreadyingLauncher {
        store: Arc<MemoryStore>,
        user: String,
    }

    impl GameLauncher for UnreadyingLauncher {
        async fn launch(&self, _spec: &LaunchSpec) -> Result<(), crate::LaunchError> {
            self.store
                .call(lobby_store::StoreRequest::SetReady { user: self.user.clone(), ready: false })
                .await
                .unwrap();
            Ok(())
        }
    }

    /// A store whose `leave_room` is always unreachable.
    struct LeaveFailsStore(MemoryStore);

    impl RecordStore for LeaveFailsStore {
        async fn call(
            &self,
            request: lobby_store::StoreRequest,
        ) -> Result<lobby_store::StoreReply, StoreError> {
            match request {
                lobby_store::StoreRequest::LeaveRoom { .. } => {
                    Err(StoreError::Unavailable("leave refused".into()))
                }
                other => self.0.call(other).await,
            }
        }
    }

    fn config(games_dir: &std::path::Path) -> LobbyConfig {
        LobbyConfig {
            games_dir: games_dir.to_path_buf(),
            ..LobbyConfig::default()
        }
    }

    fn coordinator(games_dir: &std::path::Path) -> TestCoordinator {
        Coordinator::new(config(games_dir), MemoryStore::new(), CountingLauncher::default())
    }

    async fn signed_in<S: RecordStore, L: GameLauncher>(
        coord: &Coordinator<S, MockConnection, L>,
        user: &str,
        role: Role,
        id: u64,
    ) -> Session {
        coord.register(user, "pw", role).await.unwrap();
        let mut session = Session::new();
        coord
            .login(&mut session, &MockConnection::new(id), user, "pw", role)
            .await
            .unwrap();
        session
    }

    #[test]
    fn test_begin_start_second_call_conflicts_until_released() {
        let dir = tempfile::tempdir().unwrap();
        let coord = coordinator(dir.path());

        let guard = coord.begin_start("r1").unwrap();
        let err = coord.begin_start("r1").err().unwrap();
        assert!(matches!(err, LobbyError::StartInProgress { .. }));
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(coord.begin_start("r2").is_ok());

        drop(guard);
        assert!(coord.begin_start("r1").is_ok());
    }

    #[tokio::test]
    async fn test_login_same_session_twice_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let coord = coordinator(dir.path());
        let mut session = signed_in(&coord, "alice", Role::Player, 1).await;
        coord.register("bob", "pw", Role::Player).await.unwrap();

        let err = coord
            .login(&mut session, &MockConnection::new(1), "bob", "pw", Role::Player)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(session.user(), Some("alice"));
    }

    #[tokio::test]
    async fn test_release_leaves_room_and_goes_offline() {
        let dir = tempfile::tempdir().unwrap();
        let coord = coordinator(dir.path());
        let mut session = signed_in(&coord, "alice", Role::Player, 7).await;
        coord.create_room(&session, "r1", false, None, None).await.unwrap();

        coord.release(&mut session, ConnectionId::new(7)).await;

        assert!(!session.is_logged_in());
        assert!(coord.store().list_rooms().await.unwrap().is_empty());
        assert!(coord.store().list_users(true).await.unwrap().is_empty());
        assert!(!coord.registry().contains(&RegistryKey::Primary("alice".into())).await);
    }

    #[tokio::test]
    async fn test_broadcast_prunes_broken_listener() {
        let dir = tempfile::tempdir().unwrap();
        let coord = coordinator(dir.path());
        let good = MockConnection::new(1);
        let bad = MockConnection::new(2);
        bad.broken.store(true, Ordering::SeqCst);
        coord.registry().register(RegistryKey::Listener("alice".into()), &good).await;
        coord.registry().register(RegistryKey::Listener("bob".into()), &bad).await;

        coord.broadcast(&["alice".into(), "bob".into()], b"go").await;

        assert_eq!(good.sent.lock().unwrap().len(), 1);
        assert!(coord.registry().contains(&RegistryKey::Listener("alice".into())).await);
        assert!(!coord.registry().contains(&RegistryKey::Listener("bob".into())).await);
    }

    #[tokio::test]
    async fn test_begin_upload_checks_role_name_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let coord = coordinator(dir.path());
        let player = signed_in(&coord, "alice", Role::Player, 1).await;
        let dev = signed_in(&coord, "dev", Role::Developer, 2).await;

        let err = coord.begin_upload(&player, "g.zip", 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);

        assert_eq!(coord.begin_upload(&dev, "g.zip", 10).unwrap(), 10);
        let err = coord.begin_upload(&dev, "../g.zip", 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
        let err = coord.begin_upload(&dev, "g.zip", 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
        let too_big = coord.config().max_package_bytes + 1;
        assert!(coord.begin_upload(&dev, "g.zip", too_big).is_err());
    }

    #[tokio::test]
    async fn test_start_game_without_game_precondition_failed() {
        let dir = tempfile::tempdir().unwrap();
        let coord = coordinator(dir.path());
        let alice = signed_in(&coord, "alice", Role::Player, 1).await;
        coord.create_room(&alice, "r1", false, None, None).await.unwrap();

        let err = coord.start_game(&alice).await.unwrap_err();
        assert!(matches!(err, LobbyError::NoGameAssigned { .. }));
        assert_eq!(*coord.launcher.launches.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_get_room_info_outside_room_precondition_failed() {
        let dir = tempfile::tempdir().unwrap();
        let coord = coordinator(dir.path());
        let alice = signed_in(&coord, "alice", Role::Player, 1).await;

        let err = coord.get_room_info(&alice, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    }

    #[tokio::test]
    async fn test_login_concurrent_same_account_one_wins() {
        let dir = tempfile::tempdir().unwrap();
        let coord = coordinator(dir.path());
        coord.register("alice", "pw", Role::Player).await.unwrap();

        let (mut first, mut second) = (Session::new(), Session::new());
        let (conn_a, conn_b) = (MockConnection::new(1), MockConnection::new(2));
        let (a, b) = tokio::join!(
            coord.login(&mut first, &conn_a, "alice", "pw", Role::Player),
            coord.login(&mut second, &conn_b, "alice", "pw", Role::Player),
        );

        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        let err = a.err().or(b.err()).unwrap();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(
            [first.is_logged_in(), second.is_logged_in()].iter().filter(|b| **b).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_start_game_member_unreadies_during_launch_not_started() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("guess")).unwrap();
        std::fs::write(
            dir.path().join("guess").join(crate::games::MANIFEST_FILE),
            br#"{"game_id":"guess","server_entry":"server.py"}"#,
        )
        .unwrap();
        let store = Arc::new(MemoryStore::new());
        let launcher = UnreadyingLauncher { store: Arc::clone(&store), user: "bob".into() };
        let coord = Coordinator::new(config(dir.path()), store, launcher);

        let alice = signed_in(&coord, "alice", Role::Player, 1).await;
        let bob = signed_in(&coord, "bob", Role::Player, 2).await;
        let listeners = [MockConnection::new(11), MockConnection::new(12)];
        for (user, conn) in ["alice", "bob"].into_iter().zip(&listeners) {
            coord.registry().register(RegistryKey::Listener(user.into()), conn).await;
        }
        coord
            .create_room(&alice, "r1", false, Some("guess".into()), None)
            .await
            .unwrap();
        coord.join_room(&bob, "r1").await.unwrap();
        coord.set_ready(&alice, true).await.unwrap();
        coord.set_ready(&bob, true).await.unwrap();

        let err = coord.start_game(&alice).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
        assert_eq!(err.to_string(), "players not ready: bob");
        let room = coord.store().room_info("r1").await.unwrap();
        assert_ne!(room.phase, lobby_protocol::RoomPhase::Live);
        assert!(listeners.iter().all(|l| l.sent.lock().unwrap().is_empty()));
        assert!(coord.begin_start("r1").is_ok());
    }

    #[tokio::test]
    async fn test_logout_store_failure_still_offline_and_released() {
        let dir = tempfile::tempdir().unwrap();
        let coord: Coordinator<_, MockConnection, _> = Coordinator::new(
            config(dir.path()),
            LeaveFailsStore(MemoryStore::new()),
            CountingLauncher::default(),
        );
        let mut alice = signed_in(&coord, "alice", Role::Player, 3).await;
        coord.create_room(&alice, "r1", false, None, None).await.unwrap();

        let err = coord.logout(&mut alice, ConnectionId::new(3)).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
        assert!(!alice.is_logged_in());
        assert!(coord.store().list_users(true).await.unwrap().is_empty());
        assert!(!coord.registry().contains(&RegistryKey::Primary("alice".into())).await);
    }

    #[tokio::test]
    async fn test_release_store_failure_still_offline() {
        let dir = tempfile::tempdir().unwrap();
        let coord: Coordinator<_, MockConnection, _> = Coordinator::new(
            config(dir.path()),
            LeaveFailsStore(MemoryStore::new()),
            CountingLauncher::default(),
        );
        let mut bob = signed_in(&coord, "bob", Role::Player, 4).await;
        coord.create_room(&bob, "r1", false, None, None).await.unwrap();

        coord.release(&mut bob, ConnectionId::new(4)).await;

        assert!(!bob.is_logged_in());
        assert!(coord.store().list_users(true).await.unwrap().is_empty());
        assert!(!coord.registry().contains(&RegistryKey::Primary("bob".into())).await);
    }
}
