//! Per-connection handler: request loop, file transfers, and listeners.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive a frame → decode a `Request` (bad frames get an `Invalid`
//!      error and the loop continues)
//!   2. `_listener` → hand the connection over to the listener loop
//!   3. `upload_game` / `download_game` → header, `READY`, raw bytes
//!   4. Anything else → coordinator → one response frame
//!   5. On `exit`, EOF, or error → sign the session out

use std::sync::Arc;

use lobby_protocol::{Codec, JsonCodec, Request, Response, TRANSFER_READY};
use lobby_session::{RegistryKey, Session};
use lobby_store::RecordStore;
use lobby_transport::{Connection, ConnectionId, TcpConnection};

use crate::{Coordinator, GameLauncher, LobbyError};

type SharedCoordinator<S, L> = Arc<Coordinator<S, TcpConnection, L>>;

/// Owns the connection's session and signs it out when the handler exits.
///
/// The normal path calls [`finish`](Self::finish). If the task is aborted
/// or panics, `Drop` spawns the same cleanup instead.
struct SessionGuard<S: RecordStore, L: GameLauncher> {
    session: Session,
    conn_id: ConnectionId,
    coordinator: SharedCoordinator<S, L>,
    cleaned: bool,
}

impl<S: RecordStore, L: GameLauncher> SessionGuard<S, L> {
    async fn finish(&mut self) {
        self.coordinator.release(&mut self.session, self.conn_id).await;
        self.cleaned = true;
    }
}

impl<S: RecordStore, L: GameLauncher> Drop for SessionGuard<S, L> {
    fn drop(&mut self) {
        if self.cleaned || !self.session.is_logged_in() {
            return;
        }
        let mut session = std::mem::take(&mut self.session);
        let coordinator = Arc::clone(&self.coordinator);
        let conn_id = self.conn_id;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    coordinator.release(&mut session, conn_id).await;
                });
            }
            Err(_) => tracing::warn!(
                user = ?session.user(),
                "runtime gone, session left without cleanup"
            ),
        }
    }
}

async fn send_response(
    conn: &TcpConnection,
    codec: &JsonCodec,
    response: &Response,
) -> Result<(), LobbyError> {
    let bytes = codec.encode(response)?;
    conn.send(&bytes).await?;
    Ok(())
}

fn to_response(result: Result<Response, LobbyError>) -> Response {
    result.unwrap_or_else(|e| {
        tracing::debug!(kind = ?e.kind(), error = %e, "request failed");
        Response::error(e.kind(), e.to_string())
    })
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<S, L>(
    conn: TcpConnection,
    coordinator: SharedCoordinator<S, L>,
) -> Result<(), LobbyError>
where
    S: RecordStore,
    L: GameLauncher,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    let codec = JsonCodec;
    tracing::debug!(conn = %conn_id, peer = ?conn.peer_addr(), "handling new connection");

    let mut guard = SessionGuard {
        session: Session::new(),
        conn_id,
        coordinator: Arc::clone(&coordinator),
        cleaned: false,
    };

    let outcome = serve(&conn, &coordinator, &codec, &mut guard.session).await;
    guard.finish().await;
    tracing::debug!(conn = %conn_id, "connection finished");
    outcome
}

async fn serve<S, L>(
    conn: &Arc<TcpConnection>,
    coordinator: &SharedCoordinator<S, L>,
    codec: &JsonCodec,
    session: &mut Session,
) -> Result<(), LobbyError>
where
    S: RecordStore,
    L: GameLauncher,
{
    let conn_id = conn.id();
    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(conn = %conn_id, user = ?session.user(), "connection closed");
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(conn = %conn_id, error = %e, "recv error");
                return Ok(());
            }
        };

        let request: Request = match codec.decode(&data) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(conn = %conn_id, error = %e, "failed to decode request");
                let err = LobbyError::from(e);
                send_response(conn, codec, &Response::error(err.kind(), err.to_string())).await?;
                continue;
            }
        };
        tracing::debug!(conn = %conn_id, cmd = request.name(), "request");

        match request {
            Request::Listener { user } => {
                run_listener(conn, coordinator, codec, user).await;
                return Ok(());
            }
            Request::Exit => {
                coordinator.release(session, conn_id).await;
                send_response(conn, codec, &Response::ok("Goodbye!")).await?;
                return Ok(());
            }
            Request::UploadGame { file_name, file_size } => {
                let result = receive_upload(conn, coordinator, session, &file_name, file_size).await;
                send_response(conn, codec, &to_response(result)).await?;
            }
            Request::DownloadGame { game_id } => {
                send_download(conn, coordinator, codec, &game_id).await?;
            }
            request => {
                let response = to_response(dispatch(conn, coordinator, session, request).await);
                send_response(conn, codec, &response).await?;
            }
        }
    }
}

/// Routes one ordinary request to the coordinator.
async fn dispatch<S, L>(
    conn: &Arc<TcpConnection>,
    coordinator: &SharedCoordinator<S, L>,
    session: &mut Session,
    request: Request,
) -> Result<Response, LobbyError>
where
    S: RecordStore,
    L: GameLauncher,
{
    match request {
        Request::Register { username, password, role } => {
            coordinator.register(&username, &password, role).await
        }
        Request::Login { username, password, role } => {
            coordinator.login(session, conn, &username, &password, role).await
        }
        Request::Logout => coordinator.logout(session, conn.id()).await,
        Request::List { online_only } => coordinator.list_users(online_only).await,
        Request::CreateRoom { room_name, private, game_id, max_players } => {
            coordinator
                .create_room(session, &room_name, private, game_id, max_players)
                .await
        }
        Request::ListRooms => coordinator.list_rooms().await,
        Request::JoinRoom { room_name } => coordinator.join_room(session, &room_name).await,
        Request::LeaveRoom => coordinator.leave_room(session).await,
        Request::GetUserRoom { user } => coordinator.get_user_room(session, user.as_deref()).await,
        Request::GetRoomInfo { user } => coordinator.get_room_info(session, user.as_deref()).await,
        Request::InvitePlayer => coordinator.invite_player(session).await,
        Request::ManageInvitations => coordinator.manage_invitations(session).await,
        Request::Invite { user, room_name } => coordinator.invite(session, &user, &room_name).await,
        Request::RespondInvitation { room_name, accept } => {
            coordinator.respond_invitation(session, &room_name, accept).await
        }
        Request::SetReady { ready } => coordinator.set_ready(session, ready).await,
        Request::StartGame => coordinator.start_game(session).await,
        Request::GetStoreList => coordinator.get_store_list().await,
        Request::DeleteGame { game_id } => coordinator.delete_game(session, &game_id).await,
        Request::GetGameDetails { game_id } => coordinator.get_game_details(&game_id).await,
        Request::AddReview { game_id, rating, comment } => {
            coordinator.add_review(session, &game_id, rating, &comment).await
        }
        other @ (Request::Listener { .. }
        | Request::Exit
        | Request::UploadGame { .. }
        | Request::DownloadGame { .. }) => Err(LobbyError::Invalid(format!(
            "{} is handled by the connection loop",
            other.name()
        ))),
    }
}

/// Upload: validate the header, send `READY`, read exactly `file_size` raw
/// bytes, then install.
async fn receive_upload<S, L>(
    conn: &TcpConnection,
    coordinator: &SharedCoordinator<S, L>,
    session: &Session,
    file_name: &str,
    file_size: u64,
) -> Result<Response, LobbyError>
where
    S: RecordStore,
    L: GameLauncher,
{
    let len = coordinator.begin_upload(session, file_name, file_size)?;
    conn.send(TRANSFER_READY).await?;
    let package = conn.read_raw(len).await?;
    tracing::debug!(conn = %conn.id(), %file_name, len, "upload received");
    coordinator.finish_upload(session, file_name, package).await
}

/// Download: send the header, wait for the client's `READY`, then stream
/// the package. Any other answer cancels the transfer.
async fn send_download<S, L>(
    conn: &TcpConnection,
    coordinator: &SharedCoordinator<S, L>,
    codec: &JsonCodec,
    game_id: &str,
) -> Result<(), LobbyError>
where
    S: RecordStore,
    L: GameLauncher,
{
    let (header, package) = match coordinator.prepare_download(game_id).await {
        Ok(prepared) => prepared,
        Err(e) => return send_response(conn, codec, &to_response(Err(e))).await,
    };
    send_response(conn, codec, &header).await?;

    match conn.recv().await? {
        Some(reply) if reply == TRANSFER_READY => {
            conn.write_raw(&package).await?;
            tracing::info!(conn = %conn.id(), game = %game_id, bytes = package.len(), "download sent");
        }
        Some(_) => tracing::info!(conn = %conn.id(), game = %game_id, "download cancelled by client"),
        None => return Err(lobby_transport::TransportError::ConnectionClosed(
            "closed during download".into(),
        )
        .into()),
    }
    Ok(())
}

/// The notification channel. Registers the connection under
/// `Listener(user)` and forwards `set_ready` until the peer goes away.
async fn run_listener<S, L>(
    conn: &Arc<TcpConnection>,
    coordinator: &SharedCoordinator<S, L>,
    codec: &JsonCodec,
    user: String,
) where
    S: RecordStore,
    L: GameLauncher,
{
    let key = RegistryKey::Listener(user.clone());
    coordinator.registry().register(key.clone(), conn).await;
    tracing::info!(%user, conn = %conn.id(), "listener registered");

    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(%user, error = %e, "listener recv error");
                break;
            }
        };
        match codec.decode::<Request>(&data) {
            Ok(Request::SetReady { ready }) => {
                if let Err(e) = coordinator.set_ready_for(&user, ready).await {
                    tracing::warn!(%user, error = %e, "ready from listener failed");
                }
            }
            Ok(other) => tracing::debug!(%user, cmd = other.name(), "listener ignored request"),
            Err(e) => tracing::debug!(%user, error = %e, "listener ignored bad frame"),
        }
    }

    coordinator.registry().release(&key, conn.id()).await;
    tracing::info!(%user, conn = %conn.id(), "listener closed");
}
