//! `LobbyServer` builder and server loop.
//!
//! This is the entry point for running a lobby. It ties together all the
//! layers: transport → protocol → session → room → store.

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use lobby_store::{MemoryStore, RecordStore};
use lobby_transport::{TcpConnection, TcpTransport, Transport};
use tokio::task::JoinSet;

use crate::handler::handle_connection;
use crate::{Coordinator, GameLauncher, LobbyConfig, LobbyError, ProcessLauncher};

/// Builder for configuring and starting a lobby server.
///
/// # Example
///
/// ```rust,no_run
/// use lobby::prelude::*;
///
/// # async fn run() -> Result<(), LobbyError> {
/// let server = LobbyServer::builder()
///     .bind("0.0.0.0:60001")
///     .build(MemoryStore::new())
///     .await?;
/// server.run().await;
/// # Ok(())
/// # }
/// ```
pub struct LobbyServerBuilder<L = ProcessLauncher> {
    config: LobbyConfig,
    launcher: L,
}

impl LobbyServerBuilder {
    /// Creates a builder with [`LobbyConfig::default`] and a
    /// [`ProcessLauncher`].
    pub fn new() -> Self {
        Self::default().config(LobbyConfig::default())
    }

    /// Replaces the whole configuration. The default launcher picks up
    /// `game_runner` from it, so call this before [`launcher`](Self::launcher).
    pub fn config(self, config: LobbyConfig) -> Self {
        Self {
            launcher: ProcessLauncher::with_runner(config.game_runner.clone()),
            config,
        }
    }
}

impl Default for LobbyServerBuilder {
    fn default() -> Self {
        Self {
            config: LobbyConfig::default(),
            launcher: ProcessLauncher::new(),
        }
    }
}

impl<L: GameLauncher> LobbyServerBuilder<L> {
    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets where games are installed and packages kept.
    pub fn games_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.games_dir = dir.into();
        self
    }

    /// Uses `launcher` to start game servers.
    pub fn launcher<L2: GameLauncher>(self, launcher: L2) -> LobbyServerBuilder<L2> {
        LobbyServerBuilder {
            config: self.config,
            launcher,
        }
    }

    /// Binds the listening socket and assembles the coordinator.
    pub async fn build<S: RecordStore>(self, store: S) -> Result<LobbyServer<S, L>, LobbyError> {
        let transport = TcpTransport::bind(&self.config.bind_addr).await?;
        let coordinator = Arc::new(Coordinator::new(self.config, store, self.launcher));
        Ok(LobbyServer { transport, coordinator })
    }
}

/// A bound lobby server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct LobbyServer<S, L = ProcessLauncher> {
    transport: TcpTransport,
    coordinator: Arc<Coordinator<S, TcpConnection, L>>,
}

impl LobbyServer<MemoryStore, ProcessLauncher> {
    /// Creates a new builder.
    pub fn builder() -> LobbyServerBuilder {
        LobbyServerBuilder::new()
    }
}

impl<S, L> LobbyServer<S, L>
where
    S: RecordStore,
    L: GameLauncher,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, LobbyError> {
        Ok(self.transport.local_addr()?)
    }

    pub fn coordinator(&self) -> &Arc<Coordinator<S, TcpConnection, L>> {
        &self.coordinator
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) {
        self.run_until(std::future::pending()).await;
    }

    /// Accepts connections and spawns a handler task for each until
    /// `shutdown` resolves. Then every handler is aborted; their session
    /// guards sign the users out.
    pub async fn run_until(mut self, shutdown: impl Future<Output = ()>) {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "lobby server running");
        tokio::pin!(shutdown);
        let mut workers = JoinSet::new();

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let coordinator = Arc::clone(&self.coordinator);
                        workers.spawn(async move {
                            if let Err(e) = handle_connection(conn, coordinator).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => tracing::error!(error = %e, "accept failed"),
                },
            }
            while workers.try_join_next().is_some() {}
        }

        workers.shutdown().await;
        tracing::info!("lobby server stopped");
    }
}
