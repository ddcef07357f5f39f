//! TCP front end for a record store.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use lobby_protocol::{Codec, JsonCodec};
use lobby_transport::{Connection, TcpConnection, TcpTransport, Transport, TransportError};
use tokio::task::JoinSet;

use crate::{RecordStore, StoreError, StoreRequest, StoreResponse};

/// Serves a [`RecordStore`] to [`RemoteStore`](crate::RemoteStore)
/// clients, one task per connection.
pub struct StoreServer<S> {
    transport: TcpTransport,
    store: Arc<S>,
}

impl<S: RecordStore> StoreServer<S> {
    /// Binds the listening socket.
    pub async fn bind(addr: &str, store: Arc<S>) -> Result<Self, TransportError> {
        let transport = TcpTransport::bind(addr).await?;
        Ok(Self { transport, store })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.transport.local_addr()
    }

    /// Serves until the process is terminated.
    pub async fn run(self) {
        self.run_until(std::future::pending()).await;
    }

    /// Serves until `shutdown` resolves, then stops every connection task.
    pub async fn run_until(mut self, shutdown: impl Future<Output = ()>) {
        tracing::info!(addr = ?self.local_addr().ok(), "record store running");
        tokio::pin!(shutdown);
        let mut workers = JoinSet::new();

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let store = Arc::clone(&self.store);
                        workers.spawn(serve_connection(conn, store));
                    }
                    Err(e) => tracing::error!(error = %e, "accept failed"),
                },
            }
            while workers.try_join_next().is_some() {}
        }

        workers.shutdown().await;
        tracing::info!("record store stopped");
    }
}

async fn serve_connection<S: RecordStore>(conn: TcpConnection, store: Arc<S>) {
    let codec = JsonCodec;
    let id = conn.id();
    tracing::debug!(conn = %id, peer = ?conn.peer_addr(), "store client connected");

    loop {
        let frame = match conn.recv().await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(conn = %id, error = %e, "store client read failed");
                break;
            }
        };

        let response = match codec.decode::<StoreRequest>(&frame) {
            Ok(request) => StoreResponse::from(store.call(request).await),
            Err(e) => StoreResponse::Error {
                error: StoreError::Protocol(e.to_string()),
            },
        };

        let bytes = match codec.encode(&response) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(conn = %id, error = %e, "failed to encode store response");
                break;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(conn = %id, error = %e, "store client write failed");
            break;
        }
    }

    tracing::debug!(conn = %id, "store client disconnected");
}
