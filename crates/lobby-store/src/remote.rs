//! TCP client for a record store running in another process.

use std::time::Duration;

use lobby_protocol::{Codec, JsonCodec};
use lobby_transport::{Connection, TcpConnection, TransportError};
use tokio::sync::Mutex;

use crate::{RecordStore, StoreError, StoreReply, StoreRequest, StoreResponse};

/// How long one store round trip may take before it counts as failed.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Attempts per call: the first try plus one reconnect-and-retry.
const MAX_ATTEMPTS: u32 = 2;

/// A [`RecordStore`] reached over one TCP connection.
///
/// Calls are serialized on the connection. The connection is opened
/// lazily and dropped after any I/O failure or timeout; the next attempt
/// reconnects. Each call gets at most [`MAX_ATTEMPTS`] tries before it
/// fails with [`StoreError::Unavailable`].
pub struct RemoteStore {
    addr: String,
    timeout: Duration,
    codec: JsonCodec,
    conn: Mutex<Option<TcpConnection>>,
}

impl RemoteStore {
    /// Creates a client for the store at `addr`. No connection is made
    /// until the first call.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: DEFAULT_STORE_TIMEOUT,
            codec: JsonCodec,
            conn: Mutex::new(None),
        }
    }

    /// Sets the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// One request/reply exchange. On success the connection goes back
    /// into `slot`; on failure `slot` is left empty.
    async fn exchange(
        &self,
        slot: &mut Option<TcpConnection>,
        body: &[u8],
    ) -> Result<Vec<u8>, String> {
        let round_trip = async {
            let conn = match slot.take() {
                Some(conn) => conn,
                None => TcpConnection::connect(&self.addr).await?,
            };
            conn.send(body).await?;
            let frame = conn.recv().await?.ok_or_else(|| {
                TransportError::ConnectionClosed("record store closed the connection".into())
            })?;
            *slot = Some(conn);
            Ok::<_, TransportError>(frame)
        };

        match tokio::time::timeout(self.timeout, round_trip).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(_) => Err(format!("no reply within {:?}", self.timeout)),
        }
    }
}

impl RecordStore for RemoteStore {
    async fn call(&self, request: StoreRequest) -> Result<StoreReply, StoreError> {
        let body = self
            .codec
            .encode(&request)
            .map_err(|e| StoreError::Protocol(e.to_string()))?;

        let mut slot = self.conn.lock().await;
        let mut last_error = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            match self.exchange(&mut slot, &body).await {
                Ok(frame) => {
                    let response: StoreResponse = self
                        .codec
                        .decode(&frame)
                        .map_err(|e| StoreError::Protocol(e.to_string()))?;
                    return response.into();
                }
                Err(e) => {
                    tracing::warn!(addr = %self.addr, attempt, error = %e, "record store call failed");
                    last_error = e;
                }
            }
        }

        Err(StoreError::Unavailable(format!("{}: {last_error}", self.addr)))
    }
}
