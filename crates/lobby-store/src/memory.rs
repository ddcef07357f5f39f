//! In-process record store.

use std::io;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use crate::{RecordStore, StoreError, StoreReply, StoreRequest, StoreState};

/// A [`RecordStore`] holding a [`StoreState`] behind one mutex.
///
/// Every request runs to completion under the lock, which is what makes
/// room transitions atomic. With a snapshot path set, the whole state is
/// written to that file after each successful change.
pub struct MemoryStore {
    state: Mutex<StoreState>,
    snapshot: Option<PathBuf>,
}

impl MemoryStore {
    /// Creates an empty store with no snapshot file.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState::new()),
            snapshot: None,
        }
    }

    /// Opens a store backed by the snapshot at `path`.
    ///
    /// A missing file starts an empty store. Presence and rooms from a
    /// loaded snapshot are reset.
    ///
    /// # Errors
    /// Fails if the file exists but cannot be read or parsed.
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let mut state: StoreState = serde_json::from_slice(&bytes)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                state.reset_presence();
                tracing::info!(path = %path.display(), "loaded store snapshot");
                state
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => StoreState::new(),
            Err(e) => return Err(e),
        };

        Ok(Self {
            state: Mutex::new(state),
            snapshot: Some(path),
        })
    }

    /// A copy of the current state.
    pub async fn state(&self) -> StoreState {
        self.state.lock().await.clone()
    }

    async fn write_snapshot(&self, path: &Path, state: &StoreState) {
        let bytes = match serde_json::to_vec_pretty(state) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode store snapshot");
                return;
            }
        };
        if let Err(e) = tokio::fs::write(path, bytes).await {
            tracing::warn!(path = %path.display(), error = %e, "failed to write store snapshot");
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for MemoryStore {
    async fn call(&self, request: StoreRequest) -> Result<StoreReply, StoreError> {
        let read_only = request.is_read_only();
        let mut state = self.state.lock().await;
        let result = state.apply(request);

        if let (Ok(_), false, Some(path)) = (&result, read_only, &self.snapshot) {
            self.write_snapshot(path, &state).await;
        }
        result
    }
}
