//! Record store for the lobby.
//!
//! The store keeps accounts, rooms, invitations, and the game catalog. The
//! lobby talks to it through one narrow seam, [`RecordStore::call`], which
//! takes a [`StoreRequest`] and yields a [`StoreReply`]. Two
//! implementations sit behind that seam:
//!
//! - [`MemoryStore`]: everything in one locked [`StoreState`], optionally
//!   snapshotted to a JSON file after each change
//! - [`RemoteStore`]: a TCP client for a [`StoreServer`] elsewhere, with a
//!   bounded wait and one reconnect-and-retry per call
//!
//! [`StoreClient`] wraps either one with typed methods so callers never
//! match on reply variants themselves.
//!
//! ```text
//! Coordinator → StoreClient → RecordStore ─┬─ MemoryStore
//!                                          └─ RemoteStore ⇄ StoreServer → MemoryStore
//! ```

mod client;
mod error;
mod memory;
mod remote;
mod request;
mod server;
mod state;

use std::future::Future;
use std::sync::Arc;

pub use client::StoreClient;
pub use error::StoreError;
pub use memory::MemoryStore;
pub use remote::{DEFAULT_STORE_TIMEOUT, RemoteStore};
pub use request::{StoreReply, StoreRequest, StoreResponse};
pub use server::StoreServer;
pub use state::{Account, StoreState};

/// Anything that can answer store requests.
///
/// Each call is applied atomically: concurrent callers observe either all
/// or none of another call's effects.
pub trait RecordStore: Send + Sync + 'static {
    fn call(
        &self,
        request: StoreRequest,
    ) -> impl Future<Output = Result<StoreReply, StoreError>> + Send;
}

impl<S: RecordStore> RecordStore for Arc<S> {
    fn call(
        &self,
        request: StoreRequest,
    ) -> impl Future<Output = Result<StoreReply, StoreError>> + Send {
        S::call(self, request)
    }
}
