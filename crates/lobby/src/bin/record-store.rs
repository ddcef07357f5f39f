//! The record store binary.
//!
//! `STORE_BIND` sets the listen address (default `0.0.0.0:10003`).
//! `STORE_SNAPSHOT`, when set, names a JSON file the store loads at start
//! and rewrites after every change.

use std::sync::Arc;

use lobby::prelude::*;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt as _, util::SubscriberInitExt as _};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let bind = std::env::var("STORE_BIND").unwrap_or_else(|_| "0.0.0.0:10003".to_string());
    let store = match std::env::var_os("STORE_SNAPSHOT") {
        Some(path) => MemoryStore::open(path).await?,
        None => MemoryStore::new(),
    };

    let server = StoreServer::bind(&bind, Arc::new(store)).await?;
    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;
    Ok(())
}
