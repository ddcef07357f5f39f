//! The lobby server binary.
//!
//! Configuration comes from the environment (see `LobbyConfig::from_env`);
//! log filtering from `RUST_LOG`, defaulting to `info`.

use lobby::prelude::*;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt as _, util::SubscriberInitExt as _};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = LobbyConfig::from_env();
    tracing::info!(
        bind = %config.bind_addr,
        store = %config.store_addr,
        games = %config.games_dir.display(),
        "starting lobby"
    );

    let store = RemoteStore::new(config.store_addr.clone()).with_timeout(config.store_timeout);
    let server = LobbyServer::builder().config(config).build(store).await?;
    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;
    Ok(())
}
