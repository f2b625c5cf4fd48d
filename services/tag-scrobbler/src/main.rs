//!
//! src/main.rs  Andrew Belles  Oct 16th, 2026
//!
//! Wires the album store, the Last.fm client and the pipeline together
//! and feeds the listener from stdin until it closes or ctrl-c
//!
//!

mod config;
mod errors;
mod logging;
mod types;

mod signature;
mod fetch;
mod persistent;

mod resolver;
mod tracklist;
mod scrobbler;
mod pipeline;
mod listener;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use crate::errors::ScrobbleError;

#[tokio::main]
async fn main() -> Result<(), ScrobbleError> {
    let cfgs    = config::load_config()?;
    let _logger = logging::init_logging(&cfgs.logging)?;

    tracing::info!(
        service="tag-scrobbler",
        version=%env!("CARGO_PKG_VERSION"),
        "starting"
    );
    tracing::debug!(config = ?cfgs, "config.loaded");

    let store    = persistent::SqliteAlbumStore::init(&cfgs.store).await?;
    let lastfm   = fetch::LastFmClient::new(&cfgs.http, &cfgs.lastfm)?;
    let pipeline = pipeline::Pipeline::new(&cfgs, Arc::new(store), Arc::new(lastfm));
    let listener = listener::Listener::new(Arc::new(pipeline), &cfgs.listener);

    let shutdown = listener.shutdown();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("signal.ctrl_c");
            shutdown.cancel();
        }
    });

    let stats = listener.run(tokio::io::stdin()).await?;
    listener::exit_status(&stats)
}
