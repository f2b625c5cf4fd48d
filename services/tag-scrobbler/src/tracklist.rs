//!
//! src/tracklist.rs  Andrew Belles  Oct 16th, 2026
//!
//! Looks an album up on Last.fm and returns its tracks in order.
//! A missing tracklist is a normal outcome, so this never fails
//!

use std::sync::Arc;

use tracing::{info, warn};

use crate::fetch::LastFmApi;
use crate::types::Track;

#[derive(Clone)]
pub struct TracklistFetcher {
    api: Arc<dyn LastFmApi>
}

impl TracklistFetcher {
    pub fn new(api: Arc<dyn LastFmApi>) -> Self {
        Self { api }
    }

    pub async fn fetch(&self, artist: &str, album: &str) -> Vec<Track> {
        match self.api.album_info(artist, album).await {
            Ok(reply) => {
                let listed_as = reply.album.name.clone().unwrap_or_default();
                let tracks = reply.into_tracks();
                info!(%artist, %album, %listed_as, count = tracks.len(), "tracklist.fetched");
                tracks
            }
            Err(e) => {
                warn!(%artist, %album, error = %e, "tracklist.unavailable");
                Vec::new()
            }
        }
    }
}
