//!
//! src/scrobbler.rs  Andrew Belles  Oct 16th, 2026
//!
//! Builds one signed track.scrobble batch for an album's tracks and
//! submits it in a single request
//!

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{LastFmConfig, ScrobbleConfig};
use crate::errors::ScrobbleError;
use crate::fetch::{LastFmApi, METHOD_TRACK_SCROBBLE};
use crate::signature::api_signature;
use crate::types::{ScrobbleBatch, ScrobbleEntry, ScrobbleResult, Track};

/// Largest batch Last.fm documents for track.scrobble
pub const MAX_BATCH: usize = 50;

/// Walks back from `now`: the last track gets `now`, each earlier track
/// `spacing` seconds before the one after it
pub fn assign_timestamps(count: usize, now: i64, spacing: i64) -> Vec<i64> {
    (0..count)
        .map(|i| now - (count - 1 - i) as i64 * spacing)
        .collect()
}

impl ScrobbleBatch {
    pub fn new(tracks: &[Track], artist: &str, album: &str, now: i64, spacing: i64) -> Self {
        let entries = tracks.iter()
            .zip(assign_timestamps(tracks.len(), now, spacing))
            .map(|(track, timestamp)| ScrobbleEntry {
                artist: artist.to_string(),
                album: album.to_string(),
                track: track.name.clone(),
                timestamp
            })
            .collect();
        Self { entries }
    }

    /// artist[i], album[i], track[i], timestamp[i] for every entry
    pub fn indexed_params(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        for (i, entry) in self.entries.iter().enumerate() {
            params.insert(format!("artist[{i}]"), entry.artist.clone());
            params.insert(format!("album[{i}]"), entry.album.clone());
            params.insert(format!("track[{i}]"), entry.track.clone());
            params.insert(format!("timestamp[{i}]"), entry.timestamp.to_string());
        }
        params
    }
}

#[derive(Clone)]
pub struct ScrobbleSubmitter {
    api: Arc<dyn LastFmApi>,
    lastfm: LastFmConfig,
    spacing: i64
}

impl ScrobbleSubmitter {
    pub fn new(api: Arc<dyn LastFmApi>, lastfm: &LastFmConfig, scrobble: &ScrobbleConfig) -> Self {
        Self { api, lastfm: lastfm.clone(), spacing: scrobble.spacing_secs }
    }

    /// Signed form for a batch; `format` is appended after signing
    pub fn signed_form(&self, batch: &ScrobbleBatch) -> Vec<(String, String)> {
        let mut params = batch.indexed_params();
        params.insert("method".into(), METHOD_TRACK_SCROBBLE.into());
        params.insert("api_key".into(), self.lastfm.api_key.clone());
        params.insert("sk".into(), self.lastfm.session_key.clone());

        let api_sig = api_signature(&params, &self.lastfm.api_secret);

        let mut form: Vec<(String, String)> = params.into_iter().collect();
        form.push(("api_sig".into(), api_sig));
        form.push(("format".into(), "json".into()));
        form
    }

    pub async fn submit(&self, tracks: &[Track], artist: &str, album: &str) ->
        Result<Vec<ScrobbleResult>, ScrobbleError> {
        self.submit_at(tracks, artist, album, chrono::Utc::now().timestamp()).await
    }

    pub async fn submit_at(&self, tracks: &[Track], artist: &str, album: &str, now: i64) ->
        Result<Vec<ScrobbleResult>, ScrobbleError> {
        if tracks.len() > MAX_BATCH {
            warn!(count = tracks.len(), max = MAX_BATCH, "scrobble.batch.oversized");
        }

        let batch = ScrobbleBatch::new(tracks, artist, album, now, self.spacing);
        let form = self.signed_form(&batch);

        let reply = self.api.scrobble(&form).await?;
        let (accepted, ignored) = (reply.scrobbles.attr.accepted, reply.scrobbles.attr.ignored);
        let results = reply.into_results();

        for result in results.iter().filter(|r| r.is_ignored()) {
            warn!(
                track = %result.track,
                code = result.ignored_code,
                reason = result.ignored_message.as_deref().unwrap_or(""),
                "scrobble.ignored"
            );
        }
        info!(%artist, %album, submitted = batch.entries.len(), accepted, ignored,
            "scrobble.submitted");
        Ok(results)
    }
}
