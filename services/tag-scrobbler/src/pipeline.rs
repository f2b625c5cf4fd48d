//!
//! src/pipeline.rs  Andrew Belles  Oct 16th, 2026
//!
//! One invocation per inbound event:
//!     decode -> resolve album -> fetch tracklist -> scrobble
//!
//! Empty payloads, unmapped tags and empty tracklists end the invocation
//! quietly. Anything else is returned to the caller untouched so the
//! transport can redeliver the event
//!

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::Deserialize;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::ScrobbleError;
use crate::fetch::LastFmApi;
use crate::persistent::AlbumStore;
use crate::resolver::AlbumResolver;
use crate::scrobbler::ScrobbleSubmitter;
use crate::tracklist::TracklistFetcher;
use crate::types::{ScrobbleResult, TagId};

/// Inbound trigger `{ "data": "<base64>" }`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundEvent {
    #[serde(default)]
    pub data: Option<String>
}

#[cfg(test)]
impl InboundEvent {
    pub fn encode(payload: &str) -> Self {
        Self { data: Some(STANDARD.encode(payload)) }
    }
}

/// Decoded payload: a bare identifier or `{ "rfid": ..., "userId": ... }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRequest {
    pub tag: TagId,
    pub owner_id: Option<String>
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TagPayload {
    #[serde(default)]
    rfid: Option<String>,
    #[serde(default)]
    user_id: Option<String>
}

/// Base64 text when `data` decodes to readable UTF-8, otherwise `data`
/// itself taken as a plain payload
fn decode_data(data: &str) -> String {
    let decoded = STANDARD.decode(data)
        .map_err(|e| e.to_string())
        .and_then(|bytes| String::from_utf8(bytes).map_err(|e| e.to_string()))
        .and_then(|text| {
            match text.chars().any(|c| c.is_control() && !c.is_whitespace()) {
                true => Err("decoded text is not printable".to_string()),
                false => Ok(text)
            }
        });
    match decoded {
        Ok(text) => text,
        Err(reason) => {
            debug!(%reason, "pipeline.decode.plain");
            data.to_string()
        }
    }
}

/// None means there is nothing to do for this event
pub fn decode_event(event: &InboundEvent) -> Option<TagRequest> {
    let data = event.data.as_deref().map(str::trim).filter(|d| !d.is_empty())?;

    let text = decode_data(data);
    let text = text.trim();

    if text.starts_with('{') {
        let payload: TagPayload = match serde_json::from_str(text) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "pipeline.decode.json");
                return None;
            }
        };
        let tag = TagId::new(payload.rfid.as_deref().unwrap_or_default())?;
        let owner_id = payload.user_id
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        return Some(TagRequest { tag, owner_id });
    }

    TagId::new(text).map(|tag| TagRequest { tag, owner_id: None })
}

/// How an invocation ended when it did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    EmptyPayload,
    Unmapped,
    EmptyTracklist,
    Scrobbled(Vec<ScrobbleResult>)
}

#[derive(Clone)]
pub struct Pipeline {
    resolver: AlbumResolver,
    fetcher: TracklistFetcher,
    submitter: ScrobbleSubmitter
}

impl Pipeline {
    pub fn new(cfg: &AppConfig, store: Arc<dyn AlbumStore>, lastfm: Arc<dyn LastFmApi>) -> Self {
        Self {
            resolver: AlbumResolver::new(store),
            fetcher: TracklistFetcher::new(lastfm.clone()),
            submitter: ScrobbleSubmitter::new(lastfm, &cfg.lastfm, &cfg.scrobble)
        }
    }

    pub async fn handle(&self, event: &InboundEvent) -> Result<Outcome, ScrobbleError> {
        let span = info_span!("invocation", id = %Uuid::new_v4());
        self.run(event).instrument(span).await
    }

    async fn run(&self, event: &InboundEvent) -> Result<Outcome, ScrobbleError> {
        let Some(request) = decode_event(event) else {
            info!("pipeline.empty_payload");
            return Ok(Outcome::EmptyPayload);
        };
        info!(rfid = %request.tag, owner = ?request.owner_id, "pipeline.decoded");

        let Some(mapping) = self.resolver
            .resolve(&request.tag, request.owner_id.as_deref())
            .await?
        else {
            info!(rfid = %request.tag, "pipeline.unmapped");
            return Ok(Outcome::Unmapped);
        };

        let tracks = self.fetcher.fetch(&mapping.artist, &mapping.album).await;
        if tracks.is_empty() {
            info!(artist = %mapping.artist, album = %mapping.album, "pipeline.empty_tracklist");
            return Ok(Outcome::EmptyTracklist);
        }

        let results = self.submitter
            .submit(&tracks, &mapping.artist, &mapping.album)
            .await?;
        info!(rfid = %request.tag, scrobbled = results.len(), "pipeline.done");
        Ok(Outcome::Scrobbled(results))
    }
}
