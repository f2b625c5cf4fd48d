//!
//! src/testing.rs  Andrew Belles  Oct 16th, 2026
//!
//! In-process stand-in for Last.fm used by the unit tests. Replies go
//! through the same decode path as the real client
//!

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::errors::ScrobbleError;
use crate::fetch::{LastFmApi, decode_reply};
use crate::types::{AlbumInfoReply, ScrobbleReply};

pub type Form = Vec<(String, String)>;

pub struct FakeLastFm {
    album: Value,
    scrobble: Option<Value>,
    unreachable: bool,
    album_calls: Mutex<Vec<(String, String)>>,
    submissions: Mutex<Vec<Form>>
}

impl FakeLastFm {
    pub fn with_album_reply(album: Value) -> Self {
        Self {
            album,
            scrobble: None,
            unreachable: false,
            album_calls: Mutex::new(Vec::new()),
            submissions: Mutex::new(Vec::new())
        }
    }

    pub fn with_tracks(names: &[&str]) -> Self {
        let track: Vec<Value> = names.iter().map(|n| json!({ "name": n })).collect();
        Self::with_album_reply(json!({ "album": { "tracks": { "track": track } } }))
    }

    pub fn unreachable() -> Self {
        Self { unreachable: true, ..Self::with_tracks(&[]) }
    }

    pub fn scrobble_reply(mut self, reply: Value) -> Self {
        self.scrobble = Some(reply);
        self
    }

    pub fn album_calls(&self) -> Vec<(String, String)> {
        self.album_calls.lock().unwrap().clone()
    }

    pub fn submissions(&self) -> Vec<Form> {
        self.submissions.lock().unwrap().clone()
    }
}

pub fn form_value<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
    form.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

#[async_trait]
impl LastFmApi for FakeLastFm {
    async fn album_info(&self, artist: &str, album: &str) ->
        Result<AlbumInfoReply, ScrobbleError> {
        self.album_calls.lock().unwrap().push((artist.to_string(), album.to_string()));
        if self.unreachable {
            return Err(ScrobbleError::Http("connection refused".into()));
        }
        decode_reply(self.album.clone())
    }

    async fn scrobble(&self, form: &[(String, String)]) ->
        Result<ScrobbleReply, ScrobbleError> {
        self.submissions.lock().unwrap().push(form.to_vec());
        if self.unreachable {
            return Err(ScrobbleError::Http("connection refused".into()));
        }
        let reply = self.scrobble.clone().unwrap_or_else(|| {
            let accepted = form.iter().filter(|(k, _)| k.starts_with("track[")).count();
            json!({ "scrobbles": { "@attr": { "accepted": accepted, "ignored": 0 } } })
        });
        decode_reply(reply)
    }
}
