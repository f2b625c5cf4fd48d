//!
//! src/fetch.rs  Andrew Belles  Oct 16th, 2026
//!
//! Defines the Last.fm client: building requests, sending them,
//! and turning the reply (or its error body) into typed values
//!

use async_trait::async_trait;
use reqwest::{Client, header, redirect, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::{HttpConfig, LastFmConfig};
use crate::errors::ScrobbleError;
use crate::types::{AlbumInfoReply, ScrobbleReply};

pub const METHOD_ALBUM_INFO: &str = "album.getInfo";
pub const METHOD_TRACK_SCROBBLE: &str = "track.scrobble";

/// Seam between the pipeline and the Last.fm web service
#[async_trait]
pub trait LastFmApi: Send + Sync {
    /// album.getInfo for (artist, album)
    async fn album_info(&self, artist: &str, album: &str) ->
        Result<AlbumInfoReply, ScrobbleError>;

    /// POST an already signed track.scrobble form
    async fn scrobble(&self, form: &[(String, String)]) ->
        Result<ScrobbleReply, ScrobbleError>;
}

/// Client building functionality
fn client_helper(http: &HttpConfig) -> reqwest::ClientBuilder {
    let builder = Client::builder()
        .connect_timeout(http.connect_timeout)
        .pool_max_idle_per_host(http.pool_max_idle_per_host)
        .pool_idle_timeout(Some(http.pool_idle_timeout))
        .redirect(redirect::Policy::limited(http.max_redirects as usize))
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")));
    match http.timeout {
        Some(timeout) => builder.timeout(timeout),
        None => builder
    }
}

fn client_with_headers(http: &HttpConfig, headers: header::HeaderMap) ->
    Result<Client, ScrobbleError> {
    client_helper(http)
        .default_headers(headers)
        .build()
        .map_err(|e| ScrobbleError::Http(format!("build client: {e}")))
}

/// Last.fm answers failures with `{"error": code, "message": ...}`,
/// sometimes under a 200 and sometimes under a 4xx
pub fn api_failure(value: &serde_json::Value) -> Option<ScrobbleError> {
    let code = value.get("error")?;
    let code = code.as_i64()
        .or_else(|| code.as_str().and_then(|s| s.trim().parse().ok()))?;
    if code == 0 {
        return None;
    }
    let message = value.get("message")
        .and_then(|m| m.as_str())
        .unwrap_or_default()
        .to_string();
    Some( ScrobbleError::Api { code, message } )
}

pub fn decode_reply<T: DeserializeOwned>(value: serde_json::Value) ->
    Result<T, ScrobbleError> {
    if let Some(failure) = api_failure(&value) {
        return Err(failure);
    }
    Ok( serde_json::from_value(value)? )
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) ->
    Result<T, ScrobbleError> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;

    let value = match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(v) => v,
        Err(_) if !status.is_success() => {
            return Err(ScrobbleError::Http(format!("status {status}: {body}")));
        }
        Err(e) => return Err(e.into())
    };

    if let Some(failure) = api_failure(&value) {
        return Err(failure);
    }
    if !status.is_success() {
        return Err(ScrobbleError::Http(format!("status {status}: {body}")));
    }
    decode_reply(value)
}

#[derive(Clone, Debug)]
pub struct LastFmClient {
    pub http: Client,
    pub cfg: LastFmConfig,
}

impl LastFmClient {
    pub fn new(http_cfg: &HttpConfig, last_cfg: &LastFmConfig) ->
        Result<Self, ScrobbleError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json")
        );
        let http = client_with_headers(http_cfg, headers)?;
        Ok( Self{ http, cfg: last_cfg.clone() })
    }

    /// GET /?method=album.getInfo&artist=...&album=...&api_key=...&format=json
    pub fn album_info_request(&self, artist: &str, album: &str) -> RequestBuilder {
        self.http.get(self.cfg.base_url.clone()).query(&[
            ("method", METHOD_ALBUM_INFO),
            ("artist", artist),
            ("album", album),
            ("api_key", self.cfg.api_key.as_str()),
            ("format", "json"),
        ])
    }

    /// POST / (application/x-www-form-urlencoded)
    pub fn scrobble_request(&self, form: &[(String, String)]) -> RequestBuilder {
        self.http.post(self.cfg.base_url.clone()).form(form)
    }
}

#[async_trait]
impl LastFmApi for LastFmClient {
    async fn album_info(&self, artist: &str, album: &str) ->
        Result<AlbumInfoReply, ScrobbleError> {
        debug!(%artist, %album, "lastfm.album_info");
        send_json(self.album_info_request(artist, album)).await
    }

    async fn scrobble(&self, form: &[(String, String)]) ->
        Result<ScrobbleReply, ScrobbleError> {
        debug!(fields = form.len(), "lastfm.scrobble");
        send_json(self.scrobble_request(form)).await
    }
}
