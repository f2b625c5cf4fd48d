//!
//! src/types.rs  Andrew Belles  Oct 16th, 2026
//!
//! Domain types that flow through one pipeline invocation, and the
//! Last.fm reply shapes they are decoded from
//!

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Value read off an rfid/nfc tag. Trimmed, and byte sequences such as
/// `04 a3 1b` or `04-A3-1B` are rewritten as `04:A3:1B`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagId(String);

impl TagId {
    pub fn new(raw: &str) -> Option<TagId> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some( TagId(Self::canonical_bytes(trimmed).unwrap_or_else(|| trimmed.to_string())) )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Uppercase with spaces, ':' and '-' removed. The album store reduces
    /// stored rfids to the same key before comparing
    pub fn match_key(&self) -> String {
        self.0.chars()
            .filter(|c| !matches!(c, ' ' | ':' | '-'))
            .map(|c| c.to_ascii_uppercase())
            .collect()
    }

    fn canonical_bytes(s: &str) -> Option<String> {
        let groups: Vec<&str> = s
            .split(|c: char| c.is_whitespace() || c == ':' || c == '-')
            .filter(|g| !g.is_empty())
            .collect();
        let delimited = groups.len() > 1;
        let all_bytes = groups.iter()
            .all(|g| g.len() == 2 && g.chars().all(|c| c.is_ascii_hexdigit()));
        if !delimited || !all_bytes {
            return None;
        }
        Some( groups.join(":").to_ascii_uppercase() )
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tag -> album association, owned by the management UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlbumMapping {
    pub id: String,
    pub rfid: String,
    pub artist: String,
    pub album: String,
    pub owner_id: Option<String>
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub name: String
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrobbleEntry {
    pub artist: String,
    pub album: String,
    pub track: String,
    pub timestamp: i64
}

/// Ordered entries with strictly increasing timestamps, last one is `now`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrobbleBatch {
    pub entries: Vec<ScrobbleEntry>
}

/// Per-track echo from track.scrobble, only ever logged
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrobbleResult {
    pub artist: String,
    pub album: Option<String>,
    pub track: String,
    pub timestamp: Option<i64>,
    pub ignored_code: i64,
    pub ignored_message: Option<String>
}

impl ScrobbleResult {
    pub fn is_ignored(&self) -> bool {
        self.ignored_code != 0
    }
}

///
/// Last.fm reply shapes
///

/// Last.fm collapses one-element lists into a bare object
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T)
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item]
        }
    }
}

/// Numbers that arrive as either `1` or `"1"`
fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_value(serde_json::Value::deserialize(deserializer)?)
}

/// Same as `lenient_i64`, with blank, null and unreadable values read as
/// absent. Used for echo fields that are only ever logged
fn lenient_opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) if s.trim().is_empty() => Ok(None),
        other => Ok(lenient_value::<D::Error>(other).ok())
    }
}

fn lenient_value<E: serde::de::Error>(value: serde_json::Value) -> Result<i64, E> {
    match value {
        serde_json::Value::Number(n) => n.as_i64()
            .ok_or_else(|| E::custom(format!("not an integer: {n}"))),
        serde_json::Value::String(s) if s.trim().is_empty() => Ok(0),
        serde_json::Value::String(s) => s.trim().parse::<i64>()
            .map_err(|e| E::custom(format!("bad integer {s:?}: {e}"))),
        serde_json::Value::Null => Ok(0),
        other => Err(E::custom(format!("expected integer, got {other}")))
    }
}

#[derive(Debug, Deserialize)]
pub struct AlbumInfoReply {
    pub album: AlbumInfo
}

#[derive(Debug, Deserialize)]
pub struct AlbumInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tracks: Option<AlbumTracks>
}

#[derive(Debug, Deserialize)]
pub struct AlbumTracks {
    #[serde(default)]
    pub track: Option<OneOrMany<TrackEntry>>
}

#[derive(Debug, Deserialize)]
pub struct TrackEntry {
    pub name: String
}

impl AlbumInfoReply {
    /// Tracks in the catalog's own order, empty when the album has none
    pub fn into_tracks(self) -> Vec<Track> {
        self.album.tracks
            .and_then(|t| t.track)
            .map(OneOrMany::into_vec)
            .unwrap_or_default()
            .into_iter()
            .map(|t| Track { name: t.name })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct ScrobbleReply {
    pub scrobbles: Scrobbles
}

#[derive(Debug, Deserialize)]
pub struct Scrobbles {
    #[serde(default)]
    pub scrobble: Option<OneOrMany<ScrobbleEcho>>,
    #[serde(rename = "@attr", default)]
    pub attr: ScrobbleCounts
}

#[derive(Debug, Default, Deserialize)]
pub struct ScrobbleCounts {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub accepted: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub ignored: i64
}

#[derive(Debug, Default, Deserialize)]
pub struct TextField {
    #[serde(rename = "#text", default)]
    pub text: String
}

#[derive(Debug, Default, Deserialize)]
pub struct IgnoredMessage {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub code: i64,
    #[serde(rename = "#text", default)]
    pub text: String
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrobbleEcho {
    #[serde(default)]
    pub artist: TextField,
    #[serde(default)]
    pub album: Option<TextField>,
    #[serde(default)]
    pub track: TextField,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub ignored_message: IgnoredMessage
}

impl From<ScrobbleEcho> for ScrobbleResult {
    fn from(echo: ScrobbleEcho) -> Self {
        let message = echo.ignored_message.text.trim().to_string();
        ScrobbleResult {
            artist: echo.artist.text,
            album: echo.album.map(|a| a.text).filter(|a| !a.is_empty()),
            track: echo.track.text,
            timestamp: echo.timestamp,
            ignored_code: echo.ignored_message.code,
            ignored_message: (!message.is_empty()).then_some(message)
        }
    }
}

impl ScrobbleReply {
    pub fn into_results(self) -> Vec<ScrobbleResult> {
        self.scrobbles.scrobble
            .map(OneOrMany::into_vec)
            .unwrap_or_default()
            .into_iter()
            .map(ScrobbleResult::from)
            .collect()
    }
}
