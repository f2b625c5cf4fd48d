//!
//! src/config.rs  Andrew Belles  Oct 16th, 2026
//!
//! Loads the scrobbler configuration from the environment once at
//! startup. Every component receives the pieces it needs by reference
//!

use std::fmt;
use std::time;
use url::Url;
use crate::errors::ScrobbleError;

/// Constants for Last.fm
pub const LASTFM_BASE_URL: &str = "https://ws.audioscrobbler.com/2.0/";
pub const SCROBBLE_SPACING_SECS: i64 = 180;

/// Constants for the hosting loop
pub const LISTENER_MAX_IN_FLIGHT: usize = 16;

/// Constants for HTTP Config
pub const HTTP_CONNECT_TIMEOUT: u64 = 2000;
pub const HTTP_POOL_MAX_IDLE: usize = 16;
pub const HTTP_POOL_IDLE_TIMEOUT: u64 = 90000;
pub const HTTP_MAX_REDIRECTS: u8 = 4;

pub const ALBUM_DB_URL: &str = "sqlite:./data/albums.db";

/// Wrapper over env::var to return an invalid enviroment var error
fn env_check(s: &str) -> Result<String, ScrobbleError> {
    match std::env::var(s) {
        Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ScrobbleError::Config(format!("{s} was not set"))),
    }
}

fn env_or<T: std::str::FromStr>(s: &str, default: T) -> T {
    std::env::var(s)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Ensures that url is https
fn ensure_https(url: &Url) -> Result<(), String> {
    if url.scheme() == "https" {
        Ok(())
    } else {
        Err(format!("URL must be https: {url}"))
    }
}

/// Url::join drops the last segment unless the path ends in '/'
fn ensure_trailing_slash(url: &mut Url) {
    if !url.path().ends_with('/') {
        let mut path = url.path().to_string();
        path.push('/');
        url.set_path(&path);
    }
}

///
/// Credentials and endpoint for the Last.fm web service
///
#[derive(Clone)]
pub struct LastFmConfig {
    pub base_url: Url,
    pub api_key: String,
    pub api_secret: String,
    pub session_key: String
}

impl LastFmConfig {
    pub fn parse_base_url(raw: &str) -> Result<Url, ScrobbleError> {
        let mut base_url = Url::parse(raw)
            .map_err(|e| ScrobbleError::Config(
                format!("LASTFM_BASE_URL invalid {e}")
            ))?;
        ensure_https(&base_url).map_err(ScrobbleError::Config)?;
        ensure_trailing_slash(&mut base_url);
        Ok(base_url)
    }
}

// secrets never reach the logs
impl fmt::Debug for LastFmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LastFmConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("session_key", &"<redacted>")
            .finish()
    }
}

fn build_lastfm() -> Result<LastFmConfig, ScrobbleError> {
    let api_key     = env_check("LASTFM_API_KEY")?;
    let api_secret  = env_check("LASTFM_API_SECRET")?;
    let session_key = env_check("LASTFM_SESSION_KEY")?;

    let base_url = std::env::var("LASTFM_BASE_URL")
        .unwrap_or_else(|_| LASTFM_BASE_URL.to_string());
    let base_url = LastFmConfig::parse_base_url(&base_url)?;

    Ok( LastFmConfig { base_url, api_key, api_secret, session_key } )
}

///
/// Configuration for Http client. No request timeout unless asked for,
/// the hosting system's invocation limit is the outer bound
///
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Option<time::Duration>,
    pub connect_timeout: time::Duration,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: time::Duration,
    pub max_redirects: u8
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            connect_timeout: time::Duration::from_millis(HTTP_CONNECT_TIMEOUT),
            pool_max_idle_per_host: HTTP_POOL_MAX_IDLE,
            pool_idle_timeout: time::Duration::from_millis(HTTP_POOL_IDLE_TIMEOUT),
            max_redirects: HTTP_MAX_REDIRECTS
        }
    }
}

fn build_http() -> HttpConfig {
    let timeout = std::env::var("HTTP_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(time::Duration::from_millis);
    HttpConfig { timeout, ..HttpConfig::default() }
}

///
/// Configuration for the album mapping store
///
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub db_url: String,
    pub ensure_rfid_index: bool
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_url: ALBUM_DB_URL.to_string(),
            ensure_rfid_index: true
        }
    }
}

fn build_store() -> StoreConfig {
    let db_url = std::env::var("ALBUM_DB_URL")
        .unwrap_or_else(|_| ALBUM_DB_URL.to_string());
    let ensure_rfid_index = env_or("ALBUM_DB_ENSURE_INDEX", true);
    StoreConfig { db_url, ensure_rfid_index }
}

#[derive(Debug, Clone)]
pub struct ScrobbleConfig {
    pub spacing_secs: i64
}

impl Default for ScrobbleConfig {
    fn default() -> Self {
        Self { spacing_secs: SCROBBLE_SPACING_SECS }
    }
}

impl ScrobbleConfig {
    /// Timestamps only increase toward now for a positive spacing
    pub fn new(spacing_secs: i64) -> Result<Self, ScrobbleError> {
        if spacing_secs <= 0 {
            return Err(ScrobbleError::Config(format!(
                "SCROBBLE_SPACING_SECS must be positive, got {spacing_secs}"
            )));
        }
        Ok( Self { spacing_secs } )
    }
}

fn build_scrobble() -> Result<ScrobbleConfig, ScrobbleError> {
    ScrobbleConfig::new(env_or("SCROBBLE_SPACING_SECS", SCROBBLE_SPACING_SECS))
}

///
/// Hosting loop limits
///
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub max_in_flight: usize
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self { max_in_flight: LISTENER_MAX_IN_FLIGHT }
    }
}

impl ListenerConfig {
    pub fn new(max_in_flight: usize) -> Result<Self, ScrobbleError> {
        if max_in_flight == 0 {
            return Err(ScrobbleError::Config(
                "LISTENER_MAX_IN_FLIGHT must be at least 1".to_string()
            ));
        }
        Ok( Self { max_in_flight } )
    }
}

fn build_listener() -> Result<ListenerConfig, ScrobbleError> {
    ListenerConfig::new(env_or("LISTENER_MAX_IN_FLIGHT", LISTENER_MAX_IN_FLIGHT))
}

///
/// Configuration for Logger
///

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json
}

impl LogFormat {
    pub fn parse(s: &str) -> Option<LogFormat> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Some(LogFormat::Pretty),
            "json"   => Some(LogFormat::Json),
            _ => None
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter_directives: String,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub include_file_line: bool,
    pub include_target: bool
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter_directives: "info,tag_scrobbler=debug,sqlx=warn,reqwest=warn".to_string(),
            format: LogFormat::Json,
            with_ansi: true,
            include_file_line: true,
            include_target: true
        }
    }
}

fn build_logging() -> LoggingConfig {
    let format = std::env::var("LOG_FORMAT")
        .ok()
        .and_then(|v| LogFormat::parse(&v))
        .unwrap_or(LogFormat::Json);
    LoggingConfig { format, ..LoggingConfig::default() }
}

///
/// AppConfig which holds everything the pipeline is constructed from
///
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub lastfm: LastFmConfig,
    pub http: HttpConfig,
    pub store: StoreConfig,
    pub scrobble: ScrobbleConfig,
    pub listener: ListenerConfig,
    pub logging: LoggingConfig
}

///
/// Return all environment variables to caller at program start.
///
pub fn load_config() -> Result<AppConfig, ScrobbleError> {
    dotenvy::dotenv().ok();

    let lastfm   = build_lastfm()?;
    let http     = build_http();
    let store    = build_store();
    let scrobble = build_scrobble()?;
    let listener = build_listener()?;
    let logging  = build_logging();

    Ok( AppConfig { lastfm, http, store, scrobble, listener, logging } )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_must_be_https() {
        let err = LastFmConfig::parse_base_url("http://ws.audioscrobbler.com/2.0/");
        assert!(matches!(err, Err(ScrobbleError::Config(_))));
    }

    #[test]
    fn base_url_gains_trailing_slash() -> Result<(), ScrobbleError> {
        let url = LastFmConfig::parse_base_url("https://ws.audioscrobbler.com/2.0")?;
        assert_eq!(url.as_str(), "https://ws.audioscrobbler.com/2.0/");
        Ok(())
    }

    #[test]
    fn debug_redacts_secrets() -> Result<(), ScrobbleError> {
        let cfg = LastFmConfig {
            base_url: LastFmConfig::parse_base_url(LASTFM_BASE_URL)?,
            api_key: "key".into(),
            api_secret: "very-secret".into(),
            session_key: "session-secret".into()
        };
        let shown = format!("{cfg:?}");
        assert!(!shown.contains("very-secret"));
        assert!(!shown.contains("session-secret"));
        assert!(shown.contains("key"));
        Ok(())
    }

    #[test]
    fn spacing_must_be_positive() -> Result<(), ScrobbleError> {
        assert!(matches!(ScrobbleConfig::new(0), Err(ScrobbleError::Config(_))));
        assert!(matches!(ScrobbleConfig::new(-180), Err(ScrobbleError::Config(_))));
        assert_eq!(ScrobbleConfig::new(180)?.spacing_secs, 180);
        Ok(())
    }

    #[test]
    fn listener_needs_one_slot() -> Result<(), ScrobbleError> {
        assert!(matches!(ListenerConfig::new(0), Err(ScrobbleError::Config(_))));
        assert_eq!(ListenerConfig::new(4)?.max_in_flight, 4);
        Ok(())
    }

    #[test]
    fn log_format_parse() {
        assert_eq!(LogFormat::parse(" Pretty "), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::parse("json"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("xml"), None);
    }
}
