//!
//! src/errors.rs  Andrew Belles  Oct 16th, 2026
//!
//! Defines enums and methods of error conversion
//! for errors the scrobbler uses
//!
//! Only failures that should be redelivered by the hosting transport
//! become a ScrobbleError. Empty payloads, unmapped tags and empty
//! tracklists are outcomes, not errors (see src/pipeline.rs)
//!

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScrobbleError {
    #[error("config error: {0}")]
    Config(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("db error: {0}")]
    Db(String),
    #[error("album store is missing the index required for rfid lookups: {0}")]
    MissingIndex(String),
    #[error("last.fm error {code}: {message}")]
    Api { code: i64, message: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0} invocation(s) failed and must be redelivered")]
    Redeliver(usize)
}

/// Errors raised by an AlbumStore implementation. Converted by the resolver
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),
    #[error("store backend: {0}")]
    Backend(String)
}

impl From<reqwest::Error> for ScrobbleError {
    fn from(e: reqwest::Error) -> Self { ScrobbleError::Http(e.to_string()) }
}

impl From<serde_json::Error> for ScrobbleError {
    fn from(e: serde_json::Error) -> Self { ScrobbleError::Parse(e.to_string()) }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self { StoreError::Backend(e.to_string()) }
}

impl From<StoreError> for ScrobbleError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::FailedPrecondition(detail) => ScrobbleError::MissingIndex(detail),
            StoreError::Backend(detail) => ScrobbleError::Db(detail)
        }
    }
}
