//!
//! src/persistent.rs  Andrew Belles  Oct 16th, 2026
//!
//! Album mapping store. The rows are written by the management UI,
//! the pipeline only ever reads one at a time
//!

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{sqlite::SqlitePoolOptions, sqlite::SqliteConnectOptions, Pool, Row, Sqlite};
use tracing::debug;

use crate::config::StoreConfig;
use crate::errors::StoreError;
use crate::types::{AlbumMapping, TagId};

/// Stored rfid reduced the way `TagId::match_key` reduces a scan
macro_rules! rfid_key {
    () => { "REPLACE(REPLACE(REPLACE(UPPER(rfid), ':', ''), '-', ''), ' ', '')" };
}

/// Index a lookup across every owner depends on
pub const RFID_INDEX: &str = "idx_albums_rfid";
const RFID_INDEX_DDL: &str =
    concat!("CREATE INDEX IF NOT EXISTS idx_albums_rfid ON albums(", rfid_key!(), ");");

#[async_trait]
pub trait AlbumStore: Send + Sync {
    /// First mapping whose rfid equals `rfid`, inside one owner's albums
    /// when `owner_id` is given and across all owners otherwise
    async fn find_by_rfid(&self, rfid: &TagId, owner_id: Option<&str>) ->
        Result<Option<AlbumMapping>, StoreError>;
}

pub struct SqliteAlbumStore {
    pool: Pool<Sqlite>
}

impl SqliteAlbumStore {

    async fn ensure_schema(pool: &Pool<Sqlite>) -> Result<(), StoreError> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS albums (
              id          TEXT PRIMARY KEY,
              owner_id    TEXT,
              rfid        TEXT NOT NULL,
              artist      TEXT NOT NULL,
              album       TEXT NOT NULL,
              created_at  INTEGER NOT NULL
            );
            "
        ).execute(pool).await?;

        sqlx::query(concat!(
            "CREATE INDEX IF NOT EXISTS idx_albums_owner_rfid ON albums(owner_id, ",
            rfid_key!(), ");"
        )).execute(pool).await?;

        Ok(())
    }

    pub async fn init(cfg: &StoreConfig) -> Result<Self, StoreError> {
        let is_memory = cfg.db_url == "sqlite::memory:";

        let mut opts = SqliteConnectOptions::from_str(&cfg.db_url)?
            .create_if_missing(true);

        // WAL is file-only
        if !is_memory {
            opts = opts.journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                       .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        }

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(if is_memory {1} else {8})
            .connect_with(opts)
            .await?;

        Self::ensure_schema(&pool).await?;
        let this = Self { pool };
        if cfg.ensure_rfid_index {
            this.create_rfid_index().await?;
        }
        Ok(this)
    }

    pub async fn create_rfid_index(&self) -> Result<(), StoreError> {
        sqlx::query(RFID_INDEX_DDL).execute(&self.pool).await?;
        Ok(())
    }

    async fn has_rfid_index(&self) -> Result<bool, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = ?1;"
        )
        .bind(RFID_INDEX)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    fn row_to_mapping(row: &sqlx::sqlite::SqliteRow) -> Result<AlbumMapping, StoreError> {
        Ok( AlbumMapping {
            id: row.try_get("id")?,
            rfid: row.try_get("rfid")?,
            artist: row.try_get("artist")?,
            album: row.try_get("album")?,
            owner_id: row.try_get("owner_id")?
        })
    }
}

#[async_trait]
impl AlbumStore for SqliteAlbumStore {
    async fn find_by_rfid(&self, rfid: &TagId, owner_id: Option<&str>) ->
        Result<Option<AlbumMapping>, StoreError> {
        let row = match owner_id {
            Some(owner) => {
                sqlx::query(concat!(
                    "SELECT id, owner_id, rfid, artist, album FROM albums
                      WHERE owner_id = ?1 AND ", rfid_key!(), " = ?2
                      ORDER BY created_at ASC, id ASC
                      LIMIT 1;"
                ))
                .bind(owner)
                .bind(rfid.match_key())
                .fetch_optional(&self.pool)
                .await?
            }
            None => {
                // full scans across owners are refused, as a collection
                // group query without its index would be
                if !self.has_rfid_index().await? {
                    return Err(StoreError::FailedPrecondition(format!(
                        "the query requires an index. Create it with: {RFID_INDEX_DDL}"
                    )));
                }
                sqlx::query(concat!(
                    "SELECT id, owner_id, rfid, artist, album FROM albums
                      WHERE ", rfid_key!(), " = ?1
                      ORDER BY created_at ASC, id ASC
                      LIMIT 1;"
                ))
                .bind(rfid.match_key())
                .fetch_optional(&self.pool)
                .await?
            }
        };

        debug!(rfid = %rfid, owner = ?owner_id, found = row.is_some(), "store.lookup");
        row.as_ref().map(Self::row_to_mapping).transpose()
    }
}

#[cfg(test)]
impl SqliteAlbumStore {
    fn now() -> i64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default()
    }

    pub async fn memory(ensure_rfid_index: bool) -> Result<Self, StoreError> {
        Self::init(&StoreConfig {
            db_url: "sqlite::memory:".to_string(),
            ensure_rfid_index
        }).await
    }

    pub async fn insert_album(
        &self, owner_id: Option<&str>, rfid: &str, artist: &str, album: &str
    ) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            r"
            INSERT INTO albums (id, owner_id, rfid, artist, album, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6);
            "
        )
        .bind(&id)
        .bind(owner_id)
        .bind(rfid)
        .bind(artist)
        .bind(album)
        .bind(Self::now())
        .execute(&self.pool)
        .await?;
        Ok(id)
    }
}
