//!
//! src/resolver.rs  Andrew Belles  Oct 16th, 2026
//!
//! Resolves a scanned tag to the album mapped to it
//!

use std::sync::Arc;

use tracing::{error, info};

use crate::errors::{ScrobbleError, StoreError};
use crate::persistent::AlbumStore;
use crate::types::{AlbumMapping, TagId};

#[derive(Clone)]
pub struct AlbumResolver {
    store: Arc<dyn AlbumStore>
}

impl AlbumResolver {
    pub fn new(store: Arc<dyn AlbumStore>) -> Self {
        Self { store }
    }

    /// `Ok(None)` is an unmapped tag. A missing index surfaces as
    /// MissingIndex so it lands in alerting instead of looking transient
    pub async fn resolve(&self, rfid: &TagId, owner_id: Option<&str>) ->
        Result<Option<AlbumMapping>, ScrobbleError> {
        match self.store.find_by_rfid(rfid, owner_id).await {
            Ok(Some(mapping)) => {
                info!(rfid = %rfid, id = %mapping.id, artist = %mapping.artist,
                    album = %mapping.album, "resolver.hit");
                Ok(Some(mapping))
            }
            Ok(None) => {
                info!(rfid = %rfid, owner = ?owner_id, "resolver.miss");
                Ok(None)
            }
            Err(StoreError::FailedPrecondition(detail)) => {
                error!(rfid = %rfid, %detail, "resolver.missing_index");
                Err(ScrobbleError::MissingIndex(detail))
            }
            Err(e) => Err(e.into())
        }
    }
}
