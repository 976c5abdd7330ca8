use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, trace};
use uuid::Uuid;

const BLOB_URL_PREFIX: &str = "blob:thelden/";

/// Binary payload together with its media type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub data: Bytes,
    pub content_type: String,
}

impl Blob {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Revocable reference to a payload registered in a [`BlobRegistry`].
///
/// Handles are plain URLs; cloning one does not extend the payload's
/// lifetime. Whoever holds the last reference revokes it explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobHandle {
    url: String,
}

impl BlobHandle {
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Registry of minted payload URLs shared between the download manager and
/// playback surfaces.
#[derive(Debug, Clone, Default)]
pub struct BlobRegistry {
    entries: Arc<RwLock<HashMap<String, Blob>>>,
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a payload and return a fresh URL for it
    pub fn mint(&self, data: Bytes, content_type: impl Into<String>) -> BlobHandle {
        let url = format!("{}{}", BLOB_URL_PREFIX, Uuid::new_v4());
        let blob = Blob {
            data,
            content_type: content_type.into(),
        };
        trace!("Minting {} ({} bytes)", url, blob.len());

        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.clone(), blob);

        BlobHandle { url }
    }

    /// Release a handle. Returns false if it was already revoked.
    pub fn revoke(&self, handle: &BlobHandle) -> bool {
        let removed = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle.url)
            .is_some();

        if removed {
            debug!("Revoked {}", handle.url);
        }
        removed
    }

    pub fn resolve(&self, url: &str) -> Option<Blob> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned()
    }

    pub fn is_live(&self, handle: &BlobHandle) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&handle.url)
    }

    /// Number of handles minted and not yet revoked
    pub fn live_count(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_blob_url(url: &str) -> bool {
        url.starts_with(BLOB_URL_PREFIX)
    }
}
