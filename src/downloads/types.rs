use serde::{Deserialize, Serialize};

use crate::models::{CatalogLookup, DownloadedContent, ItemId, PlaybackTarget};
use crate::storage::BlobHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    Downloading,
    /// Failed; kept visible until the grace period runs out
    Error,
}

/// An in-flight transfer as seen by the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadTask {
    pub item_id: ItemId,
    pub name: String,
    pub progress_percent: u8,
    pub status: DownloadStatus,
}

impl DownloadTask {
    pub(crate) fn new(item_id: ItemId, name: String) -> Self {
        Self {
            item_id,
            name,
            progress_percent: 0,
            status: DownloadStatus::Downloading,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == DownloadStatus::Error
    }
}

/// A persisted download with a freshly minted handle to its payload
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadedItem {
    pub item_id: ItemId,
    pub content: DownloadedContent,
    pub blob: BlobHandle,
    pub size_bytes: u64,
}

impl DownloadedItem {
    /// Offline playback target. Episodes are resolved back to their show
    /// through the catalog; `None` when the show no longer exists there.
    pub fn playback_target(&self, catalog: &dyn CatalogLookup) -> Option<PlaybackTarget> {
        let target = match &self.content {
            DownloadedContent::Movie(movie) => PlaybackTarget::movie(movie.clone()),
            DownloadedContent::Episode {
                episode,
                show_title,
            } => {
                let show = catalog.find_show_by_title(show_title)?;
                PlaybackTarget::episode(show, episode.clone())
            }
        };
        Some(target.with_blob(self.blob.clone()))
    }
}
