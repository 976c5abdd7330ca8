//! Playback and offline-download core for the Thelden video catalog.
//!
//! [`player::PlaybackController`] drives a single media element through a
//! playback session, and [`downloads::DownloadManager`] captures catalog
//! items for offline viewing.

pub mod config;
pub mod downloads;
pub mod events;
pub mod logging;
pub mod models;
pub mod player;
pub mod storage;
pub mod utils;

#[cfg(test)]
mod test_utils;

pub use config::{Config, DownloadsConfig, PlaybackConfig};
pub use downloads::{DownloadManager, DownloadStatus, DownloadTask, DownloadedItem};
pub use events::{DownloadEvent, EnvironmentEvent, EventBus, Key};
pub use models::{ItemId, PlayableItem, PlaybackTarget, ShowId};
pub use player::{PlaybackController, PlayerHandle, PlayerService};
pub use storage::{BlobRegistry, DownloadStore, SqliteDownloadStore};
pub use utils::{DownloadError, PlaybackError};
