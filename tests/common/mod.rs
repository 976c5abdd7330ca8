#![allow(dead_code)]

pub mod fixtures;
pub mod mocks;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use thelden::config::DownloadsConfig;
use thelden::downloads::{DownloadManager, MediaFetcher};
use thelden::events::{DownloadEvent, EventSubscriber};
use thelden::player::{PlayerHandle, PlayerSnapshot};
use thelden::storage::{BlobRegistry, SqliteDownloadStore};

pub fn init_tracing() {
    thelden::logging::init(Some("thelden=debug"));
}

/// Download manager over an on-disk SQLite store in a temp directory
pub struct TestContext {
    pub manager: DownloadManager,
    pub blobs: BlobRegistry,
    pub config: DownloadsConfig,
    db_path: PathBuf,
    _temp_dir: TempDir,
}

impl TestContext {
    pub async fn new(fetcher: Arc<dyn MediaFetcher>) -> Self {
        Self::with_config(fetcher, DownloadsConfig::default()).await
    }

    pub async fn with_config(fetcher: Arc<dyn MediaFetcher>, config: DownloadsConfig) -> Self {
        init_tracing();
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("downloads.db");
        let blobs = BlobRegistry::new();
        let manager = open_manager(&db_path, fetcher, blobs.clone(), config.clone()).await;

        Self {
            manager,
            blobs,
            config,
            db_path,
            _temp_dir: temp_dir,
        }
    }

    /// A second manager over the same database file, as after a restart
    pub async fn reopen(&self, fetcher: Arc<dyn MediaFetcher>) -> DownloadManager {
        open_manager(&self.db_path, fetcher, BlobRegistry::new(), self.config.clone()).await
    }
}

async fn open_manager(
    path: &std::path::Path,
    fetcher: Arc<dyn MediaFetcher>,
    blobs: BlobRegistry,
    config: DownloadsConfig,
) -> DownloadManager {
    let store = SqliteDownloadStore::open(path)
        .await
        .expect("Failed to open download store");
    DownloadManager::new(Arc::new(store), fetcher, blobs, config)
        .await
        .expect("Failed to create download manager")
}

pub async fn next_event<F>(subscriber: &mut EventSubscriber<DownloadEvent>, predicate: F) -> DownloadEvent
where
    F: Fn(&DownloadEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match subscriber.recv().await {
                Some(event) if predicate(&event) => return event,
                Some(_) => {}
                None => panic!("download events closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for download event")
}

/// Poll the player until `predicate` holds. Each snapshot round trip lets
/// the service drain pending media and environment events.
pub async fn wait_for_snapshot<F>(handle: &PlayerHandle, predicate: F) -> PlayerSnapshot
where
    F: Fn(&PlayerSnapshot) -> bool,
{
    for _ in 0..200 {
        let snapshot = handle.snapshot().await.expect("player stopped");
        if predicate(&snapshot) {
            return snapshot;
        }
        tokio::task::yield_now().await;
    }
    panic!("player never reached the expected state");
}

/// Poll an arbitrary condition while giving the player service a chance to run
pub async fn eventually<F>(handle: &PlayerHandle, check: F)
where
    F: Fn() -> bool,
{
    for _ in 0..200 {
        if check() {
            return;
        }
        handle.snapshot().await.expect("player stopped");
        tokio::task::yield_now().await;
    }
    panic!("condition never became true");
}
