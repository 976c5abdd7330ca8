use anyhow::Context;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::fetcher::{HttpFetcher, MediaFetcher};
use super::transfer::stream_to_payload;
use super::types::{DownloadStatus, DownloadTask, DownloadedItem};
use crate::config::DownloadsConfig;
use crate::events::{DownloadEvent, EventBus, EventSubscriber};
use crate::models::{DownloadedContent, ItemId, PlayableItem};
use crate::storage::{BlobHandle, BlobRegistry, DownloadStore, SqliteDownloadStore, StoredDownload};
use crate::utils::DownloadError;

const EVENT_CAPACITY: usize = 256;

struct ActiveDownload {
    task: DownloadTask,
    cancel: CancellationToken,
    /// Distinguishes this run from earlier runs for the same item
    generation: u64,
}

#[derive(Default)]
struct State {
    active: HashMap<ItemId, ActiveDownload>,
    /// Persisted ids and their payload sizes
    completed: HashMap<ItemId, u64>,
    /// Handles handed out by the last `list_completed`
    minted: HashMap<ItemId, BlobHandle>,
    /// Cancelled runs that may still write a payload, by generation.
    /// The item cannot be restarted until its run has cleaned up.
    discarding: HashMap<ItemId, u64>,
    /// Bumped whenever `completed` changes outside `list_completed`
    index_version: u64,
    next_generation: u64,
}

impl State {
    fn owns(&self, id: ItemId, generation: u64) -> bool {
        self.active
            .get(&id)
            .is_some_and(|entry| entry.generation == generation)
    }

    fn remove_if_owned(&mut self, id: ItemId, generation: u64) -> bool {
        if self.owns(id, generation) {
            self.active.remove(&id);
            true
        } else {
            false
        }
    }

    /// Take `id` out of the active set and remember its run until that run
    /// has finished discarding.
    fn abandon(&mut self, id: ItemId) -> Option<ActiveDownload> {
        let entry = self.active.remove(&id)?;
        self.discarding.insert(id, entry.generation);
        Some(entry)
    }

    fn finish_discard(&mut self, id: ItemId, generation: u64) -> bool {
        if self.discarding.get(&id) == Some(&generation) {
            self.discarding.remove(&id);
            true
        } else {
            false
        }
    }
}

struct Inner {
    store: Arc<dyn DownloadStore>,
    fetcher: Arc<dyn MediaFetcher>,
    blobs: BlobRegistry,
    events: EventBus<DownloadEvent>,
    config: DownloadsConfig,
    state: Mutex<State>,
    /// Parent of every per-download token
    shutdown: CancellationToken,
}

/// Captures media for offline playback.
///
/// At most one transfer runs per item id, and an item that is already
/// persisted is never fetched again. Cloning the manager shares the same
/// state.
#[derive(Clone)]
pub struct DownloadManager {
    inner: Arc<Inner>,
}

impl DownloadManager {
    /// Build a manager over the given collaborators, indexing whatever the
    /// store already holds.
    pub async fn new(
        store: Arc<dyn DownloadStore>,
        fetcher: Arc<dyn MediaFetcher>,
        blobs: BlobRegistry,
        config: DownloadsConfig,
    ) -> anyhow::Result<Self> {
        let existing = store
            .get_all()
            .await
            .context("Failed to index stored downloads")?;

        let mut state = State::default();
        for record in &existing {
            state.completed.insert(record.id(), record.size_bytes());
        }
        info!("Download manager ready with {} stored items", existing.len());

        Ok(Self {
            inner: Arc::new(Inner {
                store,
                fetcher,
                blobs,
                events: EventBus::new(EVENT_CAPACITY),
                config,
                state: Mutex::new(state),
                shutdown: CancellationToken::new(),
            }),
        })
    }

    /// SQLite store at the configured path plus the HTTP fetcher
    pub async fn from_config(config: &DownloadsConfig, blobs: BlobRegistry) -> anyhow::Result<Self> {
        let store = SqliteDownloadStore::open(&config.database_path()?).await?;
        let fetcher = HttpFetcher::new(config)?;
        Self::new(Arc::new(store), Arc::new(fetcher), blobs, config.clone()).await
    }

    /// Begin capturing `item` from its first source. `show_title` names the
    /// parent show for episodes and is ignored for movies.
    ///
    /// Refused without side effects when the item is already downloading or
    /// already downloaded. Otherwise the task is registered at 0% before this
    /// returns and the transfer continues in the background.
    pub fn start_download(&self, item: PlayableItem, show_title: &str) -> Result<(), DownloadError> {
        let id = item.id();
        let inner = &self.inner;

        if inner.shutdown.is_cancelled() {
            warn!("Download manager is shut down, ignoring download of {}", id);
            return Err(DownloadError::Cancelled);
        }

        let name = item.display_name(show_title);
        let (cancel, generation) = {
            let mut state = inner.state();
            if state.active.contains_key(&id) {
                warn!("Item {} is already downloading", id);
                return Err(DownloadError::AlreadyDownloading(id));
            }
            if state.discarding.contains_key(&id) {
                warn!("Cancelled download of {} is still being discarded", id);
                return Err(DownloadError::AlreadyDownloading(id));
            }
            if state.completed.contains_key(&id) {
                warn!("Item {} is already downloaded", id);
                return Err(DownloadError::AlreadyDownloaded(id));
            }

            let cancel = inner.shutdown.child_token();
            let generation = state.next_generation;
            state.next_generation += 1;
            state.active.insert(
                id,
                ActiveDownload {
                    task: DownloadTask::new(id, name.clone()),
                    cancel: cancel.clone(),
                    generation,
                },
            );
            (cancel, generation)
        };

        info!("Starting download of {} ({})", id, name);
        inner.events.publish(DownloadEvent::Started { id, name });

        let inner = Arc::clone(&self.inner);
        let show_title = show_title.to_string();
        tokio::spawn(async move {
            inner.run(item, show_title, cancel, generation).await;
        });

        Ok(())
    }

    /// Abort the in-flight transfer for `id`. Returns false when there is
    /// nothing to cancel, including when the transfer already finished.
    pub fn cancel_download(&self, id: ItemId) -> bool {
        let removed = self.inner.state().abandon(id);
        match removed {
            Some(entry) => {
                entry.cancel.cancel();
                info!("Cancelled download of {}", id);
                self.inner.events.publish(DownloadEvent::Cancelled { id });
                true
            }
            None => {
                debug!("No active download for {}", id);
                false
            }
        }
    }

    /// Remove a persisted download and revoke its handle. Returns false if
    /// nothing was stored under `id`.
    pub async fn delete_download(&self, id: ItemId) -> Result<bool, DownloadError> {
        let removed = self
            .inner
            .store
            .delete(id)
            .await
            .map_err(DownloadError::storage)?;

        let (indexed, handle) = {
            let mut state = self.inner.state();
            state.index_version += 1;
            (
                state.completed.remove(&id).is_some(),
                state.minted.remove(&id),
            )
        };
        if let Some(handle) = handle {
            self.inner.blobs.revoke(&handle);
        }

        if removed || indexed {
            info!("Deleted download {}", id);
            self.inner.events.publish(DownloadEvent::Deleted { id });
        } else {
            debug!("Nothing stored for {}", id);
        }
        Ok(removed)
    }

    /// Every persisted download with a fresh payload handle. Handles from
    /// the previous call are revoked first.
    ///
    /// The completed index is rebuilt from the store unless a commit or
    /// delete landed while the store was being read.
    pub async fn list_completed(&self) -> Result<Vec<DownloadedItem>, DownloadError> {
        let version = self.inner.state().index_version;
        let records = self
            .inner
            .store
            .get_all()
            .await
            .map_err(DownloadError::storage)?;

        let stale: Vec<BlobHandle> = {
            let mut state = self.inner.state();
            state.minted.drain().map(|(_, handle)| handle).collect()
        };
        for handle in &stale {
            self.inner.blobs.revoke(handle);
        }

        let mut items = Vec::with_capacity(records.len());
        let mut state = self.inner.state();
        let rebuild = state.index_version == version;
        if rebuild {
            state.completed.clear();
        }
        for record in records {
            let StoredDownload {
                content,
                content_type,
                payload,
                ..
            } = record;
            let item_id = content.id();
            let size_bytes = payload.len() as u64;
            let blob = self.inner.blobs.mint(payload, content_type);

            state.minted.insert(item_id, blob.clone());
            if rebuild {
                state.completed.insert(item_id, size_bytes);
            }
            items.push(DownloadedItem {
                item_id,
                content,
                blob,
                size_bytes,
            });
        }
        debug!(
            "Listed {} downloads, revoked {} stale handles",
            items.len(),
            stale.len()
        );

        Ok(items)
    }

    pub fn is_downloaded(&self, id: ItemId) -> bool {
        self.inner.state().completed.contains_key(&id)
    }

    pub fn is_downloading(&self, id: ItemId) -> bool {
        self.inner.state().active.contains_key(&id)
    }

    /// Snapshot of in-flight and recently failed tasks, ordered by id
    pub fn active_downloads(&self) -> Vec<DownloadTask> {
        let mut tasks: Vec<DownloadTask> = self
            .inner
            .state()
            .active
            .values()
            .map(|entry| entry.task.clone())
            .collect();
        tasks.sort_by_key(|task| task.item_id);
        tasks
    }

    pub fn active_task(&self, id: ItemId) -> Option<DownloadTask> {
        self.inner
            .state()
            .active
            .get(&id)
            .map(|entry| entry.task.clone())
    }

    /// Total payload bytes of persisted downloads
    pub fn storage_usage(&self) -> u64 {
        self.inner.state().completed.values().sum()
    }

    pub fn subscribe(&self) -> EventSubscriber<DownloadEvent> {
        self.inner.events.subscribe()
    }

    /// Events for one item only
    pub fn subscribe_item(&self, id: ItemId) -> EventSubscriber<DownloadEvent> {
        self.inner
            .events
            .subscribe_filtered(move |event: &DownloadEvent| event.item_id() == id)
    }

    pub fn blobs(&self) -> &BlobRegistry {
        &self.inner.blobs
    }

    /// Cancel every transfer and revoke every handle this manager minted.
    /// Later `start_download` calls are refused.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();

        let (cancelled, handles) = {
            let mut state = self.inner.state();
            let ids: Vec<ItemId> = state.active.keys().copied().collect();
            let cancelled: Vec<ItemId> = ids
                .into_iter()
                .filter(|id| state.abandon(*id).is_some())
                .collect();
            let handles: Vec<BlobHandle> = state.minted.drain().map(|(_, h)| h).collect();
            (cancelled, handles)
        };

        for id in &cancelled {
            self.inner.events.publish(DownloadEvent::Cancelled { id: *id });
        }
        for handle in &handles {
            self.inner.blobs.revoke(handle);
        }
        info!(
            "Download manager shut down: {} transfers cancelled, {} handles revoked",
            cancelled.len(),
            handles.len()
        );
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run(
        self: Arc<Self>,
        item: PlayableItem,
        show_title: String,
        cancel: CancellationToken,
        generation: u64,
    ) {
        let id = item.id();
        match self.transfer(item, &show_title, &cancel, generation).await {
            Ok(size) => self.commit(id, generation, size).await,
            Err(e) if e.is_cancellation() => {
                debug!("Download of {} aborted", id);
                if self.state().remove_if_owned(id, generation) {
                    self.events.publish(DownloadEvent::Cancelled { id });
                }
            }
            Err(e) => self.fail(id, generation, e, &cancel).await,
        }

        if self.state().finish_discard(id, generation) {
            debug!("Cancelled download of {} cleaned up", id);
        }
    }

    /// Fetch, stream and persist. Returns the payload size.
    async fn transfer(
        &self,
        item: PlayableItem,
        show_title: &str,
        cancel: &CancellationToken,
        generation: u64,
    ) -> Result<u64, DownloadError> {
        let id = item.id();
        let source = item
            .video_sources()
            .first()
            .ok_or(DownloadError::NoSource(id))?;
        debug!("Downloading {} from {} ({})", id, source.url, source.quality);

        let response = self.fetcher.fetch(&source.url, cancel).await?;
        let payload = stream_to_payload(
            response,
            cancel,
            &self.config.fallback_content_type,
            |percent| self.report_progress(id, generation, percent),
        )
        .await?;

        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        let record = StoredDownload::new(
            DownloadedContent::from_item(item, show_title),
            payload.content_type,
            payload.data,
        );
        let size = record.size_bytes();
        self.store
            .put(record)
            .await
            .map_err(DownloadError::storage)?;

        Ok(size)
    }

    fn report_progress(&self, id: ItemId, generation: u64, percent: u8) {
        let advanced = {
            let mut state = self.state();
            match state.active.get_mut(&id) {
                Some(entry)
                    if entry.generation == generation
                        && entry.task.status == DownloadStatus::Downloading
                        && percent > entry.task.progress_percent =>
                {
                    entry.task.progress_percent = percent;
                    true
                }
                _ => false,
            }
        };

        if advanced {
            self.events.publish(DownloadEvent::Progress { id, percent });
        }
    }

    async fn commit(&self, id: ItemId, generation: u64, size: u64) {
        let committed = {
            let mut state = self.state();
            if state.remove_if_owned(id, generation) {
                state.completed.insert(id, size);
                state.index_version += 1;
                true
            } else {
                false
            }
        };

        if committed {
            info!("Download of {} completed ({} bytes)", id, size);
            self.events.publish(DownloadEvent::Completed {
                id,
                size_bytes: size,
            });
            return;
        }

        // Cancelled while the payload was being written. No newer run can
        // exist until `run` clears the discard marker.
        debug!("Discarding stored payload of cancelled download {}", id);
        if let Err(e) = self.store.delete(id).await {
            error!("Failed to discard cancelled download {}: {:#}", id, e);
        }
    }

    async fn fail(&self, id: ItemId, generation: u64, err: DownloadError, cancel: &CancellationToken) {
        let marked = {
            let mut state = self.state();
            match state.active.get_mut(&id) {
                Some(entry) if entry.generation == generation => {
                    entry.task.status = DownloadStatus::Error;
                    true
                }
                _ => false,
            }
        };
        if !marked {
            return;
        }

        error!("Download of {} failed: {}", id, err);
        self.events.publish(DownloadEvent::Failed {
            id,
            message: err.to_string(),
        });

        tokio::select! {
            _ = tokio::time::sleep(self.config.error_grace_period()) => {}
            _ = cancel.cancelled() => {}
        }

        if self.state().remove_if_owned(id, generation) {
            debug!("Evicted failed download {}", id);
            self.events.publish(DownloadEvent::Evicted { id });
        }
    }
}
