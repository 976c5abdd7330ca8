use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::models::{DownloadedContent, ItemId};

/// A completed download: metadata plus the full binary payload
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDownload {
    pub content: DownloadedContent,
    pub content_type: String,
    pub payload: Bytes,
    pub downloaded_at: DateTime<Utc>,
}

impl StoredDownload {
    pub fn new(content: DownloadedContent, content_type: impl Into<String>, payload: Bytes) -> Self {
        Self {
            content,
            content_type: content_type.into(),
            payload,
            downloaded_at: Utc::now(),
        }
    }

    pub fn id(&self) -> ItemId {
        self.content.id()
    }

    pub fn size_bytes(&self) -> u64 {
        self.payload.len() as u64
    }
}

/// Durable key/value store for completed downloads, keyed by item id.
/// `put` and `delete` are atomic per key.
#[async_trait]
pub trait DownloadStore: Send + Sync {
    /// Insert or replace the record under its item id
    async fn put(&self, record: StoredDownload) -> Result<()>;

    async fn get(&self, id: ItemId) -> Result<Option<StoredDownload>>;

    /// Every record, ordered by id
    async fn get_all(&self) -> Result<Vec<StoredDownload>>;

    /// Returns false if nothing was stored under `id`
    async fn delete(&self, id: ItemId) -> Result<bool>;
}

/// In-memory store with an optional byte quota
#[derive(Debug, Default)]
pub struct MemoryDownloadStore {
    records: RwLock<BTreeMap<ItemId, StoredDownload>>,
    quota_bytes: Option<u64>,
}

impl MemoryDownloadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes that would push the total payload size past `bytes`
    pub fn with_quota(bytes: u64) -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            quota_bytes: Some(bytes),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl DownloadStore for MemoryDownloadStore {
    async fn put(&self, record: StoredDownload) -> Result<()> {
        let mut records = self.records.write().await;

        if let Some(quota) = self.quota_bytes {
            let used: u64 = records
                .values()
                .filter(|r| r.id() != record.id())
                .map(StoredDownload::size_bytes)
                .sum();
            if used + record.size_bytes() > quota {
                return Err(anyhow!(
                    "storage quota exceeded ({} of {} bytes in use)",
                    used,
                    quota
                ));
            }
        }

        records.insert(record.id(), record);
        Ok(())
    }

    async fn get(&self, id: ItemId) -> Result<Option<StoredDownload>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<StoredDownload>> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn delete(&self, id: ItemId) -> Result<bool> {
        Ok(self.records.write().await.remove(&id).is_some())
    }
}
