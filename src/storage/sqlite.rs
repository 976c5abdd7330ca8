use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::Row;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use super::store::{DownloadStore, StoredDownload};
use crate::models::{DownloadedContent, ItemId};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS downloads (
    id INTEGER PRIMARY KEY NOT NULL,
    content TEXT NOT NULL,
    content_type TEXT NOT NULL,
    payload BLOB NOT NULL,
    size INTEGER NOT NULL,
    downloaded_at TEXT NOT NULL
)
"#;

/// SQLite-backed download store
#[derive(Debug, Clone)]
pub struct SqliteDownloadStore {
    pool: SqlitePool,
}

impl SqliteDownloadStore {
    /// Open (creating if needed) the database file at `path`
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory {:?}", parent))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open download database at {:?}", path))?;

        let store = Self { pool };
        store.migrate().await?;

        info!("Download database opened at {:?}", path);
        Ok(store)
    }

    /// Private in-memory database; a single connection keeps it alive
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new().in_memory(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to open in-memory download database")?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .context("Failed to create downloads table")?;
        debug!("Download schema ready");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn db_id(id: ItemId) -> Result<i64> {
    i64::try_from(id.get()).with_context(|| format!("Item id {} does not fit in SQLite", id))
}

fn record_from_row(row: &SqliteRow) -> Result<StoredDownload> {
    let id: i64 = row.try_get("id")?;
    let content: String = row.try_get("content")?;
    let content: DownloadedContent = serde_json::from_str(&content)
        .with_context(|| format!("Corrupt metadata for download {}", id))?;
    let payload: Vec<u8> = row.try_get("payload")?;
    let downloaded_at: DateTime<Utc> = row.try_get("downloaded_at")?;

    Ok(StoredDownload {
        content,
        content_type: row.try_get("content_type")?,
        payload: Bytes::from(payload),
        downloaded_at,
    })
}

#[async_trait]
impl DownloadStore for SqliteDownloadStore {
    async fn put(&self, record: StoredDownload) -> Result<()> {
        let id = db_id(record.id())?;
        let content =
            serde_json::to_string(&record.content).context("Failed to serialize metadata")?;
        let size = i64::try_from(record.payload.len()).context("Payload too large")?;

        sqlx::query(
            "INSERT OR REPLACE INTO downloads \
             (id, content, content_type, payload, size, downloaded_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(content)
        .bind(record.content_type.as_str())
        .bind(record.payload.as_ref())
        .bind(size)
        .bind(record.downloaded_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to store download {}", id))?;

        Ok(())
    }

    async fn get(&self, id: ItemId) -> Result<Option<StoredDownload>> {
        let row = sqlx::query("SELECT * FROM downloads WHERE id = ?")
            .bind(db_id(id)?)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to read download {}", id))?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn get_all(&self) -> Result<Vec<StoredDownload>> {
        let rows = sqlx::query("SELECT * FROM downloads ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list downloads")?;

        rows.iter().map(record_from_row).collect()
    }

    async fn delete(&self, id: ItemId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM downloads WHERE id = ?")
            .bind(db_id(id)?)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to delete download {}", id))?;

        Ok(result.rows_affected() > 0)
    }
}
