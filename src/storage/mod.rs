pub mod blob;
pub mod sqlite;
pub mod store;

pub use blob::{Blob, BlobHandle, BlobRegistry};
pub use sqlite::SqliteDownloadStore;
pub use store::{DownloadStore, MemoryDownloadStore, StoredDownload};
