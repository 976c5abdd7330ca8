pub mod fetcher;
pub mod manager;
pub mod transfer;
pub mod types;

pub use fetcher::{FetchResponse, HttpFetcher, MediaFetcher};
pub use manager::DownloadManager;
pub use types::{DownloadStatus, DownloadTask, DownloadedItem};
