pub mod errors;
pub mod format;
pub mod url;

pub use errors::{DownloadError, PlaybackError};
pub use format::{format_bytes, format_time};
pub use url::direct_media_url;
