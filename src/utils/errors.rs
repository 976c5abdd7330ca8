use thiserror::Error;

use crate::models::ItemId;

/// Failures of a single download. Cancellation is carried as a variant so it
/// can flow through `?`, but it is an expected outcome rather than an error;
/// check [`DownloadError::is_cancellation`] before surfacing anything.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DownloadError {
    #[error("Item {0} is already downloading")]
    AlreadyDownloading(ItemId),

    #[error("Item {0} is already downloaded")]
    AlreadyDownloaded(ItemId),

    #[error("No video source found for item {0}")]
    NoSource(ItemId),

    #[error("Download aborted by user")]
    Cancelled,

    #[error("HTTP error: {0} {1}")]
    HttpStatus(u16, String),

    #[error("Transfer error: {0}")]
    Transfer(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl DownloadError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Rejected before any I/O happened
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::AlreadyDownloading(_) | Self::AlreadyDownloaded(_)
        )
    }

    pub fn storage(err: anyhow::Error) -> Self {
        Self::Storage(format!("{:#}", err))
    }

    pub fn transfer(err: impl std::fmt::Display) -> Self {
        Self::Transfer(err.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("Playback target has no playable source")]
    NoSources,

    #[error("No playback target loaded")]
    NoTarget,

    #[error("Media element error: {0}")]
    Element(String),
}

impl From<anyhow::Error> for PlaybackError {
    fn from(err: anyhow::Error) -> Self {
        Self::Element(format!("{:#}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert!(DownloadError::Cancelled.is_cancellation());
        assert!(!DownloadError::Transfer("reset".into()).is_cancellation());
        assert!(DownloadError::AlreadyDownloaded(ItemId::new(1)).is_precondition());
        assert!(!DownloadError::NoSource(ItemId::new(1)).is_precondition());
    }

    #[test]
    fn test_storage_error_keeps_context_chain() {
        let err = anyhow::anyhow!("disk full").context("Failed to store download 5");
        let mapped = DownloadError::storage(err);
        assert_eq!(
            mapped.to_string(),
            "Storage error: Failed to store download 5: disk full"
        );
    }

    #[test]
    fn test_element_failures_become_playback_errors() {
        let err: PlaybackError = anyhow::anyhow!("decoder crashed").into();
        assert_eq!(err, PlaybackError::Element("decoder crashed".to_string()));
    }
}
