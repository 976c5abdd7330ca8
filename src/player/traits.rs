use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// The playback element driven by the controller. Implementations report
/// progress back through [`super::MediaEvent`]s.
#[async_trait]
pub trait MediaElement: Send + Sync {
    /// Replace the current source. `subtitles` is an optional text track
    /// to attach alongside it.
    async fn load(&self, url: &str, subtitles: Option<&str>) -> Result<()>;
    async fn play(&self) -> Result<()>;
    async fn pause(&self) -> Result<()>;
    async fn seek(&self, position: Duration) -> Result<()>;
    async fn set_volume(&self, volume: f64) -> Result<()>;
    async fn set_muted(&self, muted: bool) -> Result<()>;
    /// Show or hide the first text track
    async fn set_subtitles_visible(&self, visible: bool) -> Result<()>;
    async fn text_track_count(&self) -> usize;
    /// Drop the source and release decoder resources
    async fn unload(&self) -> Result<()>;
}

/// Platform fullscreen capability
#[async_trait]
pub trait FullscreenHost: Send + Sync {
    async fn is_fullscreen(&self) -> bool;
    async fn request_fullscreen(&self) -> Result<()>;
    async fn exit_fullscreen(&self) -> Result<()>;
}
