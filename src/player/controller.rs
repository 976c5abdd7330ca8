use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use super::gestures::{ControlsVisibility, SkipIndicator, TapOutcome, TapTracker};
use super::traits::{FullscreenHost, MediaElement};
use super::types::{
    MediaEvent, PlaybackPhase, PlayerSnapshot, SkipDirection, TapSide, TransportState,
};
use crate::config::PlaybackConfig;
use crate::models::PlaybackTarget;
use crate::storage::BlobRegistry;
use crate::utils::PlaybackError;

type Result<T> = std::result::Result<T, PlaybackError>;

/// Captured when a quality change starts, restored once the new source has
/// data
#[derive(Debug, Clone, Copy)]
struct QualitySwap {
    position: Duration,
    was_playing: bool,
}

/// Transport state machine for a single playback surface.
///
/// The controller owns the media element and the transport state. It is
/// driven by user operations, by [`MediaEvent`]s from the element and by
/// [`PlaybackController::poll_timers`] once [`PlaybackController::next_deadline`]
/// passes.
pub struct PlaybackController {
    element: Arc<dyn MediaElement>,
    fullscreen: Arc<dyn FullscreenHost>,
    blobs: Option<BlobRegistry>,
    config: PlaybackConfig,
    target: Option<PlaybackTarget>,
    phase: PlaybackPhase,
    state: TransportState,
    last_audible_volume: Option<f64>,
    swap: Option<QualitySwap>,
    /// Play/pause was toggled before metadata arrived. Autoplay defers to it.
    toggled_while_loading: bool,
    settings_open: bool,
    taps: TapTracker,
    controls: ControlsVisibility,
    skip: SkipIndicator,
}

impl PlaybackController {
    pub fn new(
        element: Arc<dyn MediaElement>,
        fullscreen: Arc<dyn FullscreenHost>,
        config: PlaybackConfig,
    ) -> Self {
        let volume = config.default_volume.clamp(0.0, 1.0);
        Self {
            element,
            fullscreen,
            blobs: None,
            state: TransportState::new(volume, config.subtitles_enabled),
            last_audible_volume: (volume > 0.0).then_some(volume),
            taps: TapTracker::new(config.double_tap_window()),
            controls: ControlsVisibility::new(config.controls_hide_delay()),
            skip: SkipIndicator::new(config.skip_indicator_duration()),
            config,
            target: None,
            phase: PlaybackPhase::Idle,
            swap: None,
            toggled_while_loading: false,
            settings_open: false,
        }
    }

    /// Revoke offline payload handles in `blobs` when their target is
    /// closed or replaced
    pub fn with_blob_registry(mut self, blobs: BlobRegistry) -> Self {
        self.blobs = Some(blobs);
        self
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    pub fn state(&self) -> &TransportState {
        &self.state
    }

    pub fn target(&self) -> Option<&PlaybackTarget> {
        self.target.as_ref()
    }

    pub fn controls_visible(&self) -> bool {
        self.controls.is_visible()
    }

    pub fn settings_open(&self) -> bool {
        self.settings_open
    }

    pub fn skip_indicator(&self) -> Option<SkipDirection> {
        self.skip.current()
    }

    pub fn has_next(&self) -> bool {
        self.target.as_ref().is_some_and(PlaybackTarget::has_next)
    }

    /// The quality menu only exists for network targets with a choice
    pub fn has_quality_choice(&self) -> bool {
        self.target
            .as_ref()
            .is_some_and(|t| !t.is_offline() && t.video_sources().len() > 1)
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        let target = self.target.as_ref();
        PlayerSnapshot {
            phase: self.phase,
            transport: self.state.clone(),
            controls_visible: self.controls.is_visible(),
            settings_open: self.settings_open,
            skip_indicator: self.skip.current(),
            title: target.map(|t| t.title().to_string()),
            episode_label: target.and_then(PlaybackTarget::episode_label),
            has_next: self.has_next(),
            has_subtitles: target.is_some_and(|t| t.subtitle_url().is_some()),
            qualities: target
                .map(|t| t.video_sources().iter().map(|s| s.quality.clone()).collect())
                .unwrap_or_default(),
        }
    }

    /// Assign a new target. Replacing the current target tears it down
    /// completely; assigning the same target again does nothing.
    pub async fn load_target(&mut self, target: PlaybackTarget) -> Result<()> {
        if self
            .target
            .as_ref()
            .is_some_and(|current| current.identity() == target.identity())
        {
            debug!("Target unchanged, keeping current playback");
            return Ok(());
        }

        let quality = target.video_sources().first().map(|s| s.quality.clone());
        let Some(url) = target.resolve_url(quality.as_deref()) else {
            warn!("Refusing to play '{}': no sources", target.title());
            return Err(PlaybackError::NoSources);
        };

        if self.target.is_some() {
            self.release_target().await;
        }

        info!("Loading '{}' from {}", target.title(), url);
        self.state.position = Duration::ZERO;
        self.state.duration = None;
        self.state.is_playing = false;
        self.state.subtitles_enabled = self.config.subtitles_enabled;
        self.state.selected_quality = if target.is_offline() { None } else { quality };
        self.phase = PlaybackPhase::Loading;
        self.toggled_while_loading = false;
        self.reset_transient(Instant::now());

        let subtitles = target.subtitle_url().map(str::to_string);
        self.target = Some(target);

        self.element.load(&url, subtitles.as_deref()).await?;
        self.element.set_volume(self.state.volume).await?;
        self.element.set_muted(self.state.is_muted).await?;
        Ok(())
    }

    /// Close playback and return to `Idle`
    pub async fn close(&mut self) -> Result<()> {
        if self.target.is_none() {
            return Ok(());
        }

        self.release_target().await;
        self.phase = PlaybackPhase::Idle;
        self.state.is_playing = false;
        self.state.position = Duration::ZERO;
        self.state.duration = None;
        self.state.selected_quality = None;
        self.reset_transient(Instant::now());

        if self.fullscreen.is_fullscreen().await {
            self.fullscreen.exit_fullscreen().await?;
        }
        self.state.is_fullscreen = self.fullscreen.is_fullscreen().await;

        info!("Playback closed");
        Ok(())
    }

    /// Advance to the next episode of the season. Returns false when there
    /// is none.
    pub async fn play_next(&mut self) -> Result<bool> {
        let Some(next) = self.target.as_ref().and_then(PlaybackTarget::next_target) else {
            return Ok(false);
        };
        self.load_target(next).await?;
        Ok(true)
    }

    pub async fn handle_media_event(&mut self, event: MediaEvent) -> Result<()> {
        if self.target.is_none() {
            trace!("Ignoring {:?} without a target", event);
            return Ok(());
        }

        match event {
            MediaEvent::MetadataLoaded { duration } => {
                self.state.duration = Some(duration);
                if self.state.position > duration {
                    self.state.position = duration;
                }
                self.apply_subtitles().await?;

                if self.phase == PlaybackPhase::Loading {
                    self.phase = PlaybackPhase::Ready;
                    debug!("Metadata loaded, duration {:?}", duration);
                    if self.toggled_while_loading {
                        debug!("Play state chosen while loading, skipping autoplay");
                    } else if self.config.autoplay {
                        self.set_playing(true).await?;
                    }
                }
            }
            MediaEvent::DataLoaded => {
                if let Some(swap) = self.swap.take() {
                    debug!(
                        "New source ready, restoring {:?} (playing: {})",
                        swap.position, swap.was_playing
                    );
                    self.element.seek(swap.position).await?;
                    self.state.position = swap.position;
                    if swap.was_playing {
                        self.element.play().await?;
                    }
                }
            }
            MediaEvent::TimeUpdate { position } => {
                if self.swap.is_some() {
                    return Ok(());
                }
                self.state.position = self.clamp_position(position.as_secs_f64());
            }
            MediaEvent::Ended => {
                if let Some(duration) = self.state.duration {
                    self.state.position = duration;
                }
                self.enter_ended();
            }
        }
        Ok(())
    }

    pub async fn toggle_play(&mut self) -> Result<()> {
        if self.target.is_none() {
            return Ok(());
        }

        if self.phase == PlaybackPhase::Ended {
            debug!("Restarting from the beginning");
            self.element.seek(Duration::ZERO).await?;
            self.state.position = Duration::ZERO;
            self.phase = PlaybackPhase::Ready;
            return self.set_playing(true).await;
        }
        if self.phase == PlaybackPhase::Loading {
            self.toggled_while_loading = true;
        }

        self.set_playing(!self.state.is_playing).await
    }

    /// Relative seek in seconds, clamped to the media bounds
    pub async fn seek(&mut self, delta_seconds: f64) -> Result<()> {
        if self.target.is_none() || delta_seconds == 0.0 {
            return Ok(());
        }

        let direction = if delta_seconds > 0.0 {
            SkipDirection::Forward
        } else {
            SkipDirection::Rewind
        };
        self.skip.trigger(direction, Instant::now());

        let from = self.current_position().as_secs_f64();
        let position = self.clamp_position(from + delta_seconds);
        self.seek_to(position).await
    }

    /// Absolute seek to a fraction of the duration. Ignored until the
    /// duration is known.
    pub async fn seek_to_fraction(&mut self, fraction: f64) -> Result<()> {
        let Some(duration) = self.state.duration else {
            return Ok(());
        };
        if self.target.is_none() || !fraction.is_finite() {
            return Ok(());
        }

        let position = duration.mul_f64(fraction.clamp(0.0, 1.0));
        self.seek_to(position).await
    }

    pub async fn set_volume(&mut self, volume: f64) -> Result<()> {
        let volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            0.0
        };

        self.state.volume = volume;
        self.state.is_muted = volume == 0.0;
        if volume > 0.0 {
            self.last_audible_volume = Some(volume);
        }

        self.element.set_volume(volume).await?;
        self.element.set_muted(self.state.is_muted).await?;
        Ok(())
    }

    /// Mute keeps the volume; unmute restores it, or the last audible level,
    /// or the configured fallback.
    pub async fn toggle_mute(&mut self) -> Result<()> {
        if self.state.is_muted || self.state.volume == 0.0 {
            let volume = if self.state.volume > 0.0 {
                self.state.volume
            } else {
                self.last_audible_volume
                    .unwrap_or(self.config.unmute_fallback_volume)
            };
            self.state.volume = volume;
            self.state.is_muted = false;
            self.last_audible_volume = Some(volume);
            self.element.set_volume(volume).await?;
        } else {
            self.state.is_muted = true;
        }

        self.element.set_muted(self.state.is_muted).await?;
        Ok(())
    }

    /// Switch source without losing position or play/pause state. Always
    /// closes the settings menu.
    pub async fn set_quality(&mut self, quality: &str) -> Result<()> {
        self.set_settings_open(false);

        let Some(target) = self.target.as_ref() else {
            return Ok(());
        };
        if target.is_offline() || self.state.selected_quality.as_deref() == Some(quality) {
            return Ok(());
        }
        let Some(source) = target.source_for(quality) else {
            debug!("Quality {} not offered, ignoring", quality);
            return Ok(());
        };
        let url = source.url.clone();
        let subtitles = target.subtitle_url().map(str::to_string);

        let swap = self.swap.unwrap_or(QualitySwap {
            position: self.state.position,
            was_playing: self.state.is_playing,
        });
        info!(
            "Switching quality to {} at {:?} (playing: {})",
            quality, swap.position, swap.was_playing
        );

        self.swap = Some(swap);
        self.state.selected_quality = Some(quality.to_string());
        self.element.load(&url, subtitles.as_deref()).await?;
        Ok(())
    }

    pub async fn toggle_subtitles(&mut self) -> Result<()> {
        if self.target.as_ref().and_then(|t| t.subtitle_url()).is_none() {
            return Ok(());
        }
        self.state.subtitles_enabled = !self.state.subtitles_enabled;
        self.apply_subtitles().await
    }

    /// Ask the host to enter or leave fullscreen. The state mirrors what
    /// the host reports afterwards.
    pub async fn toggle_fullscreen(&mut self) -> Result<()> {
        if self.fullscreen.is_fullscreen().await {
            self.fullscreen.exit_fullscreen().await?;
        } else {
            self.fullscreen.request_fullscreen().await?;
        }
        self.sync_fullscreen().await;
        Ok(())
    }

    /// Re-read the host's fullscreen status after an external change
    pub async fn sync_fullscreen(&mut self) {
        self.state.is_fullscreen = self.fullscreen.is_fullscreen().await;
    }

    pub fn toggle_settings(&mut self) {
        if !self.has_quality_choice() {
            return;
        }
        let open = !self.settings_open;
        self.set_settings_open(open);
    }

    pub fn pointer_moved(&mut self) {
        let auto_hide = self.auto_hide_allowed();
        self.controls.show(Instant::now(), auto_hide);
    }

    /// A tap on one half of the surface. Two taps on the same half inside
    /// the window skip; otherwise the tap toggles the controls once the
    /// window has passed.
    pub async fn tap(&mut self, side: TapSide) -> Result<()> {
        if self.target.is_none() {
            return Ok(());
        }

        match self.taps.register(side, Instant::now()) {
            TapOutcome::DoubleTap(side) => {
                let delta = match side.skip_direction() {
                    SkipDirection::Forward => self.config.skip_seconds,
                    SkipDirection::Rewind => -self.config.skip_seconds,
                };
                self.seek(delta).await?;
            }
            TapOutcome::Pending { flushed_single } => {
                if flushed_single {
                    self.toggle_controls();
                }
            }
        }
        Ok(())
    }

    /// Earliest pending timer
    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.taps.deadline(),
            self.skip.deadline(),
            self.controls.deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Fire every timer that is due
    pub fn poll_timers(&mut self) {
        let now = Instant::now();
        if self.taps.expire(now) {
            trace!("Single tap resolved");
            self.toggle_controls();
        }
        self.skip.expire(now);
        if self.controls.expire(now) {
            trace!("Controls hidden after inactivity");
        }
    }

    fn toggle_controls(&mut self) {
        if self.controls.is_visible() {
            self.controls.hide();
            self.settings_open = false;
        } else {
            let auto_hide = self.auto_hide_allowed();
            self.controls.show(Instant::now(), auto_hide);
        }
    }

    fn set_settings_open(&mut self, open: bool) {
        if self.settings_open == open {
            return;
        }
        self.settings_open = open;
        if open {
            self.controls.show(Instant::now(), false);
        } else if self.controls.is_visible() {
            let auto_hide = self.auto_hide_allowed();
            self.controls.show(Instant::now(), auto_hide);
        }
    }

    fn auto_hide_allowed(&self) -> bool {
        self.state.is_playing && !self.settings_open
    }

    async fn set_playing(&mut self, playing: bool) -> Result<()> {
        self.state.is_playing = playing;

        if let Some(swap) = self.swap.as_mut() {
            // The swap resumes with whatever the user chose last
            swap.was_playing = playing;
        } else if playing {
            self.element.play().await?;
        } else {
            self.element.pause().await?;
        }

        if playing {
            if self.controls.is_visible() {
                let auto_hide = self.auto_hide_allowed();
                self.controls.show(Instant::now(), auto_hide);
            }
        } else {
            self.controls.show(Instant::now(), false);
        }
        Ok(())
    }

    async fn seek_to(&mut self, position: Duration) -> Result<()> {
        trace!("Seeking to {:?}", position);

        if let Some(swap) = self.swap.as_mut() {
            swap.position = position;
        } else {
            self.element.seek(position).await?;
        }
        self.state.position = position;

        match self.state.duration {
            Some(duration) if position >= duration => self.enter_ended(),
            _ if self.phase == PlaybackPhase::Ended => {
                self.phase = PlaybackPhase::Ready;
            }
            _ => {}
        }
        Ok(())
    }

    fn enter_ended(&mut self) {
        if self.phase == PlaybackPhase::Ended {
            return;
        }
        debug!("Playback ended");
        self.phase = PlaybackPhase::Ended;
        self.state.is_playing = false;
        self.controls.show(Instant::now(), false);
    }

    fn current_position(&self) -> Duration {
        self.swap.map_or(self.state.position, |swap| swap.position)
    }

    fn clamp_position(&self, seconds: f64) -> Duration {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        let position = Duration::from_secs_f64(seconds);
        match self.state.duration {
            Some(duration) => position.min(duration),
            None => position,
        }
    }

    async fn apply_subtitles(&self) -> Result<()> {
        if self.element.text_track_count().await > 0 {
            self.element
                .set_subtitles_visible(self.state.subtitles_enabled)
                .await?;
        }
        Ok(())
    }

    fn reset_transient(&mut self, now: Instant) {
        self.swap = None;
        self.settings_open = false;
        self.taps.reset();
        self.skip.reset();
        self.controls.show(now, false);
    }

    async fn release_target(&mut self) {
        let Some(target) = self.target.take() else {
            return;
        };

        if let Err(e) = self.element.unload().await {
            warn!("Failed to unload media element: {:#}", e);
        }
        if let (Some(blobs), Some(handle)) = (&self.blobs, target.blob()) {
            blobs.revoke(handle);
        }
        debug!("Released '{}'", target.title());
    }
}
