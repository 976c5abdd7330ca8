use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Controller lifecycle. `Ready` covers both playing and paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackPhase {
    Idle,
    Loading,
    Ready,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportState {
    pub is_playing: bool,
    pub position: Duration,
    /// Unknown until the element reports metadata
    pub duration: Option<Duration>,
    /// 0.0 to 1.0
    pub volume: f64,
    pub is_muted: bool,
    pub subtitles_enabled: bool,
    pub is_fullscreen: bool,
    /// Always a quality of the current target; `None` for offline payloads
    pub selected_quality: Option<String>,
}

impl TransportState {
    pub fn new(volume: f64, subtitles_enabled: bool) -> Self {
        Self {
            is_playing: false,
            position: Duration::ZERO,
            duration: None,
            volume,
            is_muted: false,
            subtitles_enabled,
            is_fullscreen: false,
            selected_quality: None,
        }
    }

    /// Played fraction in 0..=1, zero while the duration is unknown
    pub fn progress(&self) -> f64 {
        match self.duration {
            Some(duration) if !duration.is_zero() => {
                (self.position.as_secs_f64() / duration.as_secs_f64()).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipDirection {
    Forward,
    Rewind,
}

/// Half of the playback surface that was tapped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TapSide {
    Left,
    Right,
}

impl TapSide {
    /// Direction of the double-tap skip on this side
    pub fn skip_direction(self) -> SkipDirection {
        match self {
            TapSide::Left => SkipDirection::Rewind,
            TapSide::Right => SkipDirection::Forward,
        }
    }
}

/// Notifications coming from the media element
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    MetadataLoaded { duration: Duration },
    TimeUpdate { position: Duration },
    /// The current source has decoded enough to render
    DataLoaded,
    Ended,
}

/// Everything a presentation layer needs to draw the player
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub phase: PlaybackPhase,
    pub transport: TransportState,
    pub controls_visible: bool,
    pub settings_open: bool,
    pub skip_indicator: Option<SkipDirection>,
    pub title: Option<String>,
    pub episode_label: Option<String>,
    pub has_next: bool,
    pub has_subtitles: bool,
    pub qualities: Vec<String>,
}
