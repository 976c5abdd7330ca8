use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

use super::types::{SkipDirection, TapSide};

/// Result of registering a tap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapOutcome {
    /// Second tap on the same side inside the window
    DoubleTap(TapSide),
    /// Tap recorded and waiting for a possible second tap.
    /// `flushed_single` is set when an older pending tap was resolved as a
    /// single tap to make room for this one.
    Pending { flushed_single: bool },
}

/// Disambiguates single taps from double taps
#[derive(Debug)]
pub struct TapTracker {
    window: Duration,
    pending: Option<(TapSide, Instant)>,
}

impl TapTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    pub fn register(&mut self, side: TapSide, now: Instant) -> TapOutcome {
        match self.pending.take() {
            Some((previous, at)) if previous == side && now.duration_since(at) < self.window => {
                TapOutcome::DoubleTap(side)
            }
            Some(_) => {
                self.pending = Some((side, now));
                TapOutcome::Pending {
                    flushed_single: true,
                }
            }
            None => {
                self.pending = Some((side, now));
                TapOutcome::Pending {
                    flushed_single: false,
                }
            }
        }
    }

    /// When the pending tap turns into a single tap
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|(_, at)| at + self.window)
    }

    /// Resolve an expired pending tap. Returns true if one was resolved.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.deadline() {
            Some(deadline) if now >= deadline => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    pub fn reset(&mut self) {
        self.pending = None;
    }
}

/// Controls overlay with an inactivity auto-hide timer
#[derive(Debug)]
pub struct ControlsVisibility {
    delay: Duration,
    visible: bool,
    hide_at: Option<Instant>,
}

impl ControlsVisibility {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            visible: true,
            hide_at: None,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.hide_at
    }

    /// Show and, if `auto_hide`, restart the inactivity timer
    pub fn show(&mut self, now: Instant, auto_hide: bool) {
        self.visible = true;
        self.hide_at = auto_hide.then(|| now + self.delay);
    }

    pub fn hide(&mut self) {
        self.visible = false;
        self.hide_at = None;
    }

    /// Hide if the timer ran out. Returns true when that happened.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.hide_at {
            Some(at) if now >= at => {
                self.hide();
                true
            }
            _ => false,
        }
    }
}

/// Transient forward/rewind indicator. Each skip schedules its own clear;
/// the first clear to fire hides the indicator even if a later skip is
/// still showing it.
#[derive(Debug)]
pub struct SkipIndicator {
    duration: Duration,
    current: Option<SkipDirection>,
    clears: VecDeque<Instant>,
}

impl SkipIndicator {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            current: None,
            clears: VecDeque::new(),
        }
    }

    pub fn current(&self) -> Option<SkipDirection> {
        self.current
    }

    pub fn trigger(&mut self, direction: SkipDirection, now: Instant) {
        self.current = Some(direction);
        self.clears.push_back(now + self.duration);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.clears.front().copied()
    }

    pub fn expire(&mut self, now: Instant) -> bool {
        let mut fired = false;
        while self.clears.front().is_some_and(|&at| now >= at) {
            self.clears.pop_front();
            fired = true;
        }
        if fired {
            self.current = None;
        }
        fired
    }

    pub fn reset(&mut self) {
        self.current = None;
        self.clears.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(300);

    #[test]
    fn test_same_side_inside_window_is_double_tap() {
        let start = Instant::now();
        let mut taps = TapTracker::new(WINDOW);

        assert_eq!(
            taps.register(TapSide::Right, start),
            TapOutcome::Pending {
                flushed_single: false
            }
        );
        assert_eq!(
            taps.register(TapSide::Right, start + Duration::from_millis(200)),
            TapOutcome::DoubleTap(TapSide::Right)
        );
        assert!(taps.deadline().is_none());
    }

    #[test]
    fn test_single_tap_expires_after_window() {
        let start = Instant::now();
        let mut taps = TapTracker::new(WINDOW);
        taps.register(TapSide::Left, start);

        assert!(!taps.expire(start + Duration::from_millis(299)));
        assert!(taps.expire(start + WINDOW));
        assert!(!taps.expire(start + Duration::from_secs(1)));
    }

    #[test]
    fn test_other_side_flushes_pending_single() {
        let start = Instant::now();
        let mut taps = TapTracker::new(WINDOW);
        taps.register(TapSide::Left, start);

        assert_eq!(
            taps.register(TapSide::Right, start + Duration::from_millis(100)),
            TapOutcome::Pending {
                flushed_single: true
            }
        );
        assert_eq!(
            taps.deadline(),
            Some(start + Duration::from_millis(100) + WINDOW)
        );
    }

    #[test]
    fn test_slow_second_tap_is_not_a_double_tap() {
        let start = Instant::now();
        let mut taps = TapTracker::new(WINDOW);
        taps.register(TapSide::Right, start);

        assert_eq!(
            taps.register(TapSide::Right, start + WINDOW),
            TapOutcome::Pending {
                flushed_single: true
            }
        );
    }

    #[test]
    fn test_controls_hide_after_delay() {
        let start = Instant::now();
        let mut controls = ControlsVisibility::new(Duration::from_secs(3));
        controls.show(start, true);

        assert!(!controls.expire(start + Duration::from_secs(2)));
        assert!(controls.expire(start + Duration::from_secs(3)));
        assert!(!controls.is_visible());

        controls.show(start, false);
        assert!(controls.deadline().is_none());
        assert!(controls.is_visible());
    }

    #[test]
    fn test_skip_indicator_clears_on_first_deadline() {
        let start = Instant::now();
        let mut indicator = SkipIndicator::new(Duration::from_millis(500));
        indicator.trigger(SkipDirection::Forward, start);
        indicator.trigger(SkipDirection::Forward, start + Duration::from_millis(400));

        assert!(indicator.expire(start + Duration::from_millis(500)));
        assert_eq!(indicator.current(), None);
        assert_eq!(
            indicator.deadline(),
            Some(start + Duration::from_millis(900))
        );
    }
}
