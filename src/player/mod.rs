pub mod controller;
pub mod gestures;
pub mod service;
pub mod traits;
pub mod types;

pub use controller::PlaybackController;
pub use service::{PlayerAction, PlayerCommand, PlayerHandle, PlayerService};
pub use traits::{FullscreenHost, MediaElement};
pub use types::{
    MediaEvent, PlaybackPhase, PlayerSnapshot, SkipDirection, TapSide, TransportState,
};
