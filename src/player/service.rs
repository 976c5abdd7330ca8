use anyhow::{Result, anyhow};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use super::controller::PlaybackController;
use super::types::{MediaEvent, PlayerSnapshot, TapSide};
use crate::events::{EnvironmentEvent, EventBus, EventSubscriber, Key};
use crate::models::PlaybackTarget;
use crate::utils::PlaybackError;

/// Transport operations that only report success or failure
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerAction {
    Close,
    TogglePlay,
    /// Relative seek in seconds
    Seek(f64),
    SeekToFraction(f64),
    SetVolume(f64),
    ToggleMute,
    SetQuality(String),
    ToggleSubtitles,
    ToggleFullscreen,
    ToggleSettings,
    Tap(TapSide),
    PointerMoved,
}

/// Commands that can be sent to the player service
#[derive(Debug)]
pub enum PlayerCommand {
    Load {
        target: Box<PlaybackTarget>,
        respond_to: oneshot::Sender<Result<(), PlaybackError>>,
    },
    Perform {
        action: PlayerAction,
        respond_to: oneshot::Sender<Result<(), PlaybackError>>,
    },
    PlayNext {
        respond_to: oneshot::Sender<Result<bool, PlaybackError>>,
    },
    Snapshot {
        respond_to: oneshot::Sender<PlayerSnapshot>,
    },
    Shutdown {
        respond_to: oneshot::Sender<()>,
    },
}

/// Event loop around a [`PlaybackController`]. It serializes user commands,
/// media element events, environment input and timer deadlines onto one
/// task.
pub struct PlayerService {
    controller: PlaybackController,
    commands: mpsc::UnboundedReceiver<PlayerCommand>,
    media_events: mpsc::UnboundedReceiver<MediaEvent>,
    environment: EventSubscriber<EnvironmentEvent>,
    skip_seconds: f64,
}

impl PlayerService {
    /// `media_events` carries notifications from the element the controller
    /// drives. The environment subscription lives as long as the service.
    pub fn new(
        controller: PlaybackController,
        media_events: mpsc::UnboundedReceiver<MediaEvent>,
        environment: &EventBus<EnvironmentEvent>,
    ) -> (Self, PlayerHandle) {
        let (sender, commands) = mpsc::unbounded_channel();
        let skip_seconds = controller.config().skip_seconds;
        let service = Self {
            controller,
            commands,
            media_events,
            environment: environment.subscribe(),
            skip_seconds,
        };
        (service, PlayerHandle { sender })
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        debug!("Player service started");

        loop {
            let deadline = self.controller.next_deadline();

            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        debug!("All player handles dropped");
                        break;
                    };
                    if !self.handle_command(command).await {
                        break;
                    }
                }
                Some(event) = self.media_events.recv() => {
                    trace!("Media event: {:?}", event);
                    if let Err(e) = self.controller.handle_media_event(event).await {
                        warn!("Failed to handle media event: {}", e);
                    }
                }
                Some(event) = self.environment.recv() => {
                    self.handle_environment(event).await;
                }
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.controller.poll_timers();
                }
            }
        }

        if let Err(e) = self.controller.close().await {
            warn!("Failed to close playback on shutdown: {}", e);
        }
        debug!("Player service stopped");
    }

    /// Returns false when the loop should stop
    async fn handle_command(&mut self, command: PlayerCommand) -> bool {
        match command {
            PlayerCommand::Load { target, respond_to } => {
                let result = self.controller.load_target(*target).await;
                let _ = respond_to.send(result);
            }
            PlayerCommand::Perform { action, respond_to } => {
                trace!("Performing {:?}", action);
                let result = self.perform(action).await;
                let _ = respond_to.send(result);
            }
            PlayerCommand::PlayNext { respond_to } => {
                let result = self.controller.play_next().await;
                let _ = respond_to.send(result);
            }
            PlayerCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.controller.snapshot());
            }
            PlayerCommand::Shutdown { respond_to } => {
                if let Err(e) = self.controller.close().await {
                    warn!("Failed to close playback on shutdown: {}", e);
                }
                let _ = respond_to.send(());
                return false;
            }
        }
        true
    }

    async fn perform(&mut self, action: PlayerAction) -> Result<(), PlaybackError> {
        let controller = &mut self.controller;
        match action {
            PlayerAction::Close => controller.close().await,
            PlayerAction::TogglePlay => controller.toggle_play().await,
            PlayerAction::Seek(delta) => controller.seek(delta).await,
            PlayerAction::SeekToFraction(fraction) => controller.seek_to_fraction(fraction).await,
            PlayerAction::SetVolume(volume) => controller.set_volume(volume).await,
            PlayerAction::ToggleMute => controller.toggle_mute().await,
            PlayerAction::SetQuality(quality) => controller.set_quality(&quality).await,
            PlayerAction::ToggleSubtitles => controller.toggle_subtitles().await,
            PlayerAction::ToggleFullscreen => controller.toggle_fullscreen().await,
            PlayerAction::ToggleSettings => {
                controller.toggle_settings();
                Ok(())
            }
            PlayerAction::Tap(side) => controller.tap(side).await,
            PlayerAction::PointerMoved => {
                controller.pointer_moved();
                Ok(())
            }
        }
    }

    async fn handle_environment(&mut self, event: EnvironmentEvent) {
        let action = match event {
            EnvironmentEvent::PointerMoved => PlayerAction::PointerMoved,
            EnvironmentEvent::FullscreenChanged => {
                self.controller.sync_fullscreen().await;
                return;
            }
            EnvironmentEvent::KeyPressed(key) => match key {
                Key::Space => PlayerAction::TogglePlay,
                Key::Char('f') => PlayerAction::ToggleFullscreen,
                Key::ArrowRight => PlayerAction::Seek(self.skip_seconds),
                Key::ArrowLeft => PlayerAction::Seek(-self.skip_seconds),
                _ => return,
            },
        };

        if let Err(e) = self.perform(action).await {
            warn!("Failed to handle {:?}: {}", event, e);
        }
    }
}

/// Cloneable handle for talking to a running [`PlayerService`]
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    sender: mpsc::UnboundedSender<PlayerCommand>,
}

impl PlayerHandle {
    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> PlayerCommand) -> Result<T> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(command(respond_to))
            .map_err(|_| anyhow!("Player controller disconnected"))?;
        response
            .await
            .map_err(|_| anyhow!("Failed to receive response from player controller"))
    }

    async fn perform(&self, action: PlayerAction) -> Result<()> {
        self.request(|respond_to| PlayerCommand::Perform { action, respond_to })
            .await?
            .map_err(Into::into)
    }

    /// Assign a new playback target
    pub async fn load(&self, target: PlaybackTarget) -> Result<()> {
        self.request(|respond_to| PlayerCommand::Load {
            target: Box::new(target),
            respond_to,
        })
        .await?
        .map_err(Into::into)
    }

    pub async fn close(&self) -> Result<()> {
        self.perform(PlayerAction::Close).await
    }

    pub async fn toggle_play(&self) -> Result<()> {
        self.perform(PlayerAction::TogglePlay).await
    }

    pub async fn seek(&self, delta_seconds: f64) -> Result<()> {
        self.perform(PlayerAction::Seek(delta_seconds)).await
    }

    pub async fn seek_to_fraction(&self, fraction: f64) -> Result<()> {
        self.perform(PlayerAction::SeekToFraction(fraction)).await
    }

    pub async fn set_volume(&self, volume: f64) -> Result<()> {
        self.perform(PlayerAction::SetVolume(volume)).await
    }

    pub async fn toggle_mute(&self) -> Result<()> {
        self.perform(PlayerAction::ToggleMute).await
    }

    pub async fn set_quality(&self, quality: &str) -> Result<()> {
        self.perform(PlayerAction::SetQuality(quality.to_string()))
            .await
    }

    pub async fn toggle_subtitles(&self) -> Result<()> {
        self.perform(PlayerAction::ToggleSubtitles).await
    }

    pub async fn toggle_fullscreen(&self) -> Result<()> {
        self.perform(PlayerAction::ToggleFullscreen).await
    }

    pub async fn toggle_settings(&self) -> Result<()> {
        self.perform(PlayerAction::ToggleSettings).await
    }

    pub async fn tap(&self, side: TapSide) -> Result<()> {
        self.perform(PlayerAction::Tap(side)).await
    }

    /// Returns false when the current episode is the last of its season
    pub async fn play_next(&self) -> Result<bool> {
        self.request(|respond_to| PlayerCommand::PlayNext { respond_to })
            .await?
            .map_err(Into::into)
    }

    pub async fn snapshot(&self) -> Result<PlayerSnapshot> {
        self.request(|respond_to| PlayerCommand::Snapshot { respond_to })
            .await
    }

    /// Close playback and stop the service loop
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|respond_to| PlayerCommand::Shutdown { respond_to })
            .await
    }
}
