use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub downloads: DownloadsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Second tap on the same side within this window is a skip
    #[serde(default = "default_double_tap_window_ms")]
    pub double_tap_window_ms: u64,

    #[serde(default = "default_skip_seconds")]
    pub skip_seconds: f64,

    /// How long the forward/rewind indicator stays up after a skip
    #[serde(default = "default_skip_indicator_ms")]
    pub skip_indicator_ms: u64,

    /// Controls hide after this much pointer inactivity while playing
    #[serde(default = "default_controls_hide_delay_ms")]
    pub controls_hide_delay_ms: u64,

    #[serde(default = "default_volume")]
    pub default_volume: f64,

    /// Volume restored by unmute when no audible level was ever set
    #[serde(default = "default_unmute_fallback_volume")]
    pub unmute_fallback_volume: f64,

    #[serde(default = "default_true")]
    pub autoplay: bool,

    #[serde(default = "default_true")]
    pub subtitles_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadsConfig {
    /// Failed tasks stay visible for this long before eviction
    #[serde(default = "default_error_grace_period_ms")]
    pub error_grace_period_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Stored when the server sends no Content-Type
    #[serde(default = "default_fallback_content_type")]
    pub fallback_content_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
}

impl Config {
    /// Load from the default location, writing defaults if no file exists yet
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            info!("No config file found, using defaults");
            let config = Config::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", path);
        let contents = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;
        config.validate()?;
        info!("Config loaded successfully");
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents).context("Failed to write config file")?;

        debug!("Config saved to {:?}", path);
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.playback.validate()?;
        self.downloads.validate()
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Failed to get config directory")?;
        Ok(config_dir.join("thelden").join("config.toml"))
    }
}

impl PlaybackConfig {
    pub fn double_tap_window(&self) -> Duration {
        Duration::from_millis(self.double_tap_window_ms)
    }

    pub fn skip_indicator_duration(&self) -> Duration {
        Duration::from_millis(self.skip_indicator_ms)
    }

    pub fn controls_hide_delay(&self) -> Duration {
        Duration::from_millis(self.controls_hide_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.double_tap_window_ms == 0 {
            return Err(anyhow::anyhow!("double_tap_window_ms must be greater than 0"));
        }

        if !(self.skip_seconds.is_finite() && self.skip_seconds > 0.0) {
            return Err(anyhow::anyhow!("skip_seconds must be a positive number"));
        }

        if self.controls_hide_delay_ms == 0 {
            return Err(anyhow::anyhow!("controls_hide_delay_ms must be greater than 0"));
        }

        if !(0.0..=1.0).contains(&self.default_volume) {
            return Err(anyhow::anyhow!("default_volume must be between 0 and 1"));
        }

        if !(self.unmute_fallback_volume > 0.0 && self.unmute_fallback_volume <= 1.0) {
            return Err(anyhow::anyhow!(
                "unmute_fallback_volume must be in (0, 1]"
            ));
        }

        Ok(())
    }
}

impl DownloadsConfig {
    pub fn error_grace_period(&self) -> Duration {
        Duration::from_millis(self.error_grace_period_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Configured database path or `<data dir>/thelden/downloads.db`
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.database_path {
            return Ok(path.clone());
        }
        let data_dir = dirs::data_dir().context("Failed to get data directory")?;
        Ok(data_dir.join("thelden").join("downloads.db"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            return Err(anyhow::anyhow!("request_timeout_secs must be greater than 0"));
        }

        if self.connect_timeout_secs == 0 {
            return Err(anyhow::anyhow!("connect_timeout_secs must be greater than 0"));
        }

        if self.fallback_content_type.trim().is_empty() {
            return Err(anyhow::anyhow!("fallback_content_type must not be empty"));
        }

        Ok(())
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            double_tap_window_ms: default_double_tap_window_ms(),
            skip_seconds: default_skip_seconds(),
            skip_indicator_ms: default_skip_indicator_ms(),
            controls_hide_delay_ms: default_controls_hide_delay_ms(),
            default_volume: default_volume(),
            unmute_fallback_volume: default_unmute_fallback_volume(),
            autoplay: default_true(),
            subtitles_enabled: default_true(),
        }
    }
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            error_grace_period_ms: default_error_grace_period_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            fallback_content_type: default_fallback_content_type(),
            database_path: None,
        }
    }
}

// Default value functions
fn default_double_tap_window_ms() -> u64 { 300 }
fn default_skip_seconds() -> f64 { 10.0 }
fn default_skip_indicator_ms() -> u64 { 500 }
fn default_controls_hide_delay_ms() -> u64 { 3000 }
fn default_volume() -> f64 { 1.0 }
fn default_unmute_fallback_volume() -> f64 { 0.5 }
fn default_true() -> bool { true }
fn default_error_grace_period_ms() -> u64 { 2000 }
fn default_request_timeout_secs() -> u64 { 300 }
fn default_connect_timeout_secs() -> u64 { 30 }
fn default_fallback_content_type() -> String { "video/mp4".to_string() }
