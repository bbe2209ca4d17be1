//! Player settings.
//!
//! Loaded with the `config` crate from an optional TOML file plus `KIOSK__*`
//! environment overrides. Every field has a default, so an empty environment
//! still yields a working player.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Local path or http(s) URL of the playlist document.
    pub playlist: String,
    /// Write the event log to daily files under `log_dir`.
    pub log_to_file: bool,
    /// Directory for the daily event log files.
    pub log_dir: PathBuf,
    /// Days of event log files to keep.
    pub log_retention_days: u32,
    pub timings: Timings,
    pub headless: HeadlessSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            playlist: "playlist.json".to_string(),
            log_to_file: true,
            log_dir: PathBuf::from("log"),
            log_retention_days: 1,
            timings: Timings::default(),
            headless: HeadlessSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from `path` (required when given) or from an optional
    /// `kiosk.toml` in the working directory, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name("kiosk").required(false)),
        };

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix("KIOSK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        tracing::debug!("Loaded settings: {:?}", settings);
        Ok(settings)
    }
}

/// Delays used by the playback state machine, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// From crossfade trigger to the visual role swap.
    pub crossfade_settle_ms: u64,
    /// From the visual role swap to the end of the crossfade.
    pub crossfade_fade_ms: u64,
    /// Back-off before re-attempting a play request that hit a running crossfade.
    pub play_retry_ms: u64,
    /// Delay before the muted retry after an autoplay rejection.
    pub autoplay_retry_ms: u64,
    /// Delay before unmuting after a successful muted retry.
    pub unmute_delay_ms: u64,
    /// How long a "playable" signal waits for a "fully buffered" one.
    pub readiness_grace_ms: u64,
    /// Display time for images without an explicit duration.
    pub image_duration_ms: u64,
    /// Hard limit on image pre-loading.
    pub image_watchdog_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            crossfade_settle_ms: 100,
            crossfade_fade_ms: 1000,
            play_retry_ms: 500,
            autoplay_retry_ms: 500,
            unmute_delay_ms: 1000,
            readiness_grace_ms: 500,
            image_duration_ms: 5000,
            image_watchdog_ms: 10_000,
        }
    }
}

impl Timings {
    pub fn crossfade_settle(&self) -> Duration {
        Duration::from_millis(self.crossfade_settle_ms)
    }

    pub fn crossfade_fade(&self) -> Duration {
        Duration::from_millis(self.crossfade_fade_ms)
    }

    pub fn play_retry(&self) -> Duration {
        Duration::from_millis(self.play_retry_ms)
    }

    pub fn autoplay_retry(&self) -> Duration {
        Duration::from_millis(self.autoplay_retry_ms)
    }

    pub fn unmute_delay(&self) -> Duration {
        Duration::from_millis(self.unmute_delay_ms)
    }

    pub fn readiness_grace(&self) -> Duration {
        Duration::from_millis(self.readiness_grace_ms)
    }

    pub fn image_duration(&self) -> Duration {
        Duration::from_millis(self.image_duration_ms)
    }

    pub fn image_watchdog(&self) -> Duration {
        Duration::from_millis(self.image_watchdog_ms)
    }
}

/// Settings for the headless host.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HeadlessSettings {
    /// How long the headless host pretends a video plays before ending it.
    pub video_duration_ms: u64,
}

impl Default for HeadlessSettings {
    fn default() -> Self {
        Self {
            video_duration_ms: 15_000,
        }
    }
}

impl HeadlessSettings {
    pub fn video_duration(&self) -> Duration {
        Duration::from_millis(self.video_duration_ms)
    }
}
