//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Every section is `#[serde(default)]` so a partial `settings.toml` only
//! overrides the keys it names.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// TimerConfig
// ---------------------------------------------------------------------------

/// Pomodoro cycle lengths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// Length of one work period in minutes.
    pub work_minutes: u32,
    /// Length of the break after periods `1..total` in minutes.
    pub short_break_minutes: u32,
    /// Length of the break after the last period of a cycle in minutes.
    pub long_break_minutes: u32,
    /// Number of work periods before the long break.
    pub total_work_periods: u32,
    /// Countdown granularity in milliseconds.
    pub tick_interval_ms: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            work_minutes: 25,
            short_break_minutes: 5,
            long_break_minutes: 15,
            total_work_periods: 4,
            tick_interval_ms: 1000,
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Mixer defaults and radio speed bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Initial gain of the music (radio) lane, `0.0 – 1.0`.
    pub music_volume: f32,
    /// Initial gain of the rain lane, `0.0 – 1.0`.
    pub rain_volume: f32,
    /// Initial gain of the vinyl lane, `0.0 – 1.0`.
    pub vinyl_volume: f32,
    /// Slider resolution for the three volume controls.
    pub volume_step: f32,
    /// Initial radio playback rate.
    pub default_speed: f32,
    pub min_speed: f32,
    pub max_speed: f32,
    /// Playback-rate slider resolution.
    pub speed_step: f32,
    /// Gap between the two chimes announcing the long break.
    pub double_chime_delay_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            music_volume: 0.6,
            rain_volume: 0.3,
            vinyl_volume: 0.8,
            volume_step: 0.01,
            default_speed: 1.0,
            min_speed: 0.85,
            max_speed: 1.2,
            speed_step: 0.05,
            double_chime_delay_ms: 500,
        }
    }
}

impl AudioConfig {
    /// Clamp `rate` into `[min_speed, max_speed]` and snap it to the nearest
    /// `speed_step` counted from `min_speed`.
    ///
    /// ```
    /// use pomodoro_radio::config::AudioConfig;
    ///
    /// let cfg = AudioConfig::default();
    /// assert!((cfg.snap_speed(1.03) - 1.05).abs() < 1e-6);
    /// assert!((cfg.snap_speed(9.0) - 1.2).abs() < 1e-6);
    /// ```
    pub fn snap_speed(&self, rate: f32) -> f32 {
        let clamped = rate.clamp(self.min_speed, self.max_speed);
        if self.speed_step <= 0.0 {
            return clamped;
        }
        let steps = ((clamped - self.min_speed) / self.speed_step).round();
        let snapped = self.min_speed + steps * self.speed_step;
        // Keep two decimals so 0.85 + 3 × 0.05 reads back as exactly 1.0.
        ((snapped * 100.0).round() / 100.0).clamp(self.min_speed, self.max_speed)
    }
}

// ---------------------------------------------------------------------------
// RadioConfig
// ---------------------------------------------------------------------------

/// Internet radio endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    /// Audio stream URL (MP3/AAC over HTTP).
    pub stream_url: String,
    /// Server-sent-events endpoint delivering now-playing updates.
    pub metadata_url: String,
    /// Seconds to wait before re-subscribing after the metadata feed drops.
    pub metadata_retry_secs: u64,
    /// Connect timeout for both endpoints.
    pub connect_timeout_secs: u64,
    /// Seconds of decoded audio kept ahead of the output before the decoder
    /// waits.
    pub buffer_secs: f32,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            stream_url: "https://stream.zeno.fm/0r0xa792kwzuv".into(),
            metadata_url: "https://api.zeno.fm/mounts/metadata/subscribe/0r0xa792kwzuv".into(),
            metadata_retry_secs: 5,
            connect_timeout_secs: 10,
            buffer_secs: 2.0,
        }
    }
}

// ---------------------------------------------------------------------------
// AssetsConfig
// ---------------------------------------------------------------------------

/// Locations of the loop and cue samples.
///
/// Relative paths are resolved against [`AppPaths::assets_dir`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    pub rain: PathBuf,
    pub vinyl: PathBuf,
    pub ding: PathBuf,
    pub alarm: PathBuf,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            rain: "rain.wav".into(),
            vinyl: "vinyl.wav".into(),
            ding: "ding.wav".into(),
            alarm: "alarmbeep.wav".into(),
        }
    }
}

impl AssetsConfig {
    /// `(sample name, absolute path)` pairs, in load order.
    pub fn resolve(&self, assets_dir: &Path) -> Vec<(String, PathBuf)> {
        let resolve = |p: &PathBuf| {
            if p.is_absolute() {
                p.clone()
            } else {
                assets_dir.join(p)
            }
        };

        vec![
            (crate::audio::SAMPLE_RAIN.to_string(), resolve(&self.rain)),
            (crate::audio::SAMPLE_VINYL.to_string(), resolve(&self.vinyl)),
            (crate::audio::CUE_DING.to_string(), resolve(&self.ding)),
            (crate::audio::CUE_ALARM.to_string(), resolve(&self.alarm)),
        ]
    }
}

// ---------------------------------------------------------------------------
// UiConfig
// ---------------------------------------------------------------------------

/// egui window settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Initial inner size `(width, height)` in logical pixels.
    pub window_size: (f32, f32),
    /// Keep the window floating above all other windows.
    pub always_on_top: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            window_size: (360.0, 430.0),
            always_on_top: false,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use pomodoro_radio::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Pomodoro cycle lengths.
    pub timer: TimerConfig,
    /// Mixer defaults.
    pub audio: AudioConfig,
    /// Stream + metadata endpoints.
    pub radio: RadioConfig,
    /// Sample file locations.
    pub assets: AssetsConfig,
    /// Window settings.
    pub ui: UiConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
