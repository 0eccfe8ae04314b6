//! Configuration management for camsync
//!
//! This module handles loading and managing application configuration
//! from config files and environment variables. Every polling budget and
//! interval used by the playback engine lives here rather than in code.

use crate::utils::error::{CamSyncError, IntoSyncError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Transport and display settings
    pub playback: PlaybackConfig,

    /// Synchronization budgets
    pub sync: SyncConfig,

    /// Decoding backend selection
    pub backend: BackendConfig,

    /// General application settings
    pub general: GeneralConfig,
}

/// Transport and display settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Interval between timer ticks that refresh the time display
    pub tick_interval_ms: u64,

    /// Speed presets offered as controls
    pub speeds: Vec<f32>,

    /// Skip steps in seconds offered as controls (negative rewinds)
    pub skip_steps: Vec<f64>,

    /// Playback rate applied when a selection is loaded
    pub initial_speed: f32,
}

/// Synchronization budgets for the bounded polling loops
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Delay between pre-buffer state polls
    pub prebuffer_poll_interval_ms: u64,

    /// Pre-buffer polls per session before a retry (and again after it)
    pub prebuffer_max_attempts: u32,

    /// Delay between post-seek watchdog polls
    pub watchdog_interval_ms: u64,

    /// Watchdog polls before giving up
    pub watchdog_max_attempts: u32,

    /// Delay after a skip before controls come back
    pub settle_delay_ms: u64,

    /// Decoder drift from the logical clock that gets reported
    pub drift_tolerance_ms: u64,
}

/// Backend kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process latency model, no real decoding
    Simulated,

    /// FFmpeg decoding (requires the `ffmpeg` feature)
    Ffmpeg,
}

/// Decoding backend configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Which backend to open files with
    pub kind: BackendKind,

    /// Duration reported by simulated media
    pub simulated_duration_secs: u64,

    /// Startup latency of simulated media
    pub simulated_startup_ms: u64,
}

/// General application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 250,
            speeds: vec![0.25, 0.5, 1.0, 2.0, 4.0],
            skip_steps: vec![-30.0, -0.25, 0.25, 30.0],
            initial_speed: 1.0,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            prebuffer_poll_interval_ms: 100,
            prebuffer_max_attempts: 30,
            watchdog_interval_ms: 100,
            watchdog_max_attempts: 10,
            settle_delay_ms: 1200,
            drift_tolerance_ms: 1500,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Simulated,
            simulated_duration_secs: 600,
            simulated_startup_ms: 400,
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl PlaybackConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl SyncConfig {
    pub fn prebuffer_poll_interval(&self) -> Duration {
        Duration::from_millis(self.prebuffer_poll_interval_ms)
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn drift_tolerance(&self) -> Duration {
        Duration::from_millis(self.drift_tolerance_ms)
    }
}

impl Config {
    /// Load configuration from various sources
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. Default values
    /// 2. System config file (/etc/camsync/config.toml on Linux)
    /// 3. User config file (~/.config/camsync/config.toml on Linux)
    /// 4. Environment variables (CAMSYNC_* prefix)
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(system_path) = Self::system_config_path() {
            if system_path.exists() {
                config = Self::from_file(&system_path)?;
            }
        }

        if let Some(user_path) = Self::user_config_path() {
            if user_path.exists() {
                config = Self::from_file(&user_path)?;
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Load from an explicit file, then apply env overrides and validate
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to user config file
    pub fn save(&self) -> Result<()> {
        let path = Self::user_config_path()
            .ok_or_else(|| CamSyncError::Config("Cannot determine user config path".to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).config_err("Failed to create config directory")?;
        }

        let toml = toml::to_string_pretty(self).config_err("Failed to serialize config")?;
        std::fs::write(&path, toml).config_err("Failed to write config file")?;

        Ok(())
    }

    /// Parse a TOML file; missing keys fall back to defaults
    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).config_err("Failed to read config file")?;
        toml::from_str(&contents).config_err("Failed to parse config file")
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(tick) = std::env::var("CAMSYNC_TICK_INTERVAL_MS") {
            self.playback.tick_interval_ms = tick
                .parse()
                .map_err(|_| CamSyncError::Config("Invalid CAMSYNC_TICK_INTERVAL_MS".to_string()))?;
        }

        if let Ok(attempts) = std::env::var("CAMSYNC_PREBUFFER_ATTEMPTS") {
            self.sync.prebuffer_max_attempts = attempts
                .parse()
                .map_err(|_| CamSyncError::Config("Invalid CAMSYNC_PREBUFFER_ATTEMPTS".to_string()))?;
        }

        if let Ok(attempts) = std::env::var("CAMSYNC_WATCHDOG_ATTEMPTS") {
            self.sync.watchdog_max_attempts = attempts
                .parse()
                .map_err(|_| CamSyncError::Config("Invalid CAMSYNC_WATCHDOG_ATTEMPTS".to_string()))?;
        }

        if let Ok(kind) = std::env::var("CAMSYNC_BACKEND") {
            self.backend.kind = match kind.to_ascii_lowercase().as_str() {
                "simulated" => BackendKind::Simulated,
                "ffmpeg" => BackendKind::Ffmpeg,
                _ => return Err(CamSyncError::Config(format!("Invalid CAMSYNC_BACKEND '{}'", kind))),
            };
        }

        if let Ok(log_level) = std::env::var("CAMSYNC_LOG_LEVEL") {
            self.general.log_level = log_level;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.playback.tick_interval_ms == 0 || self.playback.tick_interval_ms >= 1000 {
            return Err(CamSyncError::Config(
                "Tick interval must be between 1 and 999 ms".to_string(),
            ));
        }

        if self.playback.speeds.iter().any(|s| !(*s > 0.0 && *s <= 16.0)) {
            return Err(CamSyncError::Config("Speeds must be in (0, 16]".to_string()));
        }

        if !(self.playback.initial_speed > 0.0 && self.playback.initial_speed <= 16.0) {
            return Err(CamSyncError::Config("Initial speed must be in (0, 16]".to_string()));
        }

        if self.playback.skip_steps.iter().any(|s| !s.is_finite() || *s == 0.0) {
            return Err(CamSyncError::Config("Skip steps must be finite and non-zero".to_string()));
        }

        if self.sync.prebuffer_max_attempts == 0 || self.sync.watchdog_max_attempts == 0 {
            return Err(CamSyncError::Config("Attempt budgets must be non-zero".to_string()));
        }

        if self.sync.prebuffer_poll_interval_ms == 0 || self.sync.watchdog_interval_ms == 0 {
            return Err(CamSyncError::Config("Poll intervals must be non-zero".to_string()));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.general.log_level.as_str()) {
            return Err(CamSyncError::Config(format!(
                "Invalid log level '{}', must be one of: {:?}",
                self.general.log_level, valid_log_levels
            )));
        }

        Ok(())
    }

    /// Get system config file path
    fn system_config_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        return Some(PathBuf::from("/etc/camsync/config.toml"));

        #[cfg(target_os = "windows")]
        return std::env::var("PROGRAMDATA")
            .ok()
            .map(|p| PathBuf::from(p).join("CamSync").join("config.toml"));

        #[cfg(target_os = "macos")]
        return Some(PathBuf::from("/Library/Application Support/CamSync/config.toml"));

        #[allow(unreachable_code)]
        None
    }

    /// Get user config file path
    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("camsync").join("config.toml"))
    }
}
