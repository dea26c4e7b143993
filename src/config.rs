//! Config paths and controller settings.
//!
//! Directory priority:
//! 1. CLI `--config-dir`
//! 2. `SYNCVIEW_CONFIG_DIR` environment variable
//! 3. Local folder IF any known config file exists (syncview.json, syncview.log)
//! 4. Platform config directory from dirs-next
//!
//! Platform paths:
//! - Linux: ~/.config/syncview/{name}
//! - macOS: ~/Library/Application Support/syncview/{name}
//! - Windows: %APPDATA%\syncview\{name}

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::clock::Timecode;
use crate::core::controller::{ControllerConfig, MAX_SPEED, MAX_STREAMS, SpeedScope};
use crate::core::event_bus::DEFAULT_QUEUE_LIMIT;

pub const APP_DIR: &str = "syncview";
pub const SETTINGS_FILE: &str = "syncview.json";
pub const LOG_FILE: &str = "syncview.log";
pub const CONFIG_DIR_ENV: &str = "SYNCVIEW_CONFIG_DIR";

/// Configuration for overriding default application paths
#[derive(Debug, Clone, Default)]
pub struct PathConfig {
    /// Custom config directory (from CLI or ENV)
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    /// Priority: CLI args → ENV var (SYNCVIEW_CONFIG_DIR) → None (use defaults)
    pub fn from_env_and_cli(cli_dir: Option<PathBuf>) -> Self {
        let config_dir = cli_dir.or_else(|| std::env::var(CONFIG_DIR_ENV).ok().map(PathBuf::from));
        Self { config_dir }
    }

    pub fn config_dir(&self) -> PathBuf {
        // Priority 1: Custom directory from CLI or ENV
        if let Some(dir) = &self.config_dir {
            return dir.clone();
        }

        // Priority 2: Local folder IF config files exist there
        if let Ok(current_dir) = std::env::current_dir() {
            if has_local_config_files(&current_dir) {
                return current_dir;
            }
        }

        // Priority 3: Platform-specific config directory
        if let Some(dir) = dirs_next::config_dir() {
            return dir.join(APP_DIR);
        }

        PathBuf::from(".")
    }

    pub fn config_file(&self, name: &str) -> PathBuf {
        self.config_dir().join(name)
    }

    /// Create the config directory if missing
    pub fn ensure_dir(&self) -> Result<()> {
        let dir = self.config_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }
        Ok(())
    }
}

fn has_local_config_files(dir: &Path) -> bool {
    [SETTINGS_FILE, LOG_FILE].iter().any(|f| dir.join(f).exists())
}

/// Persistent controller settings (`syncview.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    pub stream_slots: usize,
    pub speed_scope: SpeedScope,
    pub default_speed: f64,
    /// Show hundredths in timecodes
    pub precise_timecode: bool,
    /// Deferred notification queue bound
    pub event_queue_limit: usize,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            stream_slots: 2,
            speed_scope: SpeedScope::Shared,
            default_speed: 1.0,
            precise_timecode: false,
            event_queue_limit: DEFAULT_QUEUE_LIMIT,
        }
    }
}

impl ControllerSettings {
    /// Load from `path`; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        let settings: Self = serde_json::from_str(&text)
            .with_context(|| format!("Invalid settings file: {}", path.display()))?;
        Ok(settings.sanitized())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write settings: {}", path.display()))
    }

    /// Clamp out-of-range values
    pub fn sanitized(mut self) -> Self {
        let slots = self.stream_slots.clamp(1, MAX_STREAMS);
        if slots != self.stream_slots {
            warn!("stream_slots {} out of range, using {}", self.stream_slots, slots);
            self.stream_slots = slots;
        }
        if !(self.default_speed.is_finite() && self.default_speed > 0.0) {
            warn!("default_speed {} invalid, using 1.0", self.default_speed);
            self.default_speed = 1.0;
        }
        self.default_speed = self.default_speed.min(MAX_SPEED);
        self.event_queue_limit = self.event_queue_limit.max(1);
        self
    }

    pub fn timecode(&self) -> Timecode {
        if self.precise_timecode {
            Timecode::Precise
        } else {
            Timecode::Standard
        }
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            slots: self.stream_slots,
            speed_scope: self.speed_scope,
            default_speed: self.default_speed,
            timecode: self.timecode(),
        }
    }
}
