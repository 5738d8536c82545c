// src/config.rs
use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::exercise::Exercise;
use crate::registry::EngineRegistry;

pub const CONFIG_ENV: &str = "REP_COUNTER_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub frame_timeout_ms: u64,
    pub emit_interval_ms: u64,
    pub placeholder_width: u32,
    pub placeholder_height: u32,
    pub reconnect_backoff_secs: u64,
    pub reconnect_attempts: u32,
    pub channel_capacity: usize,
    pub default_exercise: String,
    pub simulated_fps: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            frame_timeout_ms: 5_000,
            emit_interval_ms: 500,
            placeholder_width: 640,
            placeholder_height: 480,
            reconnect_backoff_secs: 10,
            reconnect_attempts: 10,
            channel_capacity: 32,
            default_exercise: Exercise::Pushup.id().to_string(),
            simulated_fps: 30,
        }
    }
}

impl Settings {
    /// Resolution order: explicit path, `$REP_COUNTER_CONFIG`, the platform
    /// config dir, then built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::from_file(Path::new(&path));
        }
        if let Some(path) = Self::default_path().filter(|p| p.exists()) {
            return Self::from_file(&path);
        }
        debug!("no settings file found, using defaults");
        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        let settings = Self::from_json(&text)
            .with_context(|| format!("Invalid settings in {}", path.display()))?;
        info!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "rep_counter")
            .map(|dirs| dirs.config_dir().join("settings.json"))
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.frame_timeout_ms > 0, "frame_timeout_ms must be positive");
        ensure!(self.channel_capacity > 0, "channel_capacity must be positive");
        ensure!(self.simulated_fps > 0, "simulated_fps must be positive");
        ensure!(
            self.placeholder_width > 0 && self.placeholder_height > 0,
            "placeholder size must be non-zero"
        );
        Ok(())
    }

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }

    pub fn emit_interval(&self) -> Duration {
        Duration::from_millis(self.emit_interval_ms)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_secs(self.reconnect_backoff_secs)
    }

    pub fn registry(&self) -> EngineRegistry {
        EngineRegistry::new(EngineRegistry::default().resolve(&self.default_exercise))
    }
}
