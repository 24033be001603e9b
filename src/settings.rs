//! Settings persistence using TOML
//!
//! Stores settings in ~/.config/srs-versus/settings.toml (or platform equivalent)

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Application settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub timing: TimingSettings,
    pub network: NetworkSettings,
    pub logging: LoggingSettings,
}

/// Game timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    /// Lock delay in milliseconds
    pub lock_delay_ms: u64,
    /// Delay between a lock and the next spawn, in milliseconds
    pub are_ms: u64,
    /// Time full rows stay visible before they are removed, in milliseconds
    pub clear_delay_ms: u64,
    /// How often the board is mirrored to the opponent, in milliseconds
    pub state_sync_ms: u64,
}

/// Relay connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Relay address, "host:port"
    pub relay_addr: String,
    /// Name announced to the opponent
    pub player_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing` filter directive, overridden by RUST_LOG
    pub filter: String,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            lock_delay_ms: 500,
            are_ms: 200,
            clear_delay_ms: 0,
            state_sync_ms: 250,
        }
    }
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            relay_addr: "127.0.0.1:3000".to_string(),
            player_name: "Player".to_string(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "srs_versus=info".to_string(),
        }
    }
}

impl TimingSettings {
    pub fn lock_delay(&self) -> Duration {
        Duration::from_millis(self.lock_delay_ms)
    }

    pub fn are(&self) -> Duration {
        Duration::from_millis(self.are_ms)
    }

    pub fn clear_delay(&self) -> Duration {
        Duration::from_millis(self.clear_delay_ms)
    }

    pub fn state_sync(&self) -> Duration {
        Duration::from_millis(self.state_sync_ms.max(1))
    }
}

impl Settings {
    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        ProjectDirs::from("com", "srs-versus", "srs-versus")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("settings.toml"))
    }

    /// Load settings from the config directory, or defaults
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load settings from a file. A missing file gives defaults, a malformed
    /// one is logged and ignored.
    pub fn load_from(path: &Path) -> Self {
        let Ok(contents) = fs::read_to_string(path) else {
            return Self::default();
        };
        toml::from_str(&contents).unwrap_or_else(|e| {
            warn!("ignoring malformed settings file {}: {}", path.display(), e);
            Self::default()
        })
    }

    /// Save settings to the config directory
    pub fn save(&self) -> Result<()> {
        let path = Self::settings_path().context("could not determine config directory")?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create config dir {}", dir.display()))?;
        }
        let contents = toml::to_string_pretty(self).context("failed to serialize settings")?;
        fs::write(path, contents)
            .with_context(|| format!("failed to write settings to {}", path.display()))?;
        Ok(())
    }
}
