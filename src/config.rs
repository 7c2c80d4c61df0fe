//! Session preferences
//!
//! Small persisted configuration: the default sort order new sessions start
//! with and transfer tuning. Loading is tolerant; a missing or unparsable
//! file falls back to defaults so a session can always be constructed.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::tree::sort::SortSpec;

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Persisted session preferences
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Default sort order applied to new sessions
    pub sorting: SortSpec,
    /// Transfer tuning
    pub transfers: TransferConfig,
}

/// Transfer tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Streaming chunk size in bytes
    pub chunk_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Config {
    /// Load configuration from the default location; defaults on any error.
    pub fn load() -> Self {
        match config_file() {
            Some(path) => Self::load_from(&path),
            None => Config::default(),
        }
    }

    /// Load configuration from an explicit path; defaults on any error.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => match toml_edit::de::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    warn!(error = %e, "could not parse config file, using defaults");
                    Config::default()
                }
            },
            Err(_) => Config::default(),
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let path = config_file().ok_or("Could not determine config path")?;
        self.save_to(&path)
    }

    /// Save configuration to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = toml_edit::ser::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Config directory for the current platform
pub fn config_dir() -> Option<PathBuf> {
    // XDG_CONFIG_HOME first, then ~/.config
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|p| PathBuf::from(p).join(".config"))
        })
        .map(|p| p.join("spyglass"))
}

/// Config file path
pub fn config_file() -> Option<PathBuf> {
    config_dir().map(|p| p.join("config.toml"))
}
