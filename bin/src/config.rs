//! The `keywatch.toml` configuration file.

use keywatch_detect::DetectionConfig;
use keywatch_fetch::ClientConfig;
use keywatch_store::StateManager;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while loading configuration.
#[derive(Error, Debug)]
pub(crate) enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`KeywatchConfig`].
    #[error("Failed to parse config '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Platform state reported by the CLI in place of a device integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct PlatformConfig {
    /// Exposure-notification authorization granted.
    pub(crate) authorized: bool,
    /// Exposure notifications switched on.
    pub(crate) enabled: bool,
    /// Proximity radio on.
    pub(crate) radio_enabled: bool,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            authorized: true,
            enabled: true,
            radio_enabled: true,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct KeywatchConfig {
    /// Where state files live. Defaults to the platform data directory.
    pub(crate) state_dir: Option<PathBuf>,
    pub(crate) detection: DetectionConfig,
    pub(crate) client: ClientConfig,
    pub(crate) platform: PlatformConfig,
}

impl KeywatchConfig {
    const FILE_NAME: &'static str = "keywatch.toml";

    /// Returns the default configuration file location.
    pub(crate) fn default_path() -> PathBuf {
        StateManager::default_path().join(Self::FILE_NAME)
    }

    /// Loads configuration from `path`, or from the default location.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::from_file(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Returns the state directory in effect.
    pub(crate) fn state_dir(&self) -> PathBuf {
        self.state_dir
            .clone()
            .unwrap_or_else(StateManager::default_path)
    }
}
