//! Configuration file schema and loader
//!
//! `config.toml` lives in the platform config directory. Every field has a
//! default, so a missing file or a partial file is fine.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Name of the config file inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

/// Default hub address
pub const DEFAULT_HUB_ADDR: &str = "127.0.0.1:7340";

/// Platform directories for BiteVibes
pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "bitevibes", "bitevibes")
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub hub: HubConfig,
    pub roulette: RouletteConfig,
    pub room: RoomConfig,
    pub sync: SyncConfig,
    /// Override for where the database lives
    pub data_dir: Option<PathBuf>,
}

/// Where the room/cloud hub is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub addr: String,
    pub request_timeout_ms: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_HUB_ADDR.to_string(),
            request_timeout_ms: 5000,
        }
    }
}

impl HubConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.addr
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                field: "hub.addr",
                value: self.addr.clone(),
            })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouletteConfig {
    pub muted: bool,
    /// Frames per second for the local animation
    pub frame_rate: u32,
}

impl Default for RouletteConfig {
    fn default() -> Self {
        Self {
            muted: false,
            frame_rate: 60,
        }
    }
}

impl RouletteConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.frame_rate.max(1)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Wait between a room spin starting and its result being published
    pub reveal_delay_ms: u64,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            reveal_delay_ms: 3000,
        }
    }
}

impl RoomConfig {
    pub fn reveal_delay(&self) -> Duration {
        Duration::from_millis(self.reveal_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub enabled: bool,
    /// Quiet period before menu edits are pushed to the cloud
    pub debounce_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: 2000,
        }
    }
}

impl SyncConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Error type for config loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value '{value}' for {field}")]
    InvalidValue { field: &'static str, value: String },
}

impl From<ConfigError> for crate::error::Error {
    fn from(e: ConfigError) -> Self {
        crate::error::Error::Config(e.to_string())
    }
}

impl Config {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Load from a file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.hub.socket_addr()?;
        Ok(config)
    }

    /// Directory holding the database
    pub fn data_dir(&self) -> Option<PathBuf> {
        self.data_dir
            .clone()
            .or_else(|| project_dirs().map(|dirs| dirs.data_dir().to_path_buf()))
    }
}
