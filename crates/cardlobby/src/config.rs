//! Lobby configuration.
//!
//! The config file holds one section per platform so a single file can be
//! shipped for Linux and Windows hosts:
//!
//! ```json
//! {
//!   "linux":   { "port": 7043, "core_info": { "file_name": "./core" } },
//!   "windows": { "port": 7043, "core_info": { "file_name": "core.exe" } }
//! }
//! ```
//!
//! Every field except `core_info.file_name` has a default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use cardlobby_core::CoreInfo;
use cardlobby_room::RegistryConfig;
use serde::{Deserialize, Serialize};

/// Errors raised while loading or validating the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// The on-disk file: one [`LobbyConfig`] per platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub linux: LobbyConfig,
    pub windows: LobbyConfig,
}

impl PlatformConfig {
    /// The section for the platform this binary was built for. Every
    /// non-Windows host uses `linux`.
    pub fn select(self) -> LobbyConfig {
        if cfg!(windows) { self.windows } else { self.linux }
    }
}

/// Settings for one lobby process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LobbyConfig {
    /// Port the lobby listens on.
    pub port: u16,
    pub room_min_port: u16,
    pub room_max_port: u16,
    pub additional_cards_path: PathBuf,
    pub core_info: CoreInfo,
    /// Deadline for reading one packet from a client.
    pub packet_timeout_ms: u64,
    /// Deadline for writing one packet to a client.
    pub write_timeout_ms: u64,
    /// How long a freshly spawned core has to signal readiness.
    pub handshake_timeout_ms: u64,
    /// How long a catalog export may run.
    pub export_timeout_ms: u64,
    /// Age at which waiting rooms and running matches are reaped.
    pub abandon_after_secs: u64,
    pub housekeeping_interval_ms: u64,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            port: 7043,
            room_min_port: 37042,
            room_max_port: 39942,
            additional_cards_path: PathBuf::from("additional_cards/cards.json"),
            core_info: CoreInfo {
                file_name: String::new(),
                arguments: Vec::new(),
                working_directory: None,
            },
            packet_timeout_ms: 5_000,
            write_timeout_ms: 5_000,
            handshake_timeout_ms: 30_000,
            export_timeout_ms: 10_000,
            abandon_after_secs: 24 * 60 * 60,
            housekeeping_interval_ms: 1_000,
        }
    }
}

impl LobbyConfig {
    /// Reads the platform config at `path` and returns this platform's
    /// validated section.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let platforms: PlatformConfig =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let config = platforms.select();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.room_min_port > self.room_max_port {
            return Err(ConfigError::Invalid(format!(
                "room_min_port ({}) is above room_max_port ({})",
                self.room_min_port, self.room_max_port
            )));
        }
        if self.core_info.file_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "core_info.file_name must be set".into(),
            ));
        }
        if self.packet_timeout_ms == 0 || self.handshake_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "packet and handshake timeouts must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn packet_timeout(&self) -> Duration {
        Duration::from_millis(self.packet_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn export_timeout(&self) -> Duration {
        Duration::from_millis(self.export_timeout_ms)
    }

    pub fn housekeeping_interval(&self) -> Duration {
        // A zero period would make the interval timer panic.
        Duration::from_millis(self.housekeeping_interval_ms.max(1))
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            room_min_port: self.room_min_port,
            room_max_port: self.room_max_port,
            abandon_after: Duration::from_secs(self.abandon_after_secs),
        }
    }
}
