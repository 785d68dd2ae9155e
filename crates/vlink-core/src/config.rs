//! Configuration system for vlink.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $VLINK_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/vlink/config.toml
//!   3. ~/.config/vlink/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VlinkConfig {
    pub server: ServerConfig,
    pub catalog: CatalogConfig,
    pub transfer: TransferSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the rendezvous server binds to.
    pub bind: String,
    /// Listening port for HTTP and WebSocket traffic.
    pub port: u16,
    /// Directory static assets are served from.
    pub static_dir: PathBuf,
    /// Page served for `/` and for any missing static resource.
    pub default_page: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// JSON file the shared catalog is loaded from and persisted to.
    /// None = in-memory only.
    pub persist_path: Option<PathBuf>,
    /// Shared secret required to replace the catalog. None = any peer may publish.
    pub control_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferSettings {
    /// Bytes per binary frame on the peer channel.
    pub chunk_size: usize,
    /// Pause sending once the channel has more than this many bytes buffered.
    pub high_water_mark: usize,
    /// Resume sending once the buffered amount drains to this level.
    pub low_water_mark: usize,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

/// Default chunk budget: 64 KiB per binary frame.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 3000,
            static_dir: PathBuf::from("./public"),
            default_page: "client.html".to_string(),
        }
    }
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            high_water_mark: 1024 * 1024,
            low_water_mark: 256 * 1024,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("vlink")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl VlinkConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            VlinkConfig::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("VLINK_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&VlinkConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Reject transfer settings the flow-control loop cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.transfer;
        if t.chunk_size == 0 {
            return Err(ConfigError::Invalid("transfer.chunk_size must be > 0".into()));
        }
        if t.low_water_mark > t.high_water_mark {
            return Err(ConfigError::Invalid(format!(
                "transfer.low_water_mark ({}) exceeds high_water_mark ({})",
                t.low_water_mark, t.high_water_mark
            )));
        }
        Ok(())
    }

    /// Apply VLINK_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("VLINK_SERVER__BIND") {
            self.server.bind = v;
        }
        if let Ok(v) = std::env::var("VLINK_SERVER__PORT") {
            if let Ok(p) = v.parse() {
                self.server.port = p;
            }
        }
        if let Ok(v) = std::env::var("VLINK_SERVER__STATIC_DIR") {
            self.server.static_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("VLINK_CATALOG__PERSIST_PATH") {
            self.catalog.persist_path = (!v.is_empty()).then(|| PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("VLINK_CATALOG__CONTROL_TOKEN") {
            self.catalog.control_token = (!v.is_empty()).then_some(v);
        }
        if let Ok(v) = std::env::var("VLINK_TRANSFER__CHUNK_SIZE") {
            if let Ok(n) = v.parse() {
                self.transfer.chunk_size = n;
            }
        }
    }
}
