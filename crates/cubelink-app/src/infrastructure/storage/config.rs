//! TOML-based configuration persistence.
//!
//! Reads and writes [`AppConfig`] to the platform-appropriate config file:
//! - Windows:  `%APPDATA%\CubeLink\config.toml`
//! - Linux:    `~/.config/cubelink/config.toml`
//! - macOS:    `~/Library/Application Support/CubeLink/config.toml`
//!
//! The configuration declares everything a session needs up front: the
//! token catalog (the fixed set of cube ids both devices know about), the
//! network settings for the desktop transport, and the list of paired
//! peers that `scan_peers` reports.  Example:
//!
//! ```toml
//! [game]
//! log_level = "info"
//! tokens = ["cube_1", "cube_2", "cube_3", "cube_4"]
//!
//! [network]
//! service_port = 47129
//! bind_address = "0.0.0.0"
//!
//! [[peers]]
//! name = "tablet"
//! address = "192.168.1.30:47129"
//! ```
//!
//! Fields annotated with `#[serde(default = "some_fn")]` use the return
//! value of `some_fn()` when the field is absent, so the app works on first
//! run (before a config file exists) and when upgrading from an older file
//! missing newer fields.

use std::path::PathBuf;

use cubelink_core::{Peer, PeerAddr, TokenCatalog, TokenId, SERVICE_NAME};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level application configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub game: GameConfig,
    pub network: NetworkConfig,
    #[serde(default)]
    pub peers: Vec<PeerEntry>,
}

/// Game session settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameConfig {
    /// Schema version string – bump when breaking changes are introduced.
    #[serde(default = "default_version")]
    pub version: String,
    /// Application name used in the service record.
    #[serde(default = "default_app_name")]
    pub app_name: String,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// The declared token catalog for the session.  Both devices must
    /// declare the same ids or received events will be ignored as unknown.
    #[serde(default = "default_tokens")]
    pub tokens: Vec<TokenId>,
}

/// Network settings for the desktop transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// Service port both sides rendezvous on.
    #[serde(default = "default_service_port")]
    pub service_port: u16,
    /// IP address to bind the listening socket to.  `"0.0.0.0"` binds all
    /// interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

/// Persisted record of a paired peer device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeerEntry {
    /// Display name shown when picking a peer.
    pub name: String,
    /// Transport address used to dial the peer.
    pub address: String,
}

impl From<&PeerEntry> for Peer {
    fn from(entry: &PeerEntry) -> Self {
        Peer {
            name: entry.name.clone(),
            address: PeerAddr::from(entry.address.clone()),
        }
    }
}

impl AppConfig {
    /// Builds the token catalog declared by this configuration.
    pub fn catalog(&self) -> TokenCatalog {
        TokenCatalog::new(self.game.tokens.iter().cloned())
    }

    /// Returns the configured paired peers as transport-level descriptors.
    pub fn peers(&self) -> Vec<Peer> {
        self.peers.iter().map(Peer::from).collect()
    }
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_version() -> String {
    "1.0".to_string()
}
fn default_app_name() -> String {
    SERVICE_NAME.to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_tokens() -> Vec<TokenId> {
    ["cube_1", "cube_2", "cube_3", "cube_4"]
        .map(TokenId::from)
        .to_vec()
}
fn default_service_port() -> u16 {
    cubelink_core::protocol::service::SERVICE_PORT
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            game: GameConfig::default(),
            network: NetworkConfig::default(),
            peers: Vec::new(),
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            app_name: default_app_name(),
            log_level: default_log_level(),
            tokens: default_tokens(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            service_port: default_service_port(),
            bind_address: default_bind_address(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config
/// base directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot
/// be determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads [`AppConfig`] from disk, returning `AppConfig::default()` if the
/// file does not yet exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not
/// found", and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let path = config_file_path()?;

    match std::fs::read_to_string(&path) {
        Ok(content) => {
            let cfg: AppConfig = toml::from_str(&content)?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io { path, source: e }),
    }
}

/// Persists `config` to disk, creating the config directory if needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    let path = config_file_path()?;

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(&path, content).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(())
}

/// Resolves the platform config base directory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        // %APPDATA% e.g. C:\Users\<user>\AppData\Roaming
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("CubeLink"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("cubelink"))
    }

    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support/CubeLink
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("CubeLink")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
