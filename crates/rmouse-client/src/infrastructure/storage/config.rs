//! TOML-based configuration persistence for the client application.
//!
//! Reads and writes `AppConfig` to the platform-appropriate config file:
//! - Windows:  `%APPDATA%\RMouse\config.toml`
//! - Linux:    `~/.config/rmouse/config.toml`
//! - macOS:    `~/Library/Application Support/RMouse/config.toml`
//!
//! # Example file
//!
//! ```toml
//! [peer]
//! address = "192.168.1.50:10888"
//!
//! [session]
//! password = "hunter2"
//! frame_block = 32
//! recv_timeout_ms = 1000
//!
//! [client]
//! log_level = "info"
//! ```
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` use the return
//! value of `some_fn()` when the field is absent from the TOML file.  This
//! allows the app to work correctly on first run (before a config file
//! exists) and when upgrading from an older config file that is missing
//! newer fields.
//!
//! # Environment overrides
//!
//! `RMOUSE_PEER` and `RMOUSE_PASSWORD` override the file values, so a
//! session can be pointed at a different sender without editing the file.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::run_session::SessionConfig;
use rmouse_core::protocol::commands::{AES_BLOCK_BYTES, DEFAULT_FRAME_BLOCK};

/// Error type for configuration operations.
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

    /// A value fails validation.  Fatal at startup, never mid-session.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level application configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub peer: PeerConfig,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub client: ClientSettings,
}

/// Which sender to connect to.  The address is rewritten after every
/// successful session so the last-used peer is remembered across runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeerConfig {
    /// `host:port` of the sender's UDP endpoint.
    #[serde(default = "default_peer_address")]
    pub address: String,
}

/// Session protocol settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSettings {
    /// Shared password.  Absent means the legacy plaintext protocol.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Padded plaintext size of every encrypted frame, in bytes.  Must be
    /// a multiple of the 16-byte AES block.
    #[serde(default = "default_frame_block")]
    pub frame_block: usize,
    /// Receive timeout in milliseconds; also the heartbeat cadence.
    #[serde(default = "default_recv_timeout_ms")]
    pub recv_timeout_ms: u64,
    /// Open attempts before giving up.  Absent retries forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_retry_limit: Option<u32>,
}

/// General client behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientSettings {
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_peer_address() -> String {
    "127.0.0.1:10888".to_string()
}
fn default_frame_block() -> usize {
    DEFAULT_FRAME_BLOCK
}
fn default_recv_timeout_ms() -> u64 {
    1000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            address: default_peer_address(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            password: None,
            frame_block: default_frame_block(),
            recv_timeout_ms: default_recv_timeout_ms(),
            open_retry_limit: None,
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
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
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory
/// cannot be determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from disk, returning `AppConfig::default()` if the
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

/// Persists `config` to disk.
///
/// Creates the config directory and file if they do not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    let path = config_file_path()?;

    // Ensure directory exists before writing.
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

/// Rewrites the remembered peer address after a session validated it.
///
/// # Errors
///
/// Returns [`ConfigError`] if the config cannot be loaded or saved.
pub fn remember_peer_address(address: &str) -> Result<(), ConfigError> {
    let mut config = load_config()?;
    if config.peer.address != address {
        config.peer.address = address.to_string();
        save_config(&config)?;
    }
    Ok(())
}

/// Applies `RMOUSE_PEER` and `RMOUSE_PASSWORD` on top of the file values.
pub fn apply_env_overrides(config: &mut AppConfig) {
    apply_overrides(
        config,
        std::env::var("RMOUSE_PEER").ok(),
        std::env::var("RMOUSE_PASSWORD").ok(),
    );
}

fn apply_overrides(config: &mut AppConfig, peer: Option<String>, password: Option<String>) {
    if let Some(peer) = peer {
        config.peer.address = peer;
    }
    if let Some(password) = password {
        config.session.password = Some(password);
    }
}

// ── Validation ────────────────────────────────────────────────────────────────

/// A validated configuration, ready to build the session from.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    /// Parsed peer socket address.
    pub peer: SocketAddr,
    /// Session parameters derived from the settings.
    pub session: SessionConfig,
}

/// Validates the loaded configuration and converts it to runtime types.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] for an unparsable peer address, an
/// empty (but present) password, a frame block that is not a positive
/// multiple of the AES block, or a zero receive timeout.
pub fn validate(config: &AppConfig) -> Result<ValidatedConfig, ConfigError> {
    let peer: SocketAddr = config
        .peer
        .address
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("peer address: {}", config.peer.address)))?;

    if let Some(password) = &config.session.password {
        if password.is_empty() {
            return Err(ConfigError::Invalid("password must not be empty".into()));
        }
    }
    let block = config.session.frame_block;
    if block == 0 || block % AES_BLOCK_BYTES != 0 {
        return Err(ConfigError::Invalid(format!(
            "frame_block {block} is not a positive multiple of {AES_BLOCK_BYTES}"
        )));
    }
    if config.session.recv_timeout_ms == 0 {
        return Err(ConfigError::Invalid("recv_timeout_ms must be positive".into()));
    }

    Ok(ValidatedConfig {
        peer,
        session: SessionConfig {
            password: config.session.password.clone(),
            frame_block: block,
            recv_timeout: Duration::from_millis(config.session.recv_timeout_ms),
            open_retry_limit: config.session.open_retry_limit,
        },
    })
}

/// Resolves the platform config base directory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        // %APPDATA% e.g. C:\Users\<user>\AppData\Roaming
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("RMouse"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("rmouse"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME")
            .map(|h| PathBuf::from(h).join("Library/Application Support/RMouse"))
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        // Arrange
        let config = AppConfig::default();

        // Act
        let validated = validate(&config).expect("defaults must validate");

        // Assert
        assert_eq!(validated.peer.port(), 10888);
        assert!(validated.session.password.is_none());
        assert_eq!(validated.session.frame_block, DEFAULT_FRAME_BLOCK);
        assert_eq!(validated.session.recv_timeout, Duration::from_millis(1000));
    }

    #[test]
    fn test_config_toml_round_trip() {
        // Arrange
        let mut config = AppConfig::default();
        config.peer.address = "192.168.1.50:10888".to_string();
        config.session.password = Some("hunter2".to_string());
        config.session.frame_block = 64;

        // Act
        let text = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&text).expect("parse");

        // Assert
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        // Arrange – a minimal file from an older version
        let text = r#"
            [peer]
            address = "10.0.0.7:10888"
        "#;

        // Act
        let parsed: AppConfig = toml::from_str(text).expect("parse");

        // Assert
        assert_eq!(parsed.peer.address, "10.0.0.7:10888");
        assert_eq!(parsed.session.frame_block, DEFAULT_FRAME_BLOCK);
        assert_eq!(parsed.client.log_level, "info");
    }

    #[test]
    fn test_env_overrides_replace_file_values() {
        // Arrange
        let mut config = AppConfig::default();

        // Act
        apply_overrides(
            &mut config,
            Some("10.1.1.1:9999".to_string()),
            Some("secret".to_string()),
        );

        // Assert
        assert_eq!(config.peer.address, "10.1.1.1:9999");
        assert_eq!(config.session.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_absent_env_overrides_keep_file_values() {
        let mut config = AppConfig::default();
        config.session.password = Some("from-file".to_string());

        apply_overrides(&mut config, None, None);

        assert_eq!(config.peer.address, default_peer_address());
        assert_eq!(config.session.password.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_unparsable_peer_address_is_invalid() {
        let mut config = AppConfig::default();
        config.peer.address = "not-an-address".to_string();

        let result = validate(&config);

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_empty_password_is_invalid() {
        let mut config = AppConfig::default();
        config.session.password = Some(String::new());

        let result = validate(&config);

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unaligned_frame_block_is_invalid() {
        let mut config = AppConfig::default();
        config.session.frame_block = 24;

        let result = validate(&config);

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_recv_timeout_is_invalid() {
        let mut config = AppConfig::default();
        config.session.recv_timeout_ms = 0;

        let result = validate(&config);

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
