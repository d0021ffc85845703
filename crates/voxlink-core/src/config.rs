//! Session configuration.
//!
//! Stored as JSON; every field has a default, so a partial file (or none at
//! all) is valid.

use crate::join::Duration;
use crate::stroke::PenLabel;
use crate::sync::PUSHER_PROTOCOL_VERSION;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Prefix Pusher requires for channels with authenticated subscriptions.
pub const PRIVATE_CHANNEL_PREFIX: &str = "private-";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Channel name without the `private-` prefix.
    pub channel: String,
    /// Pusher application key.
    pub app_key: String,
    /// Pusher cluster (e.g., "us2").
    pub cluster: String,
    /// Websocket base URL overriding the Pusher cluster host
    /// (e.g., "ws://localhost:3030" for a local relay).
    pub host: Option<String>,
    /// HTTP endpoint that signs private channel subscriptions.
    pub auth_endpoint: Option<String>,
    /// URL of the loaded volume; names exported files.
    pub volume_url: Option<String>,
    /// How long to wait for a snapshot after subscribing.
    pub join_timeout_ms: u64,
    /// Slice fraction scrolled per wheel event.
    pub scroll_step: f64,
    pub initial_pen: PenLabel,
    pub draw_opacity: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            channel: "cs410".to_string(),
            app_key: String::new(),
            cluster: "us2".to_string(),
            host: None,
            auth_endpoint: None,
            volume_url: None,
            join_timeout_ms: 2000,
            scroll_step: 0.01,
            initial_pen: PenLabel::RED,
            draw_opacity: 0.8,
        }
    }
}

impl SessionConfig {
    /// Full channel name (`private-<channel>`).
    pub fn channel_name(&self) -> String {
        if self.channel.starts_with(PRIVATE_CHANNEL_PREFIX) {
            self.channel.clone()
        } else {
            format!("{}{}", PRIVATE_CHANNEL_PREFIX, self.channel)
        }
    }

    /// Websocket URL of the channel server.
    pub fn socket_url(&self) -> String {
        let base = match &self.host {
            Some(host) => host.trim_end_matches('/').to_string(),
            None => format!("wss://ws-{}.pusher.com:443", self.cluster),
        };
        format!(
            "{}/app/{}?protocol={}&client=voxlink&version={}&flash=false",
            base,
            self.app_key,
            PUSHER_PROTOCOL_VERSION,
            env!("CARGO_PKG_VERSION")
        )
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn from_json(json: &str) -> ConfigResult<Self> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn to_json(&self) -> ConfigResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load a config file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_json(&json)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Write a config file, creating parent directories.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::Io(format!("Failed to create {}: {}", parent.display(), e)))?;
        }
        std::fs::write(path, self.to_json()?)
            .map_err(|e| ConfigError::Io(format!("Failed to write {}: {}", path.display(), e)))
    }

    /// Default config file location.
    ///
    /// On Unix: `~/.config/voxlink/config.json`
    /// On Windows: `%APPDATA%\voxlink\config.json`
    #[cfg(not(target_arch = "wasm32"))]
    pub fn default_path() -> Option<std::path::PathBuf> {
        dirs::config_dir().map(|dir| dir.join("voxlink").join("config.json"))
    }

    /// Load from `path`, or defaults if that file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> ConfigResult<Self> {
        match path {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.channel_name(), "private-cs410");
        assert_eq!(config.join_timeout(), Duration::from_secs(2));
        assert_eq!(config.initial_pen, PenLabel(1));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = SessionConfig::from_json(r#"{"channel":"lab","app_key":"abc"}"#).unwrap();
        assert_eq!(config.channel_name(), "private-lab");
        assert_eq!(config.cluster, "us2");
        assert_eq!(config.scroll_step, 0.01);
    }

    #[test]
    fn test_prefixed_channel_kept() {
        let config = SessionConfig { channel: "private-x".to_string(), ..Default::default() };
        assert_eq!(config.channel_name(), "private-x");
    }

    #[test]
    fn test_socket_url() {
        let config = SessionConfig { app_key: "abc".to_string(), ..Default::default() };
        assert!(config.socket_url().starts_with("wss://ws-us2.pusher.com:443/app/abc?protocol=7"));

        let local = SessionConfig { host: Some("ws://localhost:3030/".to_string()), ..config };
        assert!(local.socket_url().starts_with("ws://localhost:3030/app/abc?"));
    }

    #[test]
    fn test_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = SessionConfig {
            volume_url: Some("visiblehuman.nii.gz".to_string()),
            ..Default::default()
        };

        config.save(&path).unwrap();
        assert_eq!(SessionConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.json");
        assert!(matches!(SessionConfig::load(&path), Err(ConfigError::Io(_))));
        assert_eq!(SessionConfig::load_or_default(Some(&path)).unwrap(), SessionConfig::default());
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(SessionConfig::load(&path), Err(ConfigError::Parse(_))));
    }
}
