use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::chat::matrix::MatrixConfig;
use crate::job::DEFAULT_FORMAT;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub downloads: DownloadConfig,
    #[serde(default)]
    pub state: StateConfig,
}

/// Chat homeserver and bot identity
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatConfig {
    #[serde(default = "default_homeserver")]
    pub homeserver: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default = "default_device_name")]
    pub device_name: String,
    /// Long-poll timeout for each sync request
    #[serde(default = "default_sync_timeout_ms")]
    pub sync_timeout_ms: u64,
    /// Access token (loaded from environment, not from config file)
    #[serde(skip)]
    pub access_token: Option<String>,
    /// Password for login (loaded from environment, not from config file)
    #[serde(skip)]
    pub password: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            homeserver: default_homeserver(),
            user_id: String::new(),
            device_name: default_device_name(),
            sync_timeout_ms: default_sync_timeout_ms(),
            access_token: None,
            password: None,
        }
    }
}

impl ChatConfig {
    pub fn sync_timeout(&self) -> Duration {
        Duration::from_millis(self.sync_timeout_ms)
    }

    pub fn has_credentials(&self) -> bool {
        self.access_token.is_some() || self.password.is_some()
    }

    pub fn matrix_config(&self) -> MatrixConfig {
        MatrixConfig {
            homeserver: self.homeserver.clone(),
            user_id: self.user_id.clone(),
            device_name: self.device_name.clone(),
            access_token: self.access_token.clone(),
            password: self.password.clone(),
            sync_timeout: self.sync_timeout(),
        }
    }
}

fn default_homeserver() -> String {
    "https://matrix.org".to_string()
}

fn default_device_name() -> String {
    "fetchbot".to_string()
}

fn default_sync_timeout_ms() -> u64 {
    10_000
}

/// Where and how media is fetched
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadConfig {
    #[serde(default = "default_destination_dir")]
    pub destination_dir: PathBuf,
    #[serde(default = "default_format")]
    pub default_format: String,
    /// Container used when separate video and audio streams are merged
    #[serde(default = "default_merge_output_format")]
    pub merge_output_format: String,
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: PathBuf,
    /// Passed to the engine verbatim, before the URL
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            destination_dir: default_destination_dir(),
            default_format: default_format(),
            merge_output_format: default_merge_output_format(),
            ytdlp_path: default_ytdlp_path(),
            extra_args: Vec::new(),
        }
    }
}

fn default_destination_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_format() -> String {
    DEFAULT_FORMAT.to_string()
}

fn default_merge_output_format() -> String {
    "mkv".to_string()
}

fn default_ytdlp_path() -> PathBuf {
    PathBuf::from("yt-dlp")
}

/// Persisted bot state
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StateConfig {
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

fn default_state_path() -> PathBuf {
    PathBuf::from("data/state")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.chat.homeserver, "https://matrix.org");
        assert_eq!(config.chat.sync_timeout(), Duration::from_secs(10));
        assert_eq!(config.downloads.default_format, DEFAULT_FORMAT);
        assert_eq!(config.downloads.ytdlp_path, PathBuf::from("yt-dlp"));
        assert_eq!(config.state.path, PathBuf::from("data/state"));
        assert!(!config.chat.has_credentials());
    }

    #[test]
    fn test_matrix_config_carries_secrets() {
        let mut chat = ChatConfig {
            user_id: "@fetchbot:example.org".to_string(),
            ..ChatConfig::default()
        };
        chat.access_token = Some("token".to_string());

        let matrix = chat.matrix_config();
        assert_eq!(matrix.user_id, "@fetchbot:example.org");
        assert_eq!(matrix.access_token.as_deref(), Some("token"));
        assert_eq!(matrix.password, None);
    }

    #[test]
    fn test_secrets_not_serialized() {
        let mut config = Config::default();
        config.chat.password = Some("hunter2".to_string());

        let rendered = toml::to_string(&config).unwrap();
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[downloads]"));
    }
}
