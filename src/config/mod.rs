//! Configuration management for fetchbot
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use fetchbot::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Downloading into: {}", config.downloads.destination_dir.display());
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `FETCHBOT__<section>__<key>`
//!
//! Examples:
//! - `FETCHBOT__CHAT__HOMESERVER=https://matrix.example.org`
//! - `FETCHBOT__DOWNLOADS__DESTINATION_DIR=/srv/media`
//! - `FETCHBOT__DOWNLOADS__EXTRA_ARGS="--no-playlist --restrict-filenames"`
//!
//! Credentials come only from `FETCHBOT_ACCESS_TOKEN` or `FETCHBOT_PASSWORD`.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/fetchbot.toml`.
//! This can be overridden using the `FETCHBOT_CONFIG` environment variable
//! or the `--config` flag.

mod models;
mod sources;
mod validation;

pub use models::{ChatConfig, Config, DownloadConfig, StateConfig};
pub use validation::ValidationError;

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`FETCHBOT__*`)
    /// 2. TOML file (default: `config/fetchbot.toml`)
    /// 3. Default values
    ///
    /// # Errors
    ///
    /// Returns an error if the file is malformed or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Like [`load`](Self::load), reading the TOML file from `path` when given
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = sources::load(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path, without secrets
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path.as_ref())?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Fail unless an access token or password was supplied
    pub fn require_credentials(&self) -> Result<(), ConfigError> {
        validation::require_credentials(self)?;
        Ok(())
    }
}
