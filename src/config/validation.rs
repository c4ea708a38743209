use super::models::{ChatConfig, Config, DownloadConfig};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid homeserver URL '{url}', expected 'http://' or 'https://'")]
    InvalidHomeserver { url: String },

    #[error("Invalid user id '{user_id}', expected '@localpart:server'")]
    InvalidUserId { user_id: String },

    #[error("Configuration field must not be empty: {field}")]
    EmptyField { field: &'static str },

    #[error("Sync timeout must be positive")]
    InvalidSyncTimeout,

    #[error("No credentials: set FETCHBOT_ACCESS_TOKEN or FETCHBOT_PASSWORD")]
    MissingCredentials,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_chat(&config.chat)?;
    validate_downloads(&config.downloads)?;
    if config.state.path.as_os_str().is_empty() {
        return Err(ValidationError::EmptyField { field: "state.path" });
    }
    Ok(())
}

/// Credentials are only needed to actually connect, so `check-config` can
/// run without them
pub fn require_credentials(config: &Config) -> Result<(), ValidationError> {
    if config.chat.has_credentials() {
        Ok(())
    } else {
        Err(ValidationError::MissingCredentials)
    }
}

fn validate_chat(chat: &ChatConfig) -> Result<(), ValidationError> {
    let homeserver = chat.homeserver.trim();
    if !(homeserver.starts_with("https://") || homeserver.starts_with("http://")) {
        return Err(ValidationError::InvalidHomeserver {
            url: chat.homeserver.clone(),
        });
    }

    if !is_user_id(&chat.user_id) {
        return Err(ValidationError::InvalidUserId {
            user_id: chat.user_id.clone(),
        });
    }

    if chat.device_name.trim().is_empty() {
        return Err(ValidationError::EmptyField {
            field: "chat.device_name",
        });
    }

    if chat.sync_timeout_ms == 0 {
        return Err(ValidationError::InvalidSyncTimeout);
    }

    Ok(())
}

fn validate_downloads(downloads: &DownloadConfig) -> Result<(), ValidationError> {
    if downloads.destination_dir.as_os_str().is_empty() {
        return Err(ValidationError::EmptyField {
            field: "downloads.destination_dir",
        });
    }
    if downloads.default_format.trim().is_empty() {
        return Err(ValidationError::EmptyField {
            field: "downloads.default_format",
        });
    }
    if downloads.merge_output_format.trim().is_empty() {
        return Err(ValidationError::EmptyField {
            field: "downloads.merge_output_format",
        });
    }
    if downloads.ytdlp_path.as_os_str().is_empty() {
        return Err(ValidationError::EmptyField {
            field: "downloads.ytdlp_path",
        });
    }
    Ok(())
}

/// `@localpart:server`, both parts non-empty
fn is_user_id(user_id: &str) -> bool {
    user_id
        .strip_prefix('@')
        .and_then(|rest| rest.split_once(':'))
        .is_some_and(|(local, server)| !local.is_empty() && !server.is_empty())
}
