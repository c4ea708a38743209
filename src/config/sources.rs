use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::{Path, PathBuf};

const CONFIG_ENV_VAR: &str = "FETCHBOT_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/fetchbot.toml";
const ENV_PREFIX: &str = "FETCHBOT";
const ENV_SEPARATOR: &str = "__";
const ACCESS_TOKEN_ENV_VAR: &str = "FETCHBOT_ACCESS_TOKEN";
const PASSWORD_ENV_VAR: &str = "FETCHBOT_PASSWORD";

/// Path of the TOML file: explicit argument, then `FETCHBOT_CONFIG`, then
/// the default location
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => env::var(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH)),
    }
}

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let mut config = load_from_sources(&config_path(explicit))?;
    load_secrets(&mut config);

    Ok(config)
}

/// Secrets are never read from TOML files, only from the environment
fn load_secrets(config: &mut Config) {
    config.chat.access_token = non_empty_var(ACCESS_TOKEN_ENV_VAR);
    config.chat.password = non_empty_var(PASSWORD_ENV_VAR);
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Load configuration from a specific path and the `FETCHBOT__*` environment,
/// without secrets
pub fn load_from_sources(config_path: &Path) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // FETCHBOT__CHAT__HOMESERVER -> chat.homeserver
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .list_separator(" ")
            .with_list_parse_key("downloads.extra_args"),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(&config_path).unwrap();
        assert_eq!(config.downloads.destination_dir, PathBuf::from("downloads"));
        assert_eq!(config.chat.device_name, "fetchbot");
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[chat]
homeserver = "https://chat.example.org"
user_id = "@fetchbot:example.org"
sync_timeout_ms = 5000

[downloads]
destination_dir = "/srv/media"
default_format = "bestaudio/best"
merge_output_format = "mp4"
extra_args = ["--no-playlist", "--restrict-filenames"]

[state]
path = "/var/lib/fetchbot"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(&config_path).unwrap();
        assert_eq!(config.chat.homeserver, "https://chat.example.org");
        assert_eq!(config.chat.user_id, "@fetchbot:example.org");
        assert_eq!(config.chat.sync_timeout_ms, 5000);
        assert_eq!(config.downloads.destination_dir, PathBuf::from("/srv/media"));
        assert_eq!(config.downloads.merge_output_format, "mp4");
        assert_eq!(
            config.downloads.extra_args,
            vec!["--no-playlist", "--restrict-filenames"]
        );
        assert_eq!(config.state.path, PathBuf::from("/var/lib/fetchbot"));
    }

    #[test]
    fn test_secrets_in_toml_are_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(
            &config_path,
            r#"
[chat]
user_id = "@fetchbot:example.org"
access_token = "from-file"
password = "from-file"
            "#,
        )
        .unwrap();

        let config = load_from_sources(&config_path).unwrap();
        assert_eq!(config.chat.access_token, None);
        assert_eq!(config.chat.password, None);
    }

    #[test]
    fn test_explicit_path_wins() {
        let path = Path::new("/etc/fetchbot.toml");
        assert_eq!(config_path(Some(path)), PathBuf::from("/etc/fetchbot.toml"));
    }
}
