//! Process wiring: configuration, state, worker thread and chat session

use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::bot::{Bot, CompletionDrain, Dispatcher};
use crate::chat::MatrixSession;
use crate::config::Config;
use crate::fetch::ytdlp::YtDlpEngine;
use crate::job::JobFactory;
use crate::observability::Metrics;
use crate::queue::JobQueues;
use crate::state::StateStore;
use crate::worker;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Build a factory that applies the `[downloads]` settings to every job
pub fn job_factory(config: &Config, queues: &JobQueues) -> JobFactory {
    let downloads = &config.downloads;
    JobFactory::new(&downloads.destination_dir, queues.completion_sink())
        .with_default_format(&downloads.default_format)
        .with_merge_output_format(&downloads.merge_output_format)
        .with_extra_args(downloads.extra_args.clone())
}

pub async fn run(config_path: Option<&Path>) -> Result<(), AnyError> {
    let config = Config::load_from(config_path)?;
    config.require_credentials()?;

    let state = StateStore::open(&config.state.path)?;
    let session = MatrixSession::connect(config.chat.matrix_config()).await?;

    let metrics = Arc::new(Metrics::new());
    let queues = Arc::new(JobQueues::new());
    let engine = Arc::new(YtDlpEngine::new(&config.downloads.ytdlp_path));
    let worker = worker::spawn(Arc::clone(&queues), engine, Arc::clone(&metrics))?;
    info!(
        destination = %config.downloads.destination_dir.display(),
        engine = %config.downloads.ytdlp_path.display(),
        "Fetch worker started"
    );

    let dispatcher = Dispatcher::new(
        config.chat.user_id.clone(),
        Arc::clone(&queues),
        job_factory(&config, &queues),
        state.clone(),
        Arc::clone(&metrics),
    );
    let drain = CompletionDrain::new(Arc::clone(&queues));

    let bot = Bot::new(session, dispatcher, drain, state, worker, metrics);
    bot.run(shutdown_signal()).await?;

    Ok(())
}

/// Load and validate the configuration, then print it as TOML
pub fn check_config(config_path: Option<&Path>) -> Result<(), AnyError> {
    let config = Config::load_from(config_path)?;
    if let Err(err) = config.require_credentials() {
        warn!(error = %err, "Configuration is valid but cannot connect yet");
    }

    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_job_factory_applies_download_settings() {
        let mut config = Config::default();
        config.downloads.destination_dir = PathBuf::from("/srv/media");
        config.downloads.default_format = "bestaudio/best".to_string();
        config.downloads.merge_output_format = "mp4".to_string();
        config.downloads.extra_args = vec!["--no-playlist".to_string()];

        let queues = JobQueues::new();
        let job = job_factory(&config, &queues)
            .create("!room:example.org", "https://x", None, None)
            .unwrap();

        assert_eq!(job.format(), "bestaudio/best");
        assert_eq!(job.destination(), Path::new("/srv/media"));
        assert_eq!(job.options().merge_output_format, "mp4");
        assert_eq!(job.options().extra_args, vec!["--no-playlist"]);
    }
}
