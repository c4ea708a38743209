//! Media fetch engine interface
//!
//! The worker hands every job to a [`FetchEngine`] exactly once. The call is
//! blocking and may run for minutes; while it runs the engine reports what it
//! is doing through the two hooks carried in [`FetchOptions`].

pub mod ytdlp;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

pub use ytdlp::YtDlpEngine;

/// Post-processing stage that moves the finished file to its final location
pub const MOVE_STAGE: &str = "MoveFiles";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while reading engine output: {0}")]
    Io(#[from] std::io::Error),

    #[error("{program} exited with status {code}: {stderr}")]
    ExitStatus {
        program: String,
        code: String,
        stderr: String,
    },

    #[error("download aborted: {0}")]
    Aborted(String),

    #[error("engine panicked: {0}")]
    Panicked(String),
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// Blocking download engine, called from the worker thread only
pub trait FetchEngine: Send + Sync {
    fn download(&self, url: &str, options: &FetchOptions) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Downloading,
    Finished,
    Error,
}

impl TransferStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "downloading" => Some(Self::Downloading),
            "finished" => Some(Self::Finished),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Transfer progress reported while bytes are moving
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub status: TransferStatus,
    pub percent: Option<String>,
    pub filename: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Started,
    Processing,
    Finished,
}

impl StageStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "started" => Some(Self::Started),
            "processing" => Some(Self::Processing),
            "finished" => Some(Self::Finished),
            _ => None,
        }
    }
}

/// Post-processing progress, one or more per named stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostprocessEvent {
    pub stage: String,
    pub status: StageStatus,
    pub filename: Option<PathBuf>,
}

impl PostprocessEvent {
    /// True once the file has landed at its final location
    pub fn is_final_move(&self) -> bool {
        self.stage == MOVE_STAGE && self.status == StageStatus::Finished
    }
}

pub type ProgressHook = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;
pub type PostprocessHook = Arc<dyn Fn(&PostprocessEvent) + Send + Sync>;

/// Callback slots the engine invokes during a download
#[derive(Clone)]
pub struct FetchHooks {
    pub progress: ProgressHook,
    pub postprocess: PostprocessHook,
}

impl FetchHooks {
    pub fn new(
        progress: impl Fn(&ProgressEvent) + Send + Sync + 'static,
        postprocess: impl Fn(&PostprocessEvent) + Send + Sync + 'static,
    ) -> Self {
        Self {
            progress: Arc::new(progress),
            postprocess: Arc::new(postprocess),
        }
    }

    pub fn noop() -> Self {
        Self::new(|_| {}, |_| {})
    }
}

impl fmt::Debug for FetchHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchHooks").finish_non_exhaustive()
    }
}

/// Everything the engine needs for one job, built when the job is created
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Output path template, e.g. `downloads/%(title)s.%(ext)s`
    pub output_template: String,
    pub format: String,
    pub merge_output_format: String,
    pub extra_args: Vec<String>,
    pub hooks: FetchHooks,
}

impl FetchOptions {
    pub fn report_progress(&self, event: &ProgressEvent) {
        (self.hooks.progress)(event);
    }

    pub fn report_postprocess(&self, event: &PostprocessEvent) {
        (self.hooks.postprocess)(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_final_move_detection() {
        let event = PostprocessEvent {
            stage: MOVE_STAGE.to_string(),
            status: StageStatus::Finished,
            filename: None,
        };
        assert!(event.is_final_move());

        let started = PostprocessEvent {
            status: StageStatus::Started,
            ..event.clone()
        };
        assert!(!started.is_final_move());

        let merger = PostprocessEvent {
            stage: "Merger".to_string(),
            ..event
        };
        assert!(!merger.is_final_move());
    }

    #[test]
    fn test_hooks_are_invoked() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let options = FetchOptions {
            output_template: "%(title)s.%(ext)s".to_string(),
            format: "best".to_string(),
            merge_output_format: "mkv".to_string(),
            extra_args: vec![],
            hooks: FetchHooks::new(
                move |event| sink.lock().unwrap().push(event.percent.clone()),
                |_| {},
            ),
        };

        options.report_progress(&ProgressEvent {
            status: TransferStatus::Downloading,
            percent: Some("42 %".to_string()),
            filename: None,
        });

        assert_eq!(*seen.lock().unwrap(), vec![Some("42 %".to_string())]);
    }
}
