use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use super::completion::CompletionSink;
use super::format;
use super::progress::{JobProgress, LifecycleState, ProgressCell};
use super::tracker::JobTracker;
use crate::fetch::{FetchHooks, FetchOptions};

/// File name template appended to the destination directory
const OUTPUT_NAME_TEMPLATE: &str = "%(title)s.%(ext)s";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("download URL must not be empty")]
    EmptyUrl,

    #[error("destination directory must not be empty")]
    EmptyDestination,
}

pub type Result<T> = std::result::Result<T, JobError>;

/// One requested download.
///
/// Request fields are fixed at construction. The worker-mutated fields live
/// behind a [`ProgressCell`] shared with the fetch hooks.
#[derive(Debug)]
pub struct JobRecord {
    id: Uuid,
    room: String,
    url: String,
    format: String,
    destination: PathBuf,
    options: FetchOptions,
    progress: Arc<ProgressCell>,
    tracker: JobTracker,
}

impl JobRecord {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Engine configuration bundle, hooks included
    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    pub fn progress(&self) -> JobProgress {
        self.progress.snapshot()
    }

    pub fn state(&self) -> LifecycleState {
        self.progress.state()
    }

    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }
}

/// Builds [`JobRecord`]s with deployment defaults filled in
#[derive(Debug, Clone)]
pub struct JobFactory {
    destination: PathBuf,
    default_format: String,
    merge_output_format: String,
    extra_args: Vec<String>,
    completion: CompletionSink,
}

impl JobFactory {
    pub fn new(destination: impl Into<PathBuf>, completion: CompletionSink) -> Self {
        Self {
            destination: destination.into(),
            default_format: format::DEFAULT_FORMAT.to_string(),
            merge_output_format: "mkv".to_string(),
            extra_args: Vec::new(),
            completion,
        }
    }

    pub fn with_default_format(mut self, format: impl Into<String>) -> Self {
        self.default_format = format.into();
        self
    }

    pub fn with_merge_output_format(mut self, format: impl Into<String>) -> Self {
        self.merge_output_format = format.into();
        self
    }

    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    /// Create a job for `url`. No I/O happens here.
    ///
    /// `format` is normalized; `None` selects the configured default.
    /// `destination` overrides the configured download directory.
    pub fn create(
        &self,
        room: &str,
        url: &str,
        format: Option<&str>,
        destination: Option<&Path>,
    ) -> Result<JobRecord> {
        let url = url.trim();
        if url.is_empty() {
            return Err(JobError::EmptyUrl);
        }

        let destination = destination.unwrap_or(self.destination.as_path()).to_path_buf();
        if destination.as_os_str().is_empty() {
            return Err(JobError::EmptyDestination);
        }

        let format = format::resolve(format, &self.default_format);

        let id = Uuid::now_v7();
        let progress = Arc::new(ProgressCell::new());
        let tracker = JobTracker::new(
            id,
            room.to_string(),
            url.to_string(),
            Arc::clone(&progress),
            self.completion.clone(),
        );

        let on_progress = tracker.clone();
        let on_postprocess = tracker.clone();
        let options = FetchOptions {
            output_template: destination
                .join(OUTPUT_NAME_TEMPLATE)
                .to_string_lossy()
                .into_owned(),
            format: format.clone(),
            merge_output_format: self.merge_output_format.clone(),
            extra_args: self.extra_args.clone(),
            hooks: FetchHooks::new(
                move |event| on_progress.on_progress(event),
                move |event| on_postprocess.on_postprocess(event),
            ),
        };

        Ok(JobRecord {
            id,
            room: room.to_string(),
            url: url.to_string(),
            format,
            destination,
            options,
            progress,
            tracker,
        })
    }
}
