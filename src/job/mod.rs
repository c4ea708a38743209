//! Job records and their lifecycle
//!
//! A [`JobRecord`] is created by the dispatcher for every accepted download
//! command. Its request fields never change; progress is published by the
//! worker thread through the record's [`ProgressCell`] and read by status
//! queries on the dispatch side.

mod completion;
pub mod format;
mod progress;
mod record;
mod tracker;

use std::path::Path;

pub use completion::{Completion, CompletionSink, Outcome};
pub use format::DEFAULT_FORMAT;
pub use progress::{JobProgress, LifecycleState, ProgressCell, TransitionError};
pub use record::{JobError, JobFactory, JobRecord};
pub use tracker::JobTracker;

/// Final path component for display, or the whole path if it has none
pub fn basename(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
