use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::watch;

/// Percent text shown before the engine reports anything
pub const INITIAL_PERCENT: &str = "0 %";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Pending,
    Downloading,
    Finished,
    Failed,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Pending => "pending",
            LifecycleState::Downloading => "downloading",
            LifecycleState::Finished => "finished",
            LifecycleState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Finished | LifecycleState::Failed)
    }

    /// States only move forward; repeating a non-terminal state is allowed
    pub fn can_advance_to(&self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        match (*self, next) {
            (Pending, _) => true,
            (Downloading, Pending) => false,
            (Downloading, _) => true,
            (Finished | Failed, _) => false,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid lifecycle transition {from} -> {to}")]
pub struct TransitionError {
    pub from: LifecycleState,
    pub to: LifecycleState,
}

/// Snapshot of the fields the worker mutates while a job is active
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobProgress {
    pub state: LifecycleState,
    pub percent: String,
    pub resolved_path: Option<PathBuf>,
    pub failure: Option<String>,
}

impl Default for JobProgress {
    fn default() -> Self {
        Self {
            state: LifecycleState::Pending,
            percent: INITIAL_PERCENT.to_string(),
            resolved_path: None,
            failure: None,
        }
    }
}

/// Single-writer slot publishing [`JobProgress`] snapshots.
///
/// The worker thread is the only writer. Readers on the dispatch side clone
/// the latest snapshot and never see a half-applied update.
#[derive(Debug)]
pub struct ProgressCell {
    slot: watch::Sender<JobProgress>,
}

impl ProgressCell {
    pub fn new() -> Self {
        Self {
            slot: watch::Sender::new(JobProgress::default()),
        }
    }

    pub fn snapshot(&self) -> JobProgress {
        self.slot.borrow().clone()
    }

    pub fn state(&self) -> LifecycleState {
        self.slot.borrow().state
    }

    /// Move to `next` and apply `update`, or leave the snapshot untouched
    pub fn advance(
        &self,
        next: LifecycleState,
        update: impl FnOnce(&mut JobProgress),
    ) -> Result<(), TransitionError> {
        let mut outcome = Ok(());
        self.slot.send_if_modified(|progress| {
            if !progress.state.can_advance_to(next) {
                outcome = Err(TransitionError {
                    from: progress.state,
                    to: next,
                });
                return false;
            }
            progress.state = next;
            update(progress);
            true
        });
        outcome
    }
}

impl Default for ProgressCell {
    fn default() -> Self {
        Self::new()
    }
}
