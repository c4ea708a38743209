use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use super::basename;
use crate::queue::StageQueue;

/// Terminal result of one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Finished { path: PathBuf },
    Failed { reason: String },
}

/// Lightweight record placed on the `completed` queue once a job ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub room: String,
    pub url: String,
    pub outcome: Outcome,
}

impl fmt::Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Finished { path } => {
                write!(f, "Finished download of {}\n to {}", self.url, basename(path))
            }
            Outcome::Failed { reason } => {
                write!(f, "Failed download of {}\n {}", self.url, reason)
            }
        }
    }
}

/// Write-only handle to the `completed` queue, shared by every job
#[derive(Debug, Clone)]
pub struct CompletionSink {
    queue: Arc<StageQueue<Completion>>,
}

impl CompletionSink {
    pub fn new(queue: Arc<StageQueue<Completion>>) -> Self {
        Self { queue }
    }

    pub fn push(&self, completion: Completion) {
        self.queue.push(completion);
    }
}
