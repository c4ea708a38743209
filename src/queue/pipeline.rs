use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::stage::StageQueue;
use crate::job::{Completion, CompletionSink, JobRecord};

/// Item on the `pending` queue
#[derive(Debug)]
pub enum WorkItem {
    Job(JobRecord),
    /// Stops the worker; anything queued behind it is never processed
    Shutdown,
}

impl WorkItem {
    pub fn as_job(&self) -> Option<&JobRecord> {
        match self {
            WorkItem::Job(job) => Some(job),
            WorkItem::Shutdown => None,
        }
    }
}

/// The three stage queues a job moves through.
///
/// Lock order is always `pending` before `active`: the worker's hand-off
/// holds `pending` while pushing onto `active`, and [`inspect`](Self::inspect)
/// takes both in the same order. A reader therefore sees every job in
/// exactly one of the two stages.
#[derive(Debug)]
pub struct JobQueues {
    pending: StageQueue<WorkItem>,
    active: StageQueue<Arc<JobRecord>>,
    completed: Arc<StageQueue<Completion>>,
}

impl JobQueues {
    pub fn new() -> Self {
        Self {
            pending: StageQueue::new("pending"),
            active: StageQueue::new("active"),
            completed: Arc::new(StageQueue::new("completed")),
        }
    }

    /// Handle jobs use to report their terminal outcome
    pub fn completion_sink(&self) -> CompletionSink {
        CompletionSink::new(Arc::clone(&self.completed))
    }

    pub fn submit(&self, job: JobRecord) {
        debug!(job_id = %job.id(), url = job.url(), "Job queued");
        self.pending.push(WorkItem::Job(job));
    }

    /// Queue the shutdown sentinel behind any already pending jobs
    pub fn request_shutdown(&self) {
        info!("Queueing worker shutdown");
        self.pending.push(WorkItem::Shutdown);
    }

    /// Block until the next job is available and move it onto `active`.
    ///
    /// Returns `None` once the shutdown sentinel is dequeued.
    pub fn take_next(&self) -> Option<Arc<JobRecord>> {
        self.pending.pop_blocking_with(|item| match item {
            WorkItem::Job(job) => {
                let job = Arc::new(job);
                self.active.push(Arc::clone(&job));
                Some(job)
            }
            WorkItem::Shutdown => None,
        })
    }

    /// Drop a job from `active` once the engine call has returned
    pub fn retire(&self, job_id: Uuid) -> Option<Arc<JobRecord>> {
        let retired = self.active.take_first(|job| job.id() == job_id);
        if retired.is_none() {
            debug!(%job_id, "Retired job was not active");
        }
        retired
    }

    /// Take every completion recorded so far, oldest first
    pub fn drain_completed(&self) -> Vec<Completion> {
        std::iter::from_fn(|| self.completed.pop_nonblocking()).collect()
    }

    /// Consistent read-only view of `pending` and `active`
    pub fn inspect<R>(
        &self,
        f: impl FnOnce(&VecDeque<WorkItem>, &VecDeque<Arc<JobRecord>>) -> R,
    ) -> R {
        self.pending
            .snapshot(|pending| self.active.snapshot(|active| f(pending, active)))
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn completed_len(&self) -> usize {
        self.completed.len()
    }
}

impl Default for JobQueues {
    fn default() -> Self {
        Self::new()
    }
}
