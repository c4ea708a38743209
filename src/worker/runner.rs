//! Job runner - drains `pending` one job at a time

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, info};

use crate::fetch::{FetchEngine, FetchError};
use crate::job::JobRecord;
use crate::observability::Metrics;
use crate::queue::JobQueues;

/// The single consumer of the `pending` queue
pub struct Worker {
    queues: Arc<JobQueues>,
    engine: Arc<dyn FetchEngine>,
    metrics: Arc<Metrics>,
}

impl Worker {
    pub fn new(queues: Arc<JobQueues>, engine: Arc<dyn FetchEngine>, metrics: Arc<Metrics>) -> Self {
        Self {
            queues,
            engine,
            metrics,
        }
    }

    /// Process jobs until the shutdown sentinel is dequeued
    pub fn run(&self) {
        info!("Fetch worker started");
        while let Some(job) = self.queues.take_next() {
            self.process(&job);
            self.queues.retire(job.id());
        }
        info!("Fetch worker stopped");
    }

    /// Run one job through the engine. Never panics and never returns an
    /// error: whatever the engine does, the job ends in a terminal state.
    pub fn process(&self, job: &JobRecord) {
        info!(job_id = %job.id(), url = job.url(), format = job.format(), "Starting download");

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.engine.download(job.url(), job.options())
        }))
        .unwrap_or_else(|payload| Err(FetchError::Panicked(panic_message(payload.as_ref()))));

        match result {
            Ok(()) => {
                job.tracker().settle();
                self.metrics.job_finished();
                info!(job_id = %job.id(), url = job.url(), "Download finished");
            }
            Err(err) => {
                error!(job_id = %job.id(), url = job.url(), error = %err, "Download failed");
                if job.tracker().fail(err.to_string()) {
                    self.metrics.job_failed();
                } else {
                    // Already reported as finished before the engine errored
                    self.metrics.job_finished();
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
