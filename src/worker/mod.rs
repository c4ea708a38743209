//! Download worker
//!
//! One dedicated OS thread drains the `pending` queue and performs the
//! blocking engine calls, so the async dispatch loop never waits on a
//! transfer.

pub mod runner;

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, info};

use crate::fetch::FetchEngine;
use crate::observability::Metrics;
use crate::queue::JobQueues;

pub use runner::Worker;

const WORKER_THREAD_NAME: &str = "fetch-worker";

/// Owner of the running worker thread
#[derive(Debug)]
pub struct WorkerHandle {
    queues: Arc<JobQueues>,
    thread: JoinHandle<()>,
}

/// Start the worker thread
pub fn spawn(
    queues: Arc<JobQueues>,
    engine: Arc<dyn FetchEngine>,
    metrics: Arc<Metrics>,
) -> io::Result<WorkerHandle> {
    let worker = Worker::new(Arc::clone(&queues), engine, metrics);
    let thread = thread::Builder::new()
        .name(WORKER_THREAD_NAME.to_string())
        .spawn(move || worker.run())?;

    Ok(WorkerHandle { queues, thread })
}

impl WorkerHandle {
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Queue the sentinel and wait for the worker to exit.
    ///
    /// Any in-flight download runs to completion first.
    pub fn shutdown_blocking(self) {
        self.queues.request_shutdown();
        if self.thread.join().is_err() {
            error!("Fetch worker thread panicked");
        }
    }

    /// Async variant of [`shutdown_blocking`](Self::shutdown_blocking) that
    /// waits off the executor
    pub async fn shutdown(self) {
        info!("Waiting for fetch worker to finish");
        if let Err(err) = tokio::task::spawn_blocking(move || self.shutdown_blocking()).await {
            error!(error = %err, "Failed to join fetch worker");
        }
    }
}
