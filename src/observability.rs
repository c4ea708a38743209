//! Job counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics handle for recording counters
#[derive(Debug, Default)]
pub struct Metrics {
    jobs_queued: AtomicU64,
    jobs_finished: AtomicU64,
    jobs_failed: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job_queued(&self) {
        self.jobs_queued.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_queued", "Metric incremented");
    }

    pub fn job_finished(&self) {
        self.jobs_finished.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_finished", "Metric incremented");
    }

    pub fn job_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_failed", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_queued: self.jobs_queued.load(Ordering::Relaxed),
            jobs_finished: self.jobs_finished.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub jobs_queued: u64,
    pub jobs_finished: u64,
    pub jobs_failed: u64,
}
