//! Human-readable status queries over the pending and active stages

use std::fmt;
use std::sync::Arc;

use crate::job::{JobRecord, LifecycleState, basename};
use crate::queue::{JobQueues, WorkItem};

const UNKNOWN_FILE: &str = "unknown file";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusReport {
    Pending {
        url: String,
    },
    Downloading {
        url: String,
        percent: String,
        filename: Option<String>,
    },
    Finished {
        url: String,
        filename: Option<String>,
    },
    Failed {
        url: String,
        reason: String,
    },
    Empty,
    Found {
        url: String,
        state: LifecycleState,
    },
    NotFound,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusReport::Pending { url } => write!(f, "Pending download of {url}"),
            StatusReport::Downloading {
                url,
                percent,
                filename,
            } => write!(
                f,
                "Downloading {url}: {percent} to {}",
                filename.as_deref().unwrap_or(UNKNOWN_FILE)
            ),
            StatusReport::Finished { url, filename } => write!(
                f,
                "Finished download of {url} to {}",
                filename.as_deref().unwrap_or(UNKNOWN_FILE)
            ),
            StatusReport::Failed { url, reason } => {
                write!(f, "Failed download of {url}: {reason}")
            }
            StatusReport::Empty => f.write_str("Queue is empty"),
            StatusReport::Found { url, state } => write!(f, "{url} is {state}"),
            StatusReport::NotFound => f.write_str("Not found"),
        }
    }
}

/// Answers status queries from the dispatch side without blocking on the worker
#[derive(Debug, Clone)]
pub struct StatusAggregator {
    queues: Arc<JobQueues>,
}

impl StatusAggregator {
    pub fn new(queues: Arc<JobQueues>) -> Self {
        Self { queues }
    }

    /// Coarse view: the head of `pending`, else the head of `active`
    pub fn status(&self) -> StatusReport {
        self.queues.inspect(|pending, active| {
            if let Some(job) = pending.iter().find_map(WorkItem::as_job) {
                return StatusReport::Pending {
                    url: job.url().to_string(),
                };
            }
            match active.front() {
                Some(job) => describe_active(job),
                None => StatusReport::Empty,
            }
        })
    }

    /// First pending or active job requested for `url`
    pub fn status_of(&self, url: &str) -> StatusReport {
        let url = url.trim();
        self.queues.inspect(|pending, active| {
            pending
                .iter()
                .filter_map(WorkItem::as_job)
                .chain(active.iter().map(|job| &**job))
                .find(|job| job.url() == url)
                .map(|job| StatusReport::Found {
                    url: job.url().to_string(),
                    state: job.state(),
                })
                .unwrap_or(StatusReport::NotFound)
        })
    }
}

fn describe_active(job: &JobRecord) -> StatusReport {
    let progress = job.progress();
    let url = job.url().to_string();
    let filename = progress.resolved_path.as_deref().map(basename);

    match progress.state {
        LifecycleState::Pending => StatusReport::Pending { url },
        LifecycleState::Downloading => StatusReport::Downloading {
            url,
            percent: progress.percent,
            filename,
        },
        LifecycleState::Finished => StatusReport::Finished { url, filename },
        LifecycleState::Failed => StatusReport::Failed {
            url,
            reason: progress.failure.unwrap_or_default(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{ProgressEvent, TransferStatus};
    use crate::job::JobFactory;
    use std::path::PathBuf;

    fn setup() -> (Arc<JobQueues>, JobFactory, StatusAggregator) {
        let queues = Arc::new(JobQueues::new());
        let factory = JobFactory::new("downloads", queues.completion_sink());
        let status = StatusAggregator::new(Arc::clone(&queues));
        (queues, factory, status)
    }

    #[test]
    fn test_empty_queue() {
        let (_, _, status) = setup();
        assert_eq!(status.status(), StatusReport::Empty);
        assert_eq!(status.status().to_string(), "Queue is empty");
    }

    #[test]
    fn test_pending_head_reported() {
        let (queues, factory, status) = setup();
        queues.submit(factory.create("!r:x", "https://x", None, None).unwrap());
        queues.submit(factory.create("!r:x", "https://y", None, None).unwrap());

        assert_eq!(status.status().to_string(), "Pending download of https://x");
    }

    #[test]
    fn test_active_progress_reported() {
        let (queues, factory, status) = setup();
        queues.submit(factory.create("!r:x", "https://x", None, None).unwrap());
        let job = queues.take_next().unwrap();

        job.options().report_progress(&ProgressEvent {
            status: TransferStatus::Downloading,
            percent: Some("42 %".to_string()),
            filename: Some(PathBuf::from("downloads/clip.f137.mp4")),
        });

        let report = status.status().to_string();
        assert_eq!(report, "Downloading https://x: 42 % to clip.f137.mp4");
    }

    #[test]
    fn test_active_without_filename() {
        let (queues, factory, status) = setup();
        queues.submit(factory.create("!r:x", "https://x", None, None).unwrap());
        let job = queues.take_next().unwrap();
        job.options().report_progress(&ProgressEvent {
            status: TransferStatus::Downloading,
            percent: Some("3 %".to_string()),
            filename: None,
        });

        assert!(status.status().to_string().ends_with("to unknown file"));
    }

    #[test]
    fn test_finished_and_failed_heads() {
        let (queues, factory, status) = setup();
        queues.submit(factory.create("!r:x", "https://x", None, None).unwrap());
        let job = queues.take_next().unwrap();
        job.tracker().finish(Some(PathBuf::from("downloads/a.mkv")));
        assert_eq!(
            status.status().to_string(),
            "Finished download of https://x to a.mkv"
        );

        queues.retire(job.id());
        queues.submit(factory.create("!r:x", "https://y", None, None).unwrap());
        let job = queues.take_next().unwrap();
        job.tracker().fail("HTTP 404");
        assert_eq!(
            status.status().to_string(),
            "Failed download of https://y: HTTP 404"
        );
    }

    #[test]
    fn test_pending_takes_precedence_over_active() {
        let (queues, factory, status) = setup();
        queues.submit(factory.create("!r:x", "https://a", None, None).unwrap());
        let _active = queues.take_next().unwrap();
        queues.submit(factory.create("!r:x", "https://b", None, None).unwrap());

        assert_eq!(status.status().to_string(), "Pending download of https://b");
    }

    #[test]
    fn test_status_of_url() {
        let (queues, factory, status) = setup();
        queues.submit(factory.create("!r:x", "https://a", None, None).unwrap());
        let active = queues.take_next().unwrap();
        active.tracker().on_progress(&ProgressEvent {
            status: TransferStatus::Downloading,
            percent: None,
            filename: None,
        });
        queues.submit(factory.create("!r:x", "https://b", None, None).unwrap());

        assert_eq!(
            status.status_of("https://a"),
            StatusReport::Found {
                url: "https://a".to_string(),
                state: LifecycleState::Downloading,
            }
        );
        assert_eq!(status.status_of("https://b").to_string(), "https://b is pending");
        assert_eq!(status.status_of("https://nope").to_string(), "Not found");

        // Queries never consume anything
        assert_eq!(queues.pending_len(), 1);
        assert_eq!(queues.active_len(), 1);
    }

    #[test]
    fn test_sentinel_is_not_reported() {
        let (queues, _, status) = setup();
        queues.request_shutdown();
        assert_eq!(status.status(), StatusReport::Empty);
    }
}
