use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::completion::{Completion, CompletionSink, Outcome};
use super::progress::{LifecycleState, ProgressCell};
use crate::fetch::{PostprocessEvent, ProgressEvent, TransferStatus};

/// Placeholder path reported when the engine never named its output
const UNKNOWN_PATH: &str = "unknown";

/// Applies engine events to one job's progress slot.
///
/// Cloned into the fetch hooks, so the worker's callbacks and the worker
/// loop itself drive the same state machine.
#[derive(Debug, Clone)]
pub struct JobTracker {
    job_id: Uuid,
    room: String,
    url: String,
    progress: Arc<ProgressCell>,
    completion: CompletionSink,
}

impl JobTracker {
    pub fn new(
        job_id: Uuid,
        room: String,
        url: String,
        progress: Arc<ProgressCell>,
        completion: CompletionSink,
    ) -> Self {
        Self {
            job_id,
            room,
            url,
            progress,
            completion,
        }
    }

    pub fn on_progress(&self, event: &ProgressEvent) {
        match event.status {
            TransferStatus::Downloading | TransferStatus::Finished => {
                let updated = self.progress.advance(LifecycleState::Downloading, |p| {
                    if let Some(percent) = &event.percent {
                        p.percent = percent.clone();
                    }
                    if let Some(filename) = &event.filename {
                        p.resolved_path = Some(filename.clone());
                    }
                });
                if let Err(err) = updated {
                    debug!(job_id = %self.job_id, error = %err, "Ignoring late progress event");
                }
            }
            TransferStatus::Error => {
                warn!(job_id = %self.job_id, url = %self.url, "Engine reported a transfer error");
            }
        }
    }

    pub fn on_postprocess(&self, event: &PostprocessEvent) {
        debug!(
            job_id = %self.job_id,
            stage = %event.stage,
            status = ?event.status,
            "Post-processing"
        );
        if event.is_final_move() {
            self.finish(event.filename.clone());
        }
    }

    /// Mark the job finished and emit its completion record.
    ///
    /// Returns false when the job had already reached a terminal state.
    pub fn finish(&self, path: Option<PathBuf>) -> bool {
        let mut resolved = None;
        let advanced = self.progress.advance(LifecycleState::Finished, |p| {
            if path.is_some() {
                p.resolved_path = path;
            }
            resolved = p.resolved_path.clone();
        });
        if let Err(err) = advanced {
            debug!(job_id = %self.job_id, error = %err, "Ignoring duplicate finish");
            return false;
        }

        self.completion.push(Completion {
            room: self.room.clone(),
            url: self.url.clone(),
            outcome: Outcome::Finished {
                path: resolved.unwrap_or_else(|| PathBuf::from(UNKNOWN_PATH)),
            },
        });
        true
    }

    /// Mark the job failed and emit a failure record.
    ///
    /// Returns false when the job had already reached a terminal state.
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        let advanced = self.progress.advance(LifecycleState::Failed, |p| {
            p.failure = Some(reason.clone());
        });
        if let Err(err) = advanced {
            debug!(job_id = %self.job_id, error = %err, reason = %reason, "Ignoring failure of settled job");
            return false;
        }

        self.completion.push(Completion {
            room: self.room.clone(),
            url: self.url.clone(),
            outcome: Outcome::Failed { reason },
        });
        true
    }

    /// Finish a job whose engine returned without reporting the final move
    pub fn settle(&self) -> bool {
        if self.progress.state().is_terminal() {
            return false;
        }
        self.finish(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{MOVE_STAGE, StageStatus};
    use crate::queue::StageQueue;

    fn tracker() -> (JobTracker, Arc<ProgressCell>, Arc<StageQueue<Completion>>) {
        let queue = Arc::new(StageQueue::new("completed"));
        let progress = Arc::new(ProgressCell::new());
        let tracker = JobTracker::new(
            Uuid::now_v7(),
            "!room:example.org".to_string(),
            "https://x".to_string(),
            Arc::clone(&progress),
            CompletionSink::new(Arc::clone(&queue)),
        );
        (tracker, progress, queue)
    }

    fn moved(path: &str) -> PostprocessEvent {
        PostprocessEvent {
            stage: MOVE_STAGE.to_string(),
            status: StageStatus::Finished,
            filename: Some(PathBuf::from(path)),
        }
    }

    #[test]
    fn test_progress_updates_snapshot() {
        let (tracker, progress, _) = tracker();
        tracker.on_progress(&ProgressEvent {
            status: TransferStatus::Downloading,
            percent: Some("42 %".to_string()),
            filename: Some(PathBuf::from("dl/clip.f137.mp4")),
        });

        let snapshot = progress.snapshot();
        assert_eq!(snapshot.state, LifecycleState::Downloading);
        assert_eq!(snapshot.percent, "42 %");
        assert_eq!(snapshot.resolved_path, Some(PathBuf::from("dl/clip.f137.mp4")));
    }

    #[test]
    fn test_move_stage_completes_once() {
        let (tracker, progress, queue) = tracker();
        tracker.on_postprocess(&moved("dl/clip.mkv"));
        tracker.on_postprocess(&moved("dl/clip.mkv"));

        assert_eq!(progress.state(), LifecycleState::Finished);
        assert_eq!(queue.len(), 1);
        let completion = queue.pop_nonblocking().unwrap();
        assert_eq!(
            completion.outcome,
            Outcome::Finished {
                path: PathBuf::from("dl/clip.mkv")
            }
        );
    }

    #[test]
    fn test_other_stages_do_not_complete() {
        let (tracker, progress, queue) = tracker();
        tracker.on_postprocess(&PostprocessEvent {
            stage: "Merger".to_string(),
            status: StageStatus::Finished,
            filename: None,
        });
        assert_eq!(progress.state(), LifecycleState::Pending);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_fail_after_finish_is_ignored() {
        let (tracker, progress, queue) = tracker();
        assert!(tracker.finish(Some(PathBuf::from("dl/a.mkv"))));
        assert!(!tracker.fail("late error"));

        assert_eq!(progress.state(), LifecycleState::Finished);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_finish_after_fail_is_ignored() {
        let (tracker, progress, queue) = tracker();
        assert!(tracker.fail("HTTP Error 403"));
        assert!(!tracker.finish(Some(PathBuf::from("dl/a.mkv"))));
        assert!(!tracker.fail("second error"));

        let snapshot = progress.snapshot();
        assert_eq!(snapshot.state, LifecycleState::Failed);
        assert_eq!(snapshot.failure.as_deref(), Some("HTTP Error 403"));
        assert_eq!(snapshot.resolved_path, None);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_settle_uses_last_known_path() {
        let (tracker, _, queue) = tracker();
        tracker.on_progress(&ProgressEvent {
            status: TransferStatus::Finished,
            percent: Some("100%".to_string()),
            filename: Some(PathBuf::from("dl/song.opus")),
        });

        assert!(tracker.settle());
        assert!(!tracker.settle());
        assert_eq!(
            queue.pop_nonblocking().unwrap().to_string(),
            "Finished download of https://x\n to song.opus"
        );
    }
}
