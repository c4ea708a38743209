use std::sync::Arc;
use tracing::debug;

use super::Reply;
use crate::job::Completion;
use crate::queue::JobQueues;

/// Collects finished jobs off the `completed` queue for posting
#[derive(Debug, Clone)]
pub struct CompletionDrain {
    queues: Arc<JobQueues>,
}

impl CompletionDrain {
    pub fn new(queues: Arc<JobQueues>) -> Self {
        Self { queues }
    }

    /// Empty the `completed` queue into one reply per room
    pub fn drain(&self) -> Vec<Reply> {
        let completions = self.queues.drain_completed();
        if !completions.is_empty() {
            debug!(count = completions.len(), "Drained completions");
        }
        batch_by_room(completions)
    }
}

/// Group completions by room in the order rooms first appear, keeping queue
/// order within each room
pub fn batch_by_room(completions: Vec<Completion>) -> Vec<Reply> {
    let mut batches: Vec<(String, Vec<String>)> = Vec::new();

    for completion in completions {
        let line = completion.to_string();
        match batches.iter_mut().find(|(room, _)| *room == completion.room) {
            Some((_, lines)) => lines.push(line),
            None => batches.push((completion.room, vec![line])),
        }
    }

    batches
        .into_iter()
        .map(|(room, lines)| Reply::new(room, lines.join("\n")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Outcome;
    use std::path::PathBuf;

    fn finished(room: &str, url: &str, path: &str) -> Completion {
        Completion {
            room: room.to_string(),
            url: url.to_string(),
            outcome: Outcome::Finished {
                path: PathBuf::from(path),
            },
        }
    }

    fn failed(room: &str, url: &str, reason: &str) -> Completion {
        Completion {
            room: room.to_string(),
            url: url.to_string(),
            outcome: Outcome::Failed {
                reason: reason.to_string(),
            },
        }
    }

    #[test]
    fn test_batch_keeps_room_and_queue_order() {
        let replies = batch_by_room(vec![
            finished("!a", "https://1", "/d/one.mkv"),
            failed("!b", "https://2", "HTTP Error 404"),
            finished("!a", "https://3", "/d/three.mp4"),
        ]);

        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].room, "!a");
        assert_eq!(
            replies[0].text,
            "Finished download of https://1\n to one.mkv\nFinished download of https://3\n to three.mp4"
        );
        assert_eq!(replies[1].room, "!b");
        assert_eq!(replies[1].text, "Failed download of https://2\n HTTP Error 404");
    }

    #[test]
    fn test_batch_empty() {
        assert!(batch_by_room(Vec::new()).is_empty());
    }

    #[test]
    fn test_drain_empties_completed_queue() {
        let queues = Arc::new(JobQueues::new());
        queues
            .completion_sink()
            .push(finished("!a", "https://x", "/d/x.webm"));

        let drain = CompletionDrain::new(Arc::clone(&queues));
        let replies = drain.drain();

        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].text, "Finished download of https://x\n to x.webm");
        assert_eq!(queues.completed_len(), 0);
        assert!(drain.drain().is_empty());
    }
}
