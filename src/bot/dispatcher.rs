use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::command::Command;
use super::Reply;
use crate::chat::{ChatEvent, MembershipChange};
use crate::job::JobFactory;
use crate::observability::Metrics;
use crate::queue::JobQueues;
use crate::state::{StateError, StateStore};
use crate::status::StatusAggregator;

/// Turns inbound chat events into queue writes and replies.
///
/// The only writer to `pending`. Runs on the dispatch side and never waits
/// on the worker.
pub struct Dispatcher {
    own_user: String,
    queues: Arc<JobQueues>,
    factory: JobFactory,
    status: StatusAggregator,
    state: StateStore,
    metrics: Arc<Metrics>,
}

impl Dispatcher {
    pub fn new(
        own_user: impl Into<String>,
        queues: Arc<JobQueues>,
        factory: JobFactory,
        state: StateStore,
        metrics: Arc<Metrics>,
    ) -> Self {
        let status = StatusAggregator::new(Arc::clone(&queues));
        Self {
            own_user: own_user.into(),
            queues,
            factory,
            status,
            state,
            metrics,
        }
    }

    /// Reply to post for `event`, if any.
    ///
    /// Membership store failures are logged; they never stop the bot.
    pub fn handle(&self, event: &ChatEvent) -> Option<Reply> {
        match event {
            ChatEvent::Message { sender, .. } | ChatEvent::Membership { user: sender, .. }
                if *sender == self.own_user =>
            {
                None
            }
            ChatEvent::Message { room, sender, body } => self.handle_message(room, sender, body),
            ChatEvent::Membership { room, user, change } => {
                if let Err(err) = self.handle_membership(room, user, *change) {
                    error!(room, user, change = ?change, error = %err, "Failed to update member list");
                }
                None
            }
            ChatEvent::Other => None,
        }
    }

    fn handle_message(&self, room: &str, sender: &str, body: &str) -> Option<Reply> {
        let text = match Command::parse(body) {
            Command::Status => self.status.status().to_string(),
            Command::StatusOf(url) => self.status.status_of(&url).to_string(),
            Command::Enqueue { url, format } => self.enqueue(room, sender, &url, format.as_deref()),
            Command::Unrecognized => {
                debug!(room, sender, body, "Ignoring unrecognized message");
                return None;
            }
        };
        Some(Reply::new(room, text))
    }

    fn enqueue(&self, room: &str, sender: &str, url: &str, format: Option<&str>) -> String {
        let job = match self.factory.create(room, url, format, None) {
            Ok(job) => job,
            Err(err) => {
                warn!(room, sender, url, error = %err, "Rejected download request");
                return format!("Could not queue {url}: {err}");
            }
        };

        info!(job_id = %job.id(), room, sender, url, format = job.format(), "Download requested");
        let reply = match format {
            Some(_) => format!("Queued download of {url} with format {}", job.format()),
            None => format!("Queued download of {url}"),
        };
        self.queues.submit(job);
        self.metrics.job_queued();
        reply
    }

    fn handle_membership(
        &self,
        room: &str,
        user: &str,
        change: MembershipChange,
    ) -> Result<(), StateError> {
        match change {
            MembershipChange::Joined => self.state.add_member(user)?,
            MembershipChange::Left => {
                if self.state.remove_member(user)? {
                    info!(room, user, "Participant left");
                }
            }
            MembershipChange::Invited => debug!(room, user, "Invite observed"),
        }
        Ok(())
    }
}
