//! Chat-facing side of the bot
//!
//! [`Bot::run`] owns the chat session and drives the sync loop. Each cycle
//! dispatches the received events, posts replies, drains finished jobs from
//! the `completed` queue and persists the sync cursor.

pub mod command;
pub mod dispatcher;
pub mod drain;

use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::chat::{ChatError, ChatSession};
use crate::observability::Metrics;
use crate::state::{StateError, StateStore};
use crate::worker::WorkerHandle;

pub use command::Command;
pub use dispatcher::Dispatcher;
pub use drain::CompletionDrain;

#[derive(Debug, Error)]
pub enum BotError {
    #[error("chat session error: {0}")]
    Chat(#[from] ChatError),

    #[error("state store error: {0}")]
    State(#[from] StateError),
}

pub type Result<T> = std::result::Result<T, BotError>;

/// Text to post into a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub room: String,
    pub text: String,
}

impl Reply {
    pub fn new(room: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            text: text.into(),
        }
    }
}

pub struct Bot<S> {
    session: S,
    dispatcher: Dispatcher,
    drain: CompletionDrain,
    state: StateStore,
    worker: WorkerHandle,
    metrics: Arc<Metrics>,
}

impl<S: ChatSession> Bot<S> {
    pub fn new(
        session: S,
        dispatcher: Dispatcher,
        drain: CompletionDrain,
        state: StateStore,
        worker: WorkerHandle,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            session,
            dispatcher,
            drain,
            state,
            worker,
            metrics,
        }
    }

    /// Run until `shutdown` resolves or the session fails.
    ///
    /// The worker is stopped on both paths; an in-flight download finishes
    /// before this returns.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let Bot {
            mut session,
            dispatcher,
            drain,
            state,
            worker,
            metrics,
        } = self;

        let mut cycle = SyncCycle {
            session: &mut session,
            dispatcher: &dispatcher,
            drain: &drain,
            state: &state,
            undelivered: Vec::new(),
        };
        let result = cycle.run(shutdown).await;
        let mut outbox = std::mem::take(&mut cycle.undelivered);

        if let Err(err) = &result {
            error!(error = %err, "Bot loop terminated");
        }

        worker.shutdown().await;

        // Completions a failed send left behind, then those recorded while
        // the worker wound down
        outbox.extend(drain.drain());
        for reply in outbox {
            if let Err(err) = session.send_text(&reply.room, &reply.text).await {
                error!(
                    room = %reply.room,
                    text = %reply.text,
                    error = %err,
                    "Failed to post final completion"
                );
            }
        }

        if let Err(err) = state.persist() {
            error!(error = %err, "Failed to persist state on shutdown");
        }

        let snapshot = metrics.snapshot();
        info!(
            jobs_queued = snapshot.jobs_queued,
            jobs_finished = snapshot.jobs_finished,
            jobs_failed = snapshot.jobs_failed,
            "Bot stopped"
        );
        result
    }
}

struct SyncCycle<'a, S> {
    session: &'a mut S,
    dispatcher: &'a Dispatcher,
    drain: &'a CompletionDrain,
    state: &'a StateStore,
    /// Drained completions not yet posted when a send failed
    undelivered: Vec<Reply>,
}

impl<S: ChatSession> SyncCycle<'_, S> {
    async fn run<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut cursor = match self.state.sync_cursor()? {
            Some(cursor) => Some(cursor),
            None => {
                // Skip history on first start; only messages after login count
                let batch = tokio::select! {
                    _ = &mut shutdown => return Ok(()),
                    batch = self.session.sync(None) => batch?,
                };
                info!(skipped = batch.events.len(), "Initial sync complete");
                self.state.set_sync_cursor(&batch.next_batch)?;
                Some(batch.next_batch)
            }
        };

        info!(user_id = %self.session.user_id(), "Listening for commands");
        loop {
            let batch = tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    return Ok(());
                }
                batch = self.session.sync(cursor.as_deref()) => batch?,
            };

            for event in &batch.events {
                if let Some(reply) = self.dispatcher.handle(event) {
                    self.session.send_text(&reply.room, &reply.text).await?;
                }
            }

            let mut replies = self.drain.drain().into_iter();
            while let Some(reply) = replies.next() {
                debug!(room = %reply.room, "Posting completions");
                if let Err(err) = self.session.send_text(&reply.room, &reply.text).await {
                    self.undelivered.push(reply);
                    self.undelivered.extend(replies);
                    return Err(err.into());
                }
            }

            self.state.set_sync_cursor(&batch.next_batch)?;
            cursor = Some(batch.next_batch);
        }
    }
}
