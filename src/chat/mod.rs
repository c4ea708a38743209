//! Chat protocol boundary
//!
//! The bot only needs three things from a chat session: a stream of events
//! delivered in sync batches, a way to post text into a room, and its own
//! identity so it can ignore its own messages.

pub mod matrix;

use async_trait::async_trait;
use thiserror::Error;

pub use matrix::MatrixSession;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("homeserver returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid homeserver URL: {0}")]
    InvalidHomeserver(String),

    #[error("no access token or password configured")]
    MissingCredentials,
}

pub type Result<T> = std::result::Result<T, ChatError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    Joined,
    Left,
    Invited,
}

/// Inbound event, already reduced to what the dispatcher understands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// Text or notice message
    Message {
        room: String,
        sender: String,
        body: String,
    },
    Membership {
        room: String,
        user: String,
        change: MembershipChange,
    },
    Other,
}

/// Events received in one sync cycle, plus the cursor to resume after them
#[derive(Debug, Clone, Default)]
pub struct SyncBatch {
    pub next_batch: String,
    pub events: Vec<ChatEvent>,
}

#[async_trait]
pub trait ChatSession: Send {
    /// Wait for the next batch of events after `since`
    async fn sync(&mut self, since: Option<&str>) -> Result<SyncBatch>;

    async fn send_text(&self, room: &str, text: &str) -> Result<()>;

    /// Fully qualified identity the session is logged in as
    fn user_id(&self) -> &str;
}
