//! Work queue trait and error types

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during queue operations
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Malformed receipt handle: {0}")]
    InvalidReceipt(String),

    #[error("Receipt {0} belongs to an earlier delivery of the message")]
    StaleReceipt(String),
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// One delivery of a queued message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub id: i64,

    /// Raw message body; for this pipeline, a listing reference
    pub body: String,

    /// Handle that acknowledges this particular delivery
    pub receipt: String,

    /// How many times the message has been delivered, including this one
    pub receive_count: u32,
}

/// Trait for durable, at-least-once work queues
pub trait WorkQueue: Send {
    /// Appends a message and returns its id
    fn publish(&mut self, body: &str) -> QueueResult<i64>;

    /// Leases up to `max_messages` visible messages for `visibility_timeout`
    ///
    /// Leased messages are invisible to other consumers until the timeout
    /// elapses or they are acknowledged.
    fn receive(
        &mut self,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> QueueResult<Vec<QueueMessage>>;

    /// Deletes the delivered message
    ///
    /// Acknowledging a message that no longer exists succeeds; a receipt from
    /// an earlier delivery of a redelivered message is rejected.
    fn acknowledge(&mut self, receipt: &str) -> QueueResult<()>;

    /// Number of messages not yet acknowledged, leased or not
    fn pending_count(&self) -> QueueResult<u64>;
}
