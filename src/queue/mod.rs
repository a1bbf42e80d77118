//! Work queue module decoupling page scrapers from listing extractors
//!
//! The queue offers at-least-once delivery:
//! - Producers publish one message per listing reference
//! - A received message is hidden for a visibility timeout
//! - A consumer acknowledges (deletes) the message only after it succeeded;
//!   otherwise the message becomes visible again and is redelivered
//!
//! No ordering is guaranteed, and consumers must tolerate duplicates.

mod sqlite;
mod traits;

pub use sqlite::SqliteWorkQueue;
pub use traits::{QueueError, QueueMessage, QueueResult, WorkQueue};
