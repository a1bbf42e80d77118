//! SQLite work queue implementation
//!
//! Messages live in a single table. A message is visible when its
//! `visible_at` timestamp (Unix milliseconds) is in the past; receiving a
//! message pushes `visible_at` forward by the visibility timeout and bumps
//! `receive_count`, which also invalidates receipts of earlier deliveries.

use crate::queue::traits::{QueueError, QueueMessage, QueueResult, WorkQueue};
use crate::HarvestError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

/// SQL schema for the queue database
pub const QUEUE_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS queue_messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    body TEXT NOT NULL,
    enqueued_at INTEGER NOT NULL,
    visible_at INTEGER NOT NULL,
    receive_count INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_queue_visible ON queue_messages(visible_at);
"#;

/// SQLite-backed work queue
pub struct SqliteWorkQueue {
    conn: Connection,
}

impl SqliteWorkQueue {
    /// Opens (or creates) the queue database at the given path
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path).map_err(QueueError::from)?;

        // Several units may hold the file at once; wait for locks instead of failing
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
        ",
        )
        .map_err(QueueError::from)?;

        conn.execute_batch(QUEUE_SCHEMA_SQL)
            .map_err(QueueError::from)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory queue
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory().map_err(QueueError::from)?;
        conn.execute_batch(QUEUE_SCHEMA_SQL)
            .map_err(QueueError::from)?;
        Ok(Self { conn })
    }
}

impl WorkQueue for SqliteWorkQueue {
    fn publish(&mut self, body: &str) -> QueueResult<i64> {
        let now = Utc::now().timestamp_millis();
        self.conn.execute(
            "INSERT INTO queue_messages (body, enqueued_at, visible_at) VALUES (?1, ?2, ?2)",
            params![body, now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn receive(
        &mut self,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> QueueResult<Vec<QueueMessage>> {
        let now = Utc::now().timestamp_millis();
        let timeout_ms = i64::try_from(visibility_timeout.as_millis()).unwrap_or(i64::MAX);
        let hidden_until = now.saturating_add(timeout_ms);

        // IMMEDIATE takes the write lock up front, so two consumers never lease the same message
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let visible: Vec<(i64, String, u32)> = {
            let mut stmt = tx.prepare(
                "SELECT id, body, receive_count FROM queue_messages
                 WHERE visible_at <= ?1 ORDER BY id LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![now, max_messages as i64], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let mut messages = Vec::with_capacity(visible.len());
        for (id, body, previous_count) in visible {
            tx.execute(
                "UPDATE queue_messages SET visible_at = ?1, receive_count = receive_count + 1
                 WHERE id = ?2",
                params![hidden_until, id],
            )?;

            let receive_count = previous_count + 1;
            messages.push(QueueMessage {
                id,
                body,
                receipt: format_receipt(id, receive_count),
                receive_count,
            });
        }

        tx.commit()?;
        Ok(messages)
    }

    fn acknowledge(&mut self, receipt: &str) -> QueueResult<()> {
        let (id, receive_count) = parse_receipt(receipt)?;

        let deleted = self.conn.execute(
            "DELETE FROM queue_messages WHERE id = ?1 AND receive_count = ?2",
            params![id, receive_count],
        )?;
        if deleted > 0 {
            return Ok(());
        }

        let still_queued: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM queue_messages WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        match still_queued {
            Some(_) => Err(QueueError::StaleReceipt(receipt.to_string())),
            None => Ok(()),
        }
    }

    fn pending_count(&self) -> QueueResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM queue_messages", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn format_receipt(id: i64, receive_count: u32) -> String {
    format!("{}:{}", id, receive_count)
}

fn parse_receipt(receipt: &str) -> QueueResult<(i64, u32)> {
    let invalid = || QueueError::InvalidReceipt(receipt.to_string());
    let (id, count) = receipt.split_once(':').ok_or_else(invalid)?;
    let id = id.parse().map_err(|_| invalid())?;
    let count = count.parse().map_err(|_| invalid())?;
    Ok((id, count))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG: Duration = Duration::from_secs(300);

    #[test]
    fn test_publish_and_receive() {
        let mut queue = SqliteWorkQueue::new_in_memory().unwrap();
        queue.publish("/en/car/1/a").unwrap();
        queue.publish("/en/car/2/b").unwrap();

        let messages = queue.receive(10, LONG).unwrap();
        let bodies: Vec<&str> = messages.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["/en/car/1/a", "/en/car/2/b"]);
        assert!(messages.iter().all(|m| m.receive_count == 1));
    }

    #[test]
    fn test_received_messages_are_hidden() {
        let mut queue = SqliteWorkQueue::new_in_memory().unwrap();
        queue.publish("/en/car/1/a").unwrap();

        assert_eq!(queue.receive(10, LONG).unwrap().len(), 1);
        assert!(queue.receive(10, LONG).unwrap().is_empty());
        assert_eq!(queue.pending_count().unwrap(), 1);
    }

    #[test]
    fn test_huge_visibility_timeout_keeps_message_hidden() {
        let mut queue = SqliteWorkQueue::new_in_memory().unwrap();
        queue.publish("/en/car/1/a").unwrap();

        let huge = Duration::from_secs(10_000_000_000_000_000);
        assert_eq!(queue.receive(1, huge).unwrap().len(), 1);
        assert!(queue.receive(1, huge).unwrap().is_empty());
    }

    #[test]
    fn test_receive_respects_max_messages() {
        let mut queue = SqliteWorkQueue::new_in_memory().unwrap();
        for i in 0..5 {
            queue.publish(&format!("/en/car/{}/x", i)).unwrap();
        }

        assert_eq!(queue.receive(2, LONG).unwrap().len(), 2);
        assert_eq!(queue.receive(10, LONG).unwrap().len(), 3);
    }

    #[test]
    fn test_acknowledge_deletes() {
        let mut queue = SqliteWorkQueue::new_in_memory().unwrap();
        queue.publish("/en/car/1/a").unwrap();

        let message = queue.receive(1, LONG).unwrap().remove(0);
        queue.acknowledge(&message.receipt).unwrap();

        assert_eq!(queue.pending_count().unwrap(), 0);
        // Acknowledging twice is harmless
        queue.acknowledge(&message.receipt).unwrap();
    }

    #[test]
    fn test_unacknowledged_message_is_redelivered() {
        let mut queue = SqliteWorkQueue::new_in_memory().unwrap();
        queue.publish("/en/car/1/a").unwrap();

        let first = queue.receive(1, Duration::ZERO).unwrap().remove(0);
        let second = queue.receive(1, Duration::ZERO).unwrap().remove(0);

        assert_eq!(first.id, second.id);
        assert_eq!(second.receive_count, 2);
        assert_ne!(first.receipt, second.receipt);
    }

    #[test]
    fn test_stale_receipt_rejected() {
        let mut queue = SqliteWorkQueue::new_in_memory().unwrap();
        queue.publish("/en/car/1/a").unwrap();

        let first = queue.receive(1, Duration::ZERO).unwrap().remove(0);
        let second = queue.receive(1, LONG).unwrap().remove(0);

        assert!(matches!(
            queue.acknowledge(&first.receipt),
            Err(QueueError::StaleReceipt(_))
        ));
        queue.acknowledge(&second.receipt).unwrap();
        assert_eq!(queue.pending_count().unwrap(), 0);
    }

    #[test]
    fn test_malformed_receipt() {
        let mut queue = SqliteWorkQueue::new_in_memory().unwrap();
        assert!(matches!(
            queue.acknowledge("not-a-receipt"),
            Err(QueueError::InvalidReceipt(_))
        ));
        assert!(matches!(
            queue.acknowledge("1:x"),
            Err(QueueError::InvalidReceipt(_))
        ));
    }

    #[test]
    fn test_queue_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.db");

        {
            let mut queue = SqliteWorkQueue::new(&path).unwrap();
            queue.publish("/en/car/9/z").unwrap();
        }

        let mut queue = SqliteWorkQueue::new(&path).unwrap();
        let messages = queue.receive(10, LONG).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].body, "/en/car/9/z");
    }
}
