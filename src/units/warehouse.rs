//! Warehouse unit: turns queued listing references into stored rows
//!
//! Per message the order is fixed: extract, persist, then acknowledge. A
//! message whose extraction or write fails is left unacknowledged and comes
//! back after the visibility timeout; that redelivery is the pipeline's only
//! retry mechanism.

use crate::crawler::{extract_listing, SiteClient};
use crate::queue::{QueueMessage, WorkQueue};
use crate::record::{ListingReference, ReferenceError};
use crate::storage::{ListingStore, PersistOutcome};
use crate::Result;
use serde::Serialize;
use std::time::Duration;

/// A message that could not be processed in this invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedMessage {
    pub reference: String,
    pub receive_count: u32,
    pub error: String,
    /// Whether the message was dropped instead of left for redelivery
    pub acknowledged: bool,
}

/// Outcome of one batch of queue messages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessSummary {
    pub received: usize,
    pub persisted: usize,
    pub duplicates: usize,
    pub failed: Vec<FailedMessage>,
}

impl ProcessSummary {
    /// Messages that ended in a stored (or already stored) listing
    pub fn succeeded(&self) -> usize {
        self.persisted + self.duplicates
    }
}

/// Decodes a message body into a reference
///
/// Bodies are raw reference strings; a JSON-encoded string is accepted too.
pub fn decode_message_body(body: &str) -> std::result::Result<ListingReference, ReferenceError> {
    let trimmed = body.trim();
    if trimmed.starts_with('"') {
        if let Ok(decoded) = serde_json::from_str::<String>(trimmed) {
            return ListingReference::parse(&decoded);
        }
    }
    ListingReference::parse(trimmed)
}

/// Extracts, persists and acknowledges a single message
///
/// Nothing is acknowledged unless the write succeeded. A duplicate delivery
/// of an already stored listing is acknowledged as well.
pub async fn process_message(
    site: &SiteClient,
    queue: &mut dyn WorkQueue,
    store: &mut dyn ListingStore,
    message: &QueueMessage,
) -> Result<PersistOutcome> {
    let reference = decode_message_body(&message.body)?;
    let record = extract_listing(site, &reference).await?;
    let outcome = store.persist(&record)?;
    queue.acknowledge(&message.receipt)?;

    tracing::info!(
        "Listing {} {:?} (delivery {})",
        record.listing_id,
        outcome,
        message.receive_count
    );
    Ok(outcome)
}

/// Receives up to `max_messages` and processes each independently
///
/// A failing message does not stop the batch. Only queue failures while
/// receiving abort the whole unit.
pub async fn process_batch(
    site: &SiteClient,
    queue: &mut dyn WorkQueue,
    store: &mut dyn ListingStore,
    max_messages: usize,
    visibility_timeout: Duration,
) -> Result<ProcessSummary> {
    let messages = queue.receive(max_messages, visibility_timeout)?;
    let mut summary = ProcessSummary {
        received: messages.len(),
        ..Default::default()
    };

    for message in &messages {
        match process_message(site, queue, store, message).await {
            Ok(PersistOutcome::Inserted) => summary.persisted += 1,
            Ok(PersistOutcome::AlreadyPresent) => summary.duplicates += 1,
            Err(e) => {
                // A body that is not a reference can never succeed, so it is dropped
                let acknowledged = matches!(e, crate::HarvestError::Reference(_))
                    && queue.acknowledge(&message.receipt).is_ok();

                tracing::warn!(
                    "Message {} ({}) failed on delivery {}: {}",
                    message.id,
                    message.body,
                    message.receive_count,
                    e
                );
                summary.failed.push(FailedMessage {
                    reference: message.body.clone(),
                    receive_count: message.receive_count,
                    error: e.to_string(),
                    acknowledged,
                });
            }
        }
    }

    tracing::info!(
        "Processed {} messages: {} persisted, {} duplicates, {} failed",
        summary.received,
        summary.persisted,
        summary.duplicates,
        summary.failed.len()
    );
    Ok(summary)
}
