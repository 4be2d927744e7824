//! Normalized messages and per-call deduplication

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::transport::RawMessage;

/// System attribute carrying the enqueue time in epoch milliseconds
pub const SENT_TIMESTAMP: &str = "SentTimestamp";

/// A message as presented to callers.
///
/// Built fresh from every receive call and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: String,
    pub body: String,
    pub receipt_handle: String,
    pub attributes: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// `captured_at` is used as the timestamp when the transport did not
    /// report an enqueue time.
    pub fn from_raw(raw: RawMessage, captured_at: DateTime<Utc>) -> Self {
        let timestamp = sent_timestamp(&raw.attributes).unwrap_or(captured_at);
        Self {
            id: raw.id,
            body: raw.body,
            receipt_handle: raw.receipt_handle,
            attributes: raw.attributes,
            timestamp,
        }
    }
}

fn sent_timestamp(attributes: &BTreeMap<String, String>) -> Option<DateTime<Utc>> {
    let millis = attributes.get(SENT_TIMESTAMP)?.trim().parse::<i64>().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

/// Message ids already observed during one call
#[derive(Debug, Default)]
pub(crate) struct SeenIds(HashSet<String>);

impl SeenIds {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the id had not been seen before
    pub(crate) fn insert(&mut self, id: &str) -> bool {
        if self.0.contains(id) {
            return false;
        }
        self.0.insert(id.to_string())
    }
}

/// Deduplicated, capped accumulator for one peek call.
///
/// The first receive of an id wins; later receives of the same id are
/// dropped along with their receipt handles.
#[derive(Debug)]
pub(crate) struct PeekBatch {
    seen: SeenIds,
    messages: Vec<Message>,
    cap: usize,
}

impl PeekBatch {
    pub(crate) fn new(cap: usize) -> Self {
        Self {
            seen: SeenIds::new(),
            messages: Vec::with_capacity(cap.min(64)),
            cap,
        }
    }

    /// Fold one round's messages in and return how many were new.
    ///
    /// Messages past the cap are not kept but still count as new, so a
    /// full batch never looks like a quiet round.
    pub(crate) fn absorb(&mut self, raw: Vec<RawMessage>, captured_at: DateTime<Utc>) -> usize {
        let mut new = 0;
        for message in raw {
            if !self.seen.insert(&message.id) {
                continue;
            }
            new += 1;
            if self.messages.len() < self.cap {
                self.messages.push(Message::from_raw(message, captured_at));
            }
        }
        new
    }

    pub(crate) fn is_full(&self) -> bool {
        self.messages.len() >= self.cap
    }

    pub(crate) fn len(&self) -> usize {
        self.messages.len()
    }

    pub(crate) fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}
