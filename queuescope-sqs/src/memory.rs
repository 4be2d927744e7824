//! In-memory queue service
//!
//! Behaves like the real service where the inspector cares: received
//! messages stay hidden until their visibility timeout lapses, each receive
//! issues a new receipt handle, and only the latest handle deletes. Long
//! polling is not emulated; receives return immediately.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use queuescope_core::QueueRef;
use std::collections::{BTreeMap, VecDeque};
use tracing::info;

use crate::message::SENT_TIMESTAMP;
use crate::transport::{QueueTransport, RawMessage, ReceiveRequest, TransportError};

const ACCOUNT_ID: &str = "000000000000";
const DEFAULT_VISIBILITY_TIMEOUT_SECS: u32 = 30;

#[derive(Debug, Clone)]
struct Queue {
    name: String,
    url: String,
    created_timestamp: i64,
}

impl Queue {
    fn new(url: String, name: &str) -> Self {
        Self {
            url,
            name: name.to_string(),
            created_timestamp: Utc::now().timestamp(),
        }
    }
}

#[derive(Debug, Clone)]
struct StoredMessage {
    message_id: String,
    body: String,
    receipt_handle: Option<String>,
    sent_timestamp: i64,
    receive_count: u32,
    first_receive_timestamp: Option<i64>,
    visible_at: DateTime<Utc>,
}

impl StoredMessage {
    fn new(body: &str) -> Self {
        let now = Utc::now();
        Self {
            message_id: uuid::Uuid::new_v4().to_string(),
            body: body.to_string(),
            receipt_handle: None,
            sent_timestamp: now.timestamp_millis(),
            receive_count: 0,
            first_receive_timestamp: None,
            visible_at: now,
        }
    }

    fn is_visible(&self, now: DateTime<Utc>) -> bool {
        self.visible_at <= now
    }

    fn to_raw(&self, handle: String, with_attributes: bool) -> RawMessage {
        let mut attributes = BTreeMap::new();
        if with_attributes {
            attributes.insert(SENT_TIMESTAMP.to_string(), self.sent_timestamp.to_string());
            attributes.insert(
                "ApproximateReceiveCount".to_string(),
                self.receive_count.to_string(),
            );
            if let Some(first) = self.first_receive_timestamp {
                attributes.insert(
                    "ApproximateFirstReceiveTimestamp".to_string(),
                    first.to_string(),
                );
            }
        }
        RawMessage {
            id: self.message_id.clone(),
            body: self.body.clone(),
            receipt_handle: handle,
            attributes,
        }
    }
}

/// Queues and their messages are keyed by full queue URL, so a URL naming
/// another host or account never resolves here.
#[derive(Debug)]
pub struct MemoryTransport {
    base_url: String,
    queues: DashMap<String, Queue>,
    messages: DashMap<String, VecDeque<StoredMessage>>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new("http://localhost:4566")
    }
}

impl MemoryTransport {
    /// `base_url` is the scheme and authority used in generated queue URLs
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            queues: DashMap::new(),
            messages: DashMap::new(),
        }
    }

    fn queue_url(&self, name: &str) -> String {
        format!("{}/{ACCOUNT_ID}/{name}", self.base_url)
    }

    fn get_queue(&self, queue: &QueueRef) -> Result<Queue, TransportError> {
        self.queues
            .get(queue.url())
            .map(|q| q.value().clone())
            .ok_or_else(|| TransportError::QueueNotFound(queue.to_string()))
    }
}

#[async_trait]
impl QueueTransport for MemoryTransport {
    async fn receive(
        &self,
        queue: &QueueRef,
        request: ReceiveRequest,
    ) -> Result<Vec<RawMessage>, TransportError> {
        let mut messages = self
            .messages
            .get_mut(queue.url())
            .ok_or_else(|| TransportError::QueueNotFound(queue.to_string()))?;

        let now = Utc::now();
        let visibility = chrono::Duration::from_std(request.visibility_timeout)
            .unwrap_or_else(|_| chrono::Duration::seconds(DEFAULT_VISIBILITY_TIMEOUT_SECS.into()));
        let hidden_until = now + visibility;
        let max = request.max_batch as usize;

        let mut result = Vec::new();
        let mut received = Vec::new();
        let mut remaining = VecDeque::with_capacity(messages.len());

        for mut msg in messages.drain(..) {
            if received.len() < max && msg.is_visible(now) {
                msg.receive_count += 1;
                msg.first_receive_timestamp
                    .get_or_insert(now.timestamp_millis());
                msg.visible_at = hidden_until;

                let handle = uuid::Uuid::new_v4().to_string();
                msg.receipt_handle = Some(handle.clone());
                result.push(msg.to_raw(handle, request.with_attributes));
                received.push(msg);
            } else {
                remaining.push_back(msg);
            }
        }

        // Received messages go to the back so later receives reach the rest
        remaining.extend(received);
        *messages = remaining;

        info!(queue = %queue.name(), count = result.len(), "Received messages");
        Ok(result)
    }

    async fn approximate_count(&self, queue: &QueueRef) -> Option<u64> {
        let now = Utc::now();
        self.messages
            .get(queue.url())
            .map(|msgs| msgs.iter().filter(|m| m.is_visible(now)).count() as u64)
    }

    async fn delete_by_handle(
        &self,
        queue: &QueueRef,
        receipt_handle: &str,
    ) -> Result<(), TransportError> {
        let mut messages = self
            .messages
            .get_mut(queue.url())
            .ok_or_else(|| TransportError::QueueNotFound(queue.to_string()))?;

        let original_len = messages.len();
        messages.retain(|m| m.receipt_handle.as_deref() != Some(receipt_handle));

        if messages.len() == original_len {
            return Err(TransportError::ReceiptHandleInvalid);
        }

        info!(queue = %queue.name(), receipt = %receipt_handle, "Deleted message");
        Ok(())
    }

    async fn list_queues(&self, prefix: Option<&str>) -> Result<Vec<String>, TransportError> {
        let mut urls: Vec<String> = self
            .queues
            .iter()
            .filter(|q| prefix.map_or(true, |p| q.value().name.starts_with(p)))
            .map(|q| q.value().url.clone())
            .collect();
        urls.sort();
        Ok(urls)
    }

    async fn create_queue(&self, name: &str) -> Result<String, TransportError> {
        // Creating an existing queue returns its URL, as the service does
        let url = self.queue_url(name);
        let queue = self
            .queues
            .entry(url.clone())
            .or_insert_with(|| {
                info!(name = %name, "Creating queue");
                Queue::new(url, name)
            })
            .clone();
        self.messages.entry(queue.url.clone()).or_default();
        Ok(queue.url)
    }

    async fn delete_queue(&self, queue: &QueueRef) -> Result<(), TransportError> {
        if self.queues.remove(queue.url()).is_none() {
            return Err(TransportError::QueueNotFound(queue.to_string()));
        }
        self.messages.remove(queue.url());
        info!(name = %queue.name(), "Deleting queue");
        Ok(())
    }

    async fn queue_attributes(
        &self,
        queue: &QueueRef,
    ) -> Result<BTreeMap<String, String>, TransportError> {
        let stored = self.get_queue(queue)?;
        let now = Utc::now();
        let (visible, hidden) = self
            .messages
            .get(queue.url())
            .map(|msgs| {
                let visible = msgs.iter().filter(|m| m.is_visible(now)).count();
                (visible, msgs.len() - visible)
            })
            .unwrap_or_default();

        let mut attributes = BTreeMap::new();
        attributes.insert(
            "QueueArn".to_string(),
            format!("arn:aws:sqs:us-east-1:{ACCOUNT_ID}:{}", stored.name),
        );
        attributes.insert("ApproximateNumberOfMessages".to_string(), visible.to_string());
        attributes.insert(
            "ApproximateNumberOfMessagesNotVisible".to_string(),
            hidden.to_string(),
        );
        attributes.insert(
            "CreatedTimestamp".to_string(),
            stored.created_timestamp.to_string(),
        );
        attributes.insert(
            "VisibilityTimeout".to_string(),
            DEFAULT_VISIBILITY_TIMEOUT_SECS.to_string(),
        );
        if queue.is_fifo() {
            attributes.insert("FifoQueue".to_string(), "true".to_string());
        }
        Ok(attributes)
    }

    async fn send_message(&self, queue: &QueueRef, body: &str) -> Result<String, TransportError> {
        self.get_queue(queue)?;

        let message = StoredMessage::new(body);
        let message_id = message.message_id.clone();

        if let Some(mut msgs) = self.messages.get_mut(queue.url()) {
            msgs.push_back(message);
        }

        info!(queue = %queue.name(), message_id = %message_id, "Sent message");
        Ok(message_id)
    }
}
