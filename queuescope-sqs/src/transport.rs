//! Queue transport abstraction
//!
//! Everything the inspector needs from the queue service goes through
//! [`QueueTransport`]. The composition root builds one implementation and
//! injects it; nothing in this crate holds a process-wide client.

use async_trait::async_trait;
use queuescope_core::QueueRef;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Queue does not exist: {0}")]
    QueueNotFound(String),
    #[error("Receipt handle is invalid or expired")]
    ReceiptHandleInvalid,
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("Queue service error: {0}")]
    Service(String),
}

/// Parameters for one receive call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveRequest {
    pub max_batch: u32,
    pub visibility_timeout: Duration,
    pub wait_time: Duration,
    pub with_attributes: bool,
}

impl ReceiveRequest {
    /// Clamp every field to what the service accepts
    pub fn clamped(self, limits: &TransportLimits) -> Self {
        Self {
            max_batch: self.max_batch.clamp(1, limits.max_batch),
            visibility_timeout: self.visibility_timeout.min(limits.max_visibility_timeout()),
            wait_time: self.wait_time.min(limits.max_wait_time()),
            with_attributes: self.with_attributes,
        }
    }
}

/// A message exactly as one receive call returned it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub id: String,
    pub body: String,
    pub receipt_handle: String,
    pub attributes: BTreeMap<String, String>,
}

/// Hard limits of the queue service.
///
/// These come from the service, not from this tool, so they are
/// configuration rather than constants baked into the algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransportLimits {
    pub max_batch: u32,
    pub max_visibility_timeout_secs: u64,
    pub max_wait_time_secs: u64,
}

impl TransportLimits {
    pub fn max_visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.max_visibility_timeout_secs)
    }

    pub fn max_wait_time(&self) -> Duration {
        Duration::from_secs(self.max_wait_time_secs)
    }
}

impl Default for TransportLimits {
    fn default() -> Self {
        Self {
            max_batch: 10,
            max_visibility_timeout_secs: 12 * 60 * 60,
            max_wait_time_secs: 20,
        }
    }
}

#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Destructive receive: returned messages stay hidden for the
    /// requested visibility timeout.
    async fn receive(
        &self,
        queue: &QueueRef,
        request: ReceiveRequest,
    ) -> Result<Vec<RawMessage>, TransportError>;

    /// Best-effort message count. `None` means unknown.
    async fn approximate_count(&self, queue: &QueueRef) -> Option<u64>;

    async fn delete_by_handle(
        &self,
        queue: &QueueRef,
        receipt_handle: &str,
    ) -> Result<(), TransportError>;

    async fn list_queues(&self, prefix: Option<&str>) -> Result<Vec<String>, TransportError>;

    async fn create_queue(&self, name: &str) -> Result<String, TransportError>;

    async fn delete_queue(&self, queue: &QueueRef) -> Result<(), TransportError>;

    async fn queue_attributes(
        &self,
        queue: &QueueRef,
    ) -> Result<BTreeMap<String, String>, TransportError>;

    /// Returns the id the service assigned to the new message
    async fn send_message(&self, queue: &QueueRef, body: &str) -> Result<String, TransportError>;
}
