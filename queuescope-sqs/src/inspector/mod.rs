//! Non-destructive queue inspection
//!
//! The queue service only offers destructive receives. [`Inspector::peek`]
//! approximates a read-only listing with repeated short-visibility receives,
//! and [`Inspector::refetch_by_id`] re-acquires a fresh receipt handle for a
//! message seen during a peek so it can be deleted.
//!
//! Both calls absorb transport failures: a peek degrades to whatever it
//! collected, a refetch to `None`. Each call owns its own state and runs its
//! receives strictly one after another.

mod peek;
mod refetch;


use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::policy::{PeekPolicy, RefetchPolicy};
use crate::transport::{QueueTransport, TransportLimits};

/// Messages returned by a peek when the caller does not say otherwise
pub const DEFAULT_PEEK_MAX: usize = 10;

/// Result of deleting a message by id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The message did not surface within the refetch budget. It may have
    /// been deleted, expired, or be held invisible by another consumer.
    NotAvailable,
}

pub struct Inspector {
    transport: Arc<dyn QueueTransport>,
    peek_policy: PeekPolicy,
    refetch_policy: RefetchPolicy,
    limits: TransportLimits,
}

impl Inspector {
    pub fn new(transport: Arc<dyn QueueTransport>) -> Self {
        Self {
            transport,
            peek_policy: PeekPolicy::default(),
            refetch_policy: RefetchPolicy::default(),
            limits: TransportLimits::default(),
        }
    }

    pub fn with_peek_policy(mut self, policy: PeekPolicy) -> Self {
        self.peek_policy = policy;
        self
    }

    pub fn with_refetch_policy(mut self, policy: RefetchPolicy) -> Self {
        self.refetch_policy = policy;
        self
    }

    pub fn with_limits(mut self, limits: TransportLimits) -> Self {
        self.limits = limits;
        self
    }

    /// The underlying transport, for plain passthrough operations
    pub fn transport(&self) -> &Arc<dyn QueueTransport> {
        &self.transport
    }

    pub fn peek_policy(&self) -> &PeekPolicy {
        &self.peek_policy
    }

    pub fn refetch_policy(&self) -> &RefetchPolicy {
        &self.refetch_policy
    }
}

/// Sleep unless cancelled first. Returns `false` if cancelled.
async fn pause(delay: Duration, cancel: &CancellationToken) -> bool {
    if delay.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}
