//! SQS inspection for queuescope
//!
//! Provides:
//! - A [`QueueTransport`] seam with an AWS SDK backend and an in-memory backend
//! - Peek: best-effort, deduplicated browsing via short-visibility receives
//! - Refetch: re-acquiring a deletable receipt handle for a peeked message

pub mod aws;
pub mod inspector;
pub mod memory;
pub mod message;
pub mod policy;
pub mod transport;

#[cfg(test)]
mod testing;

pub use aws::SqsTransport;
pub use inspector::{DeleteOutcome, Inspector, DEFAULT_PEEK_MAX};
pub use memory::MemoryTransport;
pub use message::Message;
pub use policy::{PeekPolicy, PolicyError, RefetchPolicy};
pub use transport::{QueueTransport, RawMessage, ReceiveRequest, TransportError, TransportLimits};
