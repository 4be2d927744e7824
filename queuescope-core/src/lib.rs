//! Core types for queuescope
//!
//! This crate provides the queue locator and the API error shape used by
//! every other queuescope crate.

pub mod error;
pub mod queue_ref;

pub use error::{ApiError, ErrorCode};
pub use queue_ref::{validate_queue_name, QueueRef, QueueRefError};
