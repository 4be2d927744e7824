//! queuescope - admin front-end for SQS queues
//!
//! Wires the inspector from `queuescope-sqs` into a small JSON API.

pub mod config;
pub mod router;

pub use config::{Backend, Config};
pub use router::{create_router, AppState};
