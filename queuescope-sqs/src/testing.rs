//! Scripted transport for exercising the inspector without a queue service

use async_trait::async_trait;
use queuescope_core::QueueRef;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::transport::{QueueTransport, RawMessage, ReceiveRequest, TransportError};

type ReceiveScript = Box<dyn Fn(usize) -> Result<Vec<RawMessage>, TransportError> + Send + Sync>;

/// Replays receive results by call index and records every call made
pub struct ScriptedTransport {
    script: ReceiveScript,
    approx_count: Option<u64>,
    stall_from: Option<usize>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ReceiveRequest>>,
    deleted: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(usize) -> Result<Vec<RawMessage>, TransportError> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            approx_count: None,
            stall_from: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
        }
    }

    /// Plays `rounds` in order, then returns empty batches
    pub fn rounds(rounds: Vec<Vec<RawMessage>>) -> Self {
        Self::new(move |call| Ok(rounds.get(call).cloned().unwrap_or_default()))
    }

    pub fn with_approx_count(mut self, count: u64) -> Self {
        self.approx_count = Some(count);
        self
    }

    /// Receive calls from index `call` onwards never complete
    pub fn stall_from(mut self, call: usize) -> Self {
        self.stall_from = Some(call);
        self
    }

    pub fn receive_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ReceiveRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn deleted_handles(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

/// A message whose receipt handle records which call produced it
pub fn raw(id: &str, body: &str, call: usize) -> RawMessage {
    RawMessage {
        id: id.to_string(),
        body: body.to_string(),
        receipt_handle: format!("{id}-handle-{call}"),
        attributes: BTreeMap::new(),
    }
}

pub fn test_queue() -> QueueRef {
    QueueRef::parse("http://localhost:4566/000000000000/test-queue").unwrap()
}

#[async_trait]
impl QueueTransport for ScriptedTransport {
    async fn receive(
        &self,
        _queue: &QueueRef,
        request: ReceiveRequest,
    ) -> Result<Vec<RawMessage>, TransportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);

        if self.stall_from.is_some_and(|from| call >= from) {
            std::future::pending::<()>().await;
        }

        let mut batch = (self.script)(call)?;
        batch.truncate(request.max_batch as usize);
        Ok(batch)
    }

    async fn approximate_count(&self, _queue: &QueueRef) -> Option<u64> {
        self.approx_count
    }

    async fn delete_by_handle(
        &self,
        _queue: &QueueRef,
        receipt_handle: &str,
    ) -> Result<(), TransportError> {
        self.deleted
            .lock()
            .unwrap()
            .push(receipt_handle.to_string());
        Ok(())
    }

    async fn list_queues(&self, _prefix: Option<&str>) -> Result<Vec<String>, TransportError> {
        Ok(vec![test_queue().url().to_string()])
    }

    async fn create_queue(&self, name: &str) -> Result<String, TransportError> {
        Err(TransportError::Service(format!("cannot create {name} on a scripted transport")))
    }

    async fn delete_queue(&self, queue: &QueueRef) -> Result<(), TransportError> {
        Err(TransportError::QueueNotFound(queue.to_string()))
    }

    async fn queue_attributes(
        &self,
        _queue: &QueueRef,
    ) -> Result<BTreeMap<String, String>, TransportError> {
        Ok(BTreeMap::new())
    }

    async fn send_message(&self, _queue: &QueueRef, _body: &str) -> Result<String, TransportError> {
        Err(TransportError::Service("scripted transport is read-only".to_string()))
    }
}
