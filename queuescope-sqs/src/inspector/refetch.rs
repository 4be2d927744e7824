use chrono::Utc;
use queuescope_core::QueueRef;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{pause, DeleteOutcome, Inspector};
use crate::message::Message;
use crate::transport::{ReceiveRequest, TransportError};

impl Inspector {
    /// Receive `message_id` again with a long visibility timeout so its
    /// fresh receipt handle stays usable for a delete.
    ///
    /// Receipt handles collected by a peek expire with the peek's short
    /// visibility window, so deletion always goes through here. `None`
    /// means the message did not surface within the attempt budget and
    /// should be treated as no longer available.
    pub async fn refetch_by_id(
        &self,
        queue: &QueueRef,
        message_id: &str,
        cancel: &CancellationToken,
    ) -> Option<Message> {
        let policy = &self.refetch_policy;
        let request = ReceiveRequest {
            max_batch: self.limits.max_batch,
            visibility_timeout: policy.visibility_timeout,
            wait_time: policy.wait_time,
            with_attributes: true,
        }
        .clamped(&self.limits);

        for attempt in 1..=policy.attempts {
            if attempt > 1 && !pause(policy.retry_delay, cancel).await {
                debug!(queue = %queue, message_id, attempt, "Refetch cancelled");
                return None;
            }

            let received = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(queue = %queue, message_id, attempt, "Refetch cancelled");
                    return None;
                }
                result = self.transport.receive(queue, request) => result,
            };

            match received {
                Ok(raw) => {
                    if let Some(found) = raw.into_iter().find(|m| m.id == message_id) {
                        info!(queue = %queue, message_id, attempt, "Refetched message");
                        return Some(Message::from_raw(found, Utc::now()));
                    }
                    debug!(queue = %queue, message_id, attempt, "Message not in batch");
                }
                Err(e) => {
                    warn!(queue = %queue, message_id, attempt, error = %e, "Refetch attempt failed");
                }
            }
        }

        info!(
            queue = %queue,
            message_id,
            attempts = policy.attempts,
            "Message not available for refetch"
        );
        None
    }

    /// Refetch `message_id` and delete it with the fresh receipt handle
    pub async fn delete_by_id(
        &self,
        queue: &QueueRef,
        message_id: &str,
        cancel: &CancellationToken,
    ) -> Result<DeleteOutcome, TransportError> {
        let Some(message) = self.refetch_by_id(queue, message_id, cancel).await else {
            return Ok(DeleteOutcome::NotAvailable);
        };

        self.transport
            .delete_by_handle(queue, &message.receipt_handle)
            .await?;

        info!(queue = %queue, message_id, "Deleted message");
        Ok(DeleteOutcome::Deleted)
    }
}
