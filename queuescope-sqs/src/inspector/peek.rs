use chrono::Utc;
use queuescope_core::QueueRef;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{pause, Inspector};
use crate::message::{Message, PeekBatch};
use crate::transport::ReceiveRequest;

/// Why a peek stopped before its round budget ran out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Full,
    Quiet,
    EmptyQueue,
    Cancelled,
    Exhausted,
}

impl StopReason {
    fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Quiet => "quiet",
            Self::EmptyQueue => "empty-queue",
            Self::Cancelled => "cancelled",
            Self::Exhausted => "rounds-exhausted",
        }
    }
}

impl Inspector {
    /// Best-effort snapshot of up to `max_messages` messages in `queue`.
    ///
    /// Never fails: transport errors are logged and the rounds they hit
    /// count as rounds without new messages. A cancelled peek returns what
    /// it has gathered so far. Every message received here stays hidden
    /// from other consumers for the peek visibility timeout.
    pub async fn peek(
        &self,
        queue: &QueueRef,
        max_messages: usize,
        cancel: &CancellationToken,
    ) -> Vec<Message> {
        if max_messages == 0 {
            return Vec::new();
        }

        let approx_count = tokio::select! {
            biased;
            () = cancel.cancelled() => return Vec::new(),
            count = self.transport.approximate_count(queue) => count,
        };
        let rounds = self.peek_policy.rounds_for(approx_count, self.limits.max_batch);
        debug!(queue = %queue, ?approx_count, rounds, "Starting peek");

        let mut batch = PeekBatch::new(max_messages);
        let mut quiet_rounds = 0;
        let mut stop = StopReason::Exhausted;

        for round in 0..rounds {
            if round > 0 && !pause(self.peek_policy.inter_round_delay, cancel).await {
                stop = StopReason::Cancelled;
                break;
            }

            let request = ReceiveRequest {
                max_batch: self.limits.max_batch,
                visibility_timeout: self.peek_policy.visibility_timeout,
                wait_time: self.peek_policy.wait_for_round(round),
                with_attributes: true,
            }
            .clamped(&self.limits);

            let received = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    stop = StopReason::Cancelled;
                    break;
                }
                result = self.transport.receive(queue, request) => result,
            };

            let (received_count, new_count) = match received {
                Ok(raw) => {
                    let received_count = raw.len();
                    (received_count, batch.absorb(raw, Utc::now()))
                }
                Err(e) => {
                    warn!(queue = %queue, round, error = %e, "Peek round failed");
                    (0, 0)
                }
            };
            debug!(
                queue = %queue,
                round,
                received = received_count,
                new_messages = new_count,
                collected = batch.len(),
                "Peek round finished"
            );

            if batch.is_full() {
                stop = StopReason::Full;
                break;
            }
            if round == 0 && approx_count == Some(0) && received_count == 0 {
                stop = StopReason::EmptyQueue;
                break;
            }
            if new_count == 0 {
                quiet_rounds += 1;
                if quiet_rounds >= self.peek_policy.empty_round_stop_threshold {
                    stop = StopReason::Quiet;
                    break;
                }
            } else {
                quiet_rounds = 0;
            }
        }

        info!(
            queue = %queue,
            collected = batch.len(),
            stop = stop.as_str(),
            "Peek complete"
        );
        batch.into_messages()
    }
}
