//! Amazon SQS transport backed by the AWS SDK

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sqs::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_sqs::types::{MessageSystemAttributeName, QueueAttributeName};
use aws_sdk_sqs::Client;
use queuescope_core::QueueRef;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};

use crate::transport::{QueueTransport, RawMessage, ReceiveRequest, TransportError};

/// FIFO queues need a group id on send; this tool uses one group for all
const FIFO_MESSAGE_GROUP: &str = "queuescope";

#[derive(Debug, Clone)]
pub struct SqsTransport {
    client: Client,
}

impl SqsTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the standard AWS environment, with optional
    /// region and endpoint overrides (for LocalStack and friends)
    pub async fn from_env(region: Option<String>, endpoint_url: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region));
        }
        if let Some(endpoint) = endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        let config = loader.load().await;
        Self::new(Client::new(&config))
    }
}

/// Seconds for the service, rounded up so a window is never shortened
fn whole_seconds(duration: Duration) -> i32 {
    let secs = duration
        .as_secs()
        .saturating_add(u64::from(duration.subsec_nanos() > 0));
    i32::try_from(secs).unwrap_or(i32::MAX)
}

fn map_sdk_error<E, R>(err: SdkError<E, R>) -> TransportError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug + 'static,
{
    if matches!(err, SdkError::TimeoutError(_)) {
        return TransportError::Timeout(DisplayErrorContext(&err).to_string());
    }
    let code = err.as_service_error().and_then(ProvideErrorMetadata::code);
    match code {
        Some("QueueDoesNotExist" | "AWS.SimpleQueueService.NonExistentQueue") => {
            TransportError::QueueNotFound(DisplayErrorContext(&err).to_string())
        }
        Some("ReceiptHandleIsInvalid") => TransportError::ReceiptHandleInvalid,
        _ => TransportError::Service(DisplayErrorContext(&err).to_string()),
    }
}

fn to_raw(message: aws_sdk_sqs::types::Message) -> Option<RawMessage> {
    let (Some(id), Some(receipt_handle)) = (message.message_id, message.receipt_handle) else {
        warn!("Skipping message without id or receipt handle");
        return None;
    };

    let mut attributes: BTreeMap<String, String> = message
        .attributes
        .unwrap_or_default()
        .into_iter()
        .map(|(name, value)| (name.as_str().to_string(), value))
        .collect();

    for (name, value) in message.message_attributes.unwrap_or_default() {
        let rendered = value
            .string_value()
            .map_or_else(|| format!("({})", value.data_type()), str::to_string);
        attributes.entry(name).or_insert(rendered);
    }

    Some(RawMessage {
        id,
        body: message.body.unwrap_or_default(),
        receipt_handle,
        attributes,
    })
}

#[async_trait]
impl QueueTransport for SqsTransport {
    async fn receive(
        &self,
        queue: &QueueRef,
        request: ReceiveRequest,
    ) -> Result<Vec<RawMessage>, TransportError> {
        let mut call = self
            .client
            .receive_message()
            .queue_url(queue.url())
            .max_number_of_messages(i32::try_from(request.max_batch).unwrap_or(i32::MAX))
            .visibility_timeout(whole_seconds(request.visibility_timeout))
            .wait_time_seconds(whole_seconds(request.wait_time));
        if request.with_attributes {
            call = call
                .message_system_attribute_names(MessageSystemAttributeName::All)
                .message_attribute_names("All");
        }

        let output = call.send().await.map_err(map_sdk_error)?;
        Ok(output
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(to_raw)
            .collect())
    }

    async fn approximate_count(&self, queue: &QueueRef) -> Option<u64> {
        let result = self
            .client
            .get_queue_attributes()
            .queue_url(queue.url())
            .attribute_names(QueueAttributeName::ApproximateNumberOfMessages)
            .send()
            .await;

        match result {
            Ok(output) => output
                .attributes
                .unwrap_or_default()
                .get(&QueueAttributeName::ApproximateNumberOfMessages)
                .and_then(|v| v.parse().ok()),
            Err(e) => {
                warn!(queue = %queue, error = %map_sdk_error(e), "Approximate count unavailable");
                None
            }
        }
    }

    async fn delete_by_handle(
        &self,
        queue: &QueueRef,
        receipt_handle: &str,
    ) -> Result<(), TransportError> {
        self.client
            .delete_message()
            .queue_url(queue.url())
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(map_sdk_error)?;
        Ok(())
    }

    async fn list_queues(&self, prefix: Option<&str>) -> Result<Vec<String>, TransportError> {
        let mut queues = Vec::new();
        let mut next_token = None;

        loop {
            let output = self
                .client
                .list_queues()
                .set_queue_name_prefix(prefix.map(str::to_string))
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(map_sdk_error)?;

            queues.extend(output.queue_urls.unwrap_or_default());
            match output.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        Ok(queues)
    }

    async fn create_queue(&self, name: &str) -> Result<String, TransportError> {
        let mut call = self.client.create_queue().queue_name(name);
        if name.ends_with(".fifo") {
            call = call.attributes(QueueAttributeName::FifoQueue, "true");
        }

        let output = call.send().await.map_err(map_sdk_error)?;
        let url = output
            .queue_url
            .ok_or_else(|| TransportError::Service("CreateQueue returned no queue URL".to_string()))?;

        info!(name = %name, url = %url, "Created queue");
        Ok(url)
    }

    async fn delete_queue(&self, queue: &QueueRef) -> Result<(), TransportError> {
        self.client
            .delete_queue()
            .queue_url(queue.url())
            .send()
            .await
            .map_err(map_sdk_error)?;

        info!(queue = %queue, "Deleted queue");
        Ok(())
    }

    async fn queue_attributes(
        &self,
        queue: &QueueRef,
    ) -> Result<BTreeMap<String, String>, TransportError> {
        let output = self
            .client
            .get_queue_attributes()
            .queue_url(queue.url())
            .attribute_names(QueueAttributeName::All)
            .send()
            .await
            .map_err(map_sdk_error)?;

        Ok(output
            .attributes
            .unwrap_or_default()
            .into_iter()
            .map(|(name, value)| (name.as_str().to_string(), value))
            .collect())
    }

    async fn send_message(&self, queue: &QueueRef, body: &str) -> Result<String, TransportError> {
        let mut call = self
            .client
            .send_message()
            .queue_url(queue.url())
            .message_body(body);
        if queue.is_fifo() {
            call = call
                .message_group_id(FIFO_MESSAGE_GROUP)
                .message_deduplication_id(uuid::Uuid::new_v4().to_string());
        }

        let output = call.send().await.map_err(map_sdk_error)?;
        output
            .message_id
            .ok_or_else(|| TransportError::Service("SendMessage returned no message id".to_string()))
    }
}
