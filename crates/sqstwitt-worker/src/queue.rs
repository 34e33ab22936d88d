//! Amazon SQS adapter for [`MessageQueue`].

use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::types::MessageSystemAttributeName;
use aws_sdk_sqs::Client;
use sqstwitt_core::{AppConfig, RawMessage};
use thiserror::Error;

use crate::ports::MessageQueue;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("could not resolve queue {queue}: {reason}")]
    Resolve { queue: String, reason: String },

    #[error("failed to receive messages: {0}")]
    Receive(String),

    #[error("failed to delete message: {0}")]
    Delete(String),

    #[error("failed to forward message to dead-letter queue: {0}")]
    DeadLetter(String),
}

/// SQS queue handle: the work queue plus an optional dead-letter queue.
#[derive(Debug, Clone)]
pub struct SqsQueue {
    client: Client,
    queue_url: String,
    dead_letter_url: Option<String>,
}

impl SqsQueue {
    /// Builds an SQS client for the configured region and resolves the queue
    /// URLs, creating the queues if they do not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Resolve`] if either queue cannot be created or
    /// looked up. Callers treat this as fatal.
    pub async fn connect(config: &AppConfig) -> Result<Self, QueueError> {
        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.aws_region.clone()))
            .load()
            .await;

        // LocalStack / local development endpoint.
        let client = if let Some(endpoint) = &config.sqs_endpoint_url {
            let sqs_config = aws_sdk_sqs::config::Builder::from(&aws_config)
                .endpoint_url(endpoint)
                .build();
            Client::from_conf(sqs_config)
        } else {
            Client::new(&aws_config)
        };

        let queue_url = resolve_queue_url(&client, &config.queue_name).await?;
        let dead_letter_url = match &config.dead_letter_queue_name {
            Some(name) => Some(resolve_queue_url(&client, name).await?),
            None => None,
        };

        tracing::info!(
            queue_url = %queue_url,
            dead_letter_url = dead_letter_url.as_deref().unwrap_or("none"),
            "resolved SQS queues"
        );

        Ok(Self {
            client,
            queue_url,
            dead_letter_url,
        })
    }

    #[must_use]
    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

/// `CreateQueue` is idempotent for an existing queue with matching
/// attributes and returns its URL, so it doubles as a lookup.
async fn resolve_queue_url(client: &Client, name: &str) -> Result<String, QueueError> {
    let output = client
        .create_queue()
        .queue_name(name)
        .send()
        .await
        .map_err(|e| QueueError::Resolve {
            queue: name.to_string(),
            reason: DisplayErrorContext(&e).to_string(),
        })?;

    output
        .queue_url()
        .map(ToOwned::to_owned)
        .ok_or_else(|| QueueError::Resolve {
            queue: name.to_string(),
            reason: "CreateQueue returned no queue URL".to_string(),
        })
}

impl MessageQueue for SqsQueue {
    type Error = QueueError;

    async fn receive(
        &self,
        max_messages: i32,
        wait_secs: i32,
    ) -> Result<Vec<RawMessage>, QueueError> {
        let response = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages)
            .wait_time_seconds(wait_secs)
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount)
            .send()
            .await
            .map_err(|e| QueueError::Receive(DisplayErrorContext(&e).to_string()))?;

        let messages = response
            .messages()
            .iter()
            .filter_map(|msg| {
                let Some(receipt_handle) = msg.receipt_handle() else {
                    tracing::warn!(
                        message_id = msg.message_id().unwrap_or("unknown"),
                        "received message without a receipt handle; skipping"
                    );
                    return None;
                };
                let receive_count = msg
                    .attributes()
                    .and_then(|attrs| attrs.get(&MessageSystemAttributeName::ApproximateReceiveCount))
                    .and_then(|raw| raw.parse::<u32>().ok())
                    .unwrap_or(1);
                Some(RawMessage {
                    message_id: msg.message_id().unwrap_or_default().to_string(),
                    receipt_handle: receipt_handle.to_string(),
                    body: msg.body().unwrap_or_default().to_string(),
                    receive_count,
                })
            })
            .collect();

        Ok(messages)
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::Delete(DisplayErrorContext(&e).to_string()))?;

        tracing::debug!("deleted message");
        Ok(())
    }

    async fn dead_letter(&self, message: &RawMessage) -> Result<bool, QueueError> {
        let Some(dead_letter_url) = &self.dead_letter_url else {
            return Ok(false);
        };

        self.client
            .send_message()
            .queue_url(dead_letter_url)
            .message_body(&message.body)
            .send()
            .await
            .map_err(|e| QueueError::DeadLetter(DisplayErrorContext(&e).to_string()))?;

        Ok(true)
    }
}
