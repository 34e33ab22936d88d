//! Per-message processing: parse, classify, enrich, persist, acknowledge.
//!
//! Every failure leaves the message unacknowledged unless it is handed to the
//! dead-letter queue, so the queue's redelivery is the retry mechanism.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde_json::Value;
use sqstwitt_core::{ParsedPost, PostError, RawMessage};
use thiserror::Error;
use tokio::time::timeout;

use crate::ports::{MessageQueue, SentimentClassifier, TweetRepository};

#[derive(Debug, Clone, Copy)]
pub struct HandlerSettings {
    /// Deadline for each classifier and repository call.
    pub call_timeout: Duration,
    /// Delete messages after a successful insert.
    pub ack_enabled: bool,
    /// Receive count at which a failing message is dead-lettered.
    pub max_receive_count: u32,
}

impl HandlerSettings {
    #[must_use]
    pub fn from_app_config(config: &sqstwitt_core::AppConfig) -> Self {
        Self {
            call_timeout: Duration::from_secs(config.call_timeout_secs),
            ack_enabled: config.ack_enabled,
            max_receive_count: config.max_receive_count,
        }
    }
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("unparseable message: {0}")]
    Parse(#[from] PostError),

    #[error("classification failed: {0}")]
    Classify(String),

    #[error("classification timed out after {0:?}")]
    ClassifyTimeout(Duration),

    #[error("persistence failed: {0}")]
    Persist(String),

    #[error("persistence timed out after {0:?}")]
    PersistTimeout(Duration),
}

impl HandlerError {
    /// Permanent failures cannot succeed on redelivery.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Parse(_))
    }

    #[must_use]
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Parse(_) => "parse",
            Self::Classify(_) | Self::ClassifyTimeout(_) => "classify",
            Self::Persist(_) | Self::PersistTimeout(_) => "persist",
        }
    }
}

/// What became of one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Stored under `key`; `acknowledged` is false when the delete was
    /// disabled or failed, in which case the message will come back.
    Persisted { key: String, acknowledged: bool },
    /// Transient failure; left on the queue for redelivery.
    Retry,
    /// Permanent failure with nowhere to route it; left on the queue.
    Rejected,
    /// Forwarded to the dead-letter queue. `removed` is false when the
    /// delete from the work queue failed, so the message will come back and
    /// may be forwarded again.
    DeadLettered { removed: bool },
}

/// Processes single messages against shared, read-only collaborators.
///
/// Cloning is cheap; each spawned task gets its own clone.
pub struct MessageHandler<Q, C, R> {
    queue: Arc<Q>,
    classifier: Arc<C>,
    repository: Arc<R>,
    settings: HandlerSettings,
}

impl<Q, C, R> Clone for MessageHandler<Q, C, R> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            classifier: Arc::clone(&self.classifier),
            repository: Arc::clone(&self.repository),
            settings: self.settings,
        }
    }
}

impl<Q, C, R> MessageHandler<Q, C, R>
where
    Q: MessageQueue,
    C: SentimentClassifier,
    R: TweetRepository,
{
    #[must_use]
    pub fn new(
        queue: Arc<Q>,
        classifier: Arc<C>,
        repository: Arc<R>,
        settings: HandlerSettings,
    ) -> Self {
        Self {
            queue,
            classifier,
            repository,
            settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> HandlerSettings {
        self.settings
    }

    /// Runs the full pipeline for one message.
    pub async fn handle(&self, message: RawMessage) -> MessageOutcome {
        let post = match ParsedPost::parse(&message.body) {
            Ok(post) => post,
            Err(e) => return self.settle_failure(&message, &HandlerError::from(e)).await,
        };

        match self.classify(post.text()).await {
            Ok(sentiment) => self.store(message, post, sentiment).await,
            Err(e) => self.settle_failure(&message, &e).await,
        }
    }

    /// Runs the pipeline for a whole batch with a single classifier call.
    ///
    /// At most `concurrency` records are persisted at once. Outcomes are
    /// returned in no particular order. If the batch call fails every
    /// parseable message in it is left for redelivery.
    pub async fn handle_batch(
        &self,
        messages: Vec<RawMessage>,
        concurrency: usize,
    ) -> Vec<MessageOutcome> {
        let mut outcomes = Vec::with_capacity(messages.len());
        let mut parsed = Vec::with_capacity(messages.len());

        for message in messages {
            match ParsedPost::parse(&message.body) {
                Ok(post) => parsed.push((message, post)),
                Err(e) => {
                    outcomes.push(self.settle_failure(&message, &HandlerError::from(e)).await);
                }
            }
        }

        if parsed.is_empty() {
            return outcomes;
        }

        let classified = {
            let texts: Vec<&str> = parsed.iter().map(|(_, post)| post.text()).collect();
            self.classify_many(&texts).await
        };

        match classified {
            Ok(sentiments) => {
                let pending: Vec<_> = parsed
                    .into_iter()
                    .zip(sentiments)
                    .map(|((message, post), sentiment)| self.store(message, post, sentiment))
                    .collect();
                let stored: Vec<MessageOutcome> = stream::iter(pending)
                    .buffer_unordered(concurrency.max(1))
                    .collect()
                    .await;
                outcomes.extend(stored);
            }
            Err(e) => {
                for (message, _) in &parsed {
                    outcomes.push(self.settle_failure(message, &e).await);
                }
            }
        }

        outcomes
    }

    async fn classify(&self, text: &str) -> Result<Value, HandlerError> {
        match timeout(self.settings.call_timeout, self.classifier.classify(text)).await {
            Ok(Ok(sentiment)) => Ok(sentiment),
            Ok(Err(e)) => Err(HandlerError::Classify(e.to_string())),
            Err(_) => Err(HandlerError::ClassifyTimeout(self.settings.call_timeout)),
        }
    }

    async fn classify_many(&self, texts: &[&str]) -> Result<Vec<Value>, HandlerError> {
        let sentiments =
            match timeout(self.settings.call_timeout, self.classifier.classify_batch(texts)).await {
                Ok(Ok(sentiments)) => sentiments,
                Ok(Err(e)) => return Err(HandlerError::Classify(e.to_string())),
                Err(_) => return Err(HandlerError::ClassifyTimeout(self.settings.call_timeout)),
            };

        if sentiments.len() != texts.len() {
            return Err(HandlerError::Classify(format!(
                "classifier returned {} results for {} texts",
                sentiments.len(),
                texts.len()
            )));
        }
        Ok(sentiments)
    }

    async fn store(&self, message: RawMessage, post: ParsedPost, sentiment: Value) -> MessageOutcome {
        let record = post.enrich(sentiment);

        let inserted = match timeout(self.settings.call_timeout, self.repository.insert(&record)).await
        {
            Ok(Ok(key)) => Ok(key),
            Ok(Err(e)) => Err(HandlerError::Persist(e.to_string())),
            Err(_) => Err(HandlerError::PersistTimeout(self.settings.call_timeout)),
        };

        match inserted {
            Ok(key) => {
                tracing::info!(message_id = %message.message_id, key = %key, "saved tweet");
                let acknowledged = self.acknowledge(&message).await;
                MessageOutcome::Persisted { key, acknowledged }
            }
            Err(e) => self.settle_failure(&message, &e).await,
        }
    }

    async fn acknowledge(&self, message: &RawMessage) -> bool {
        if !self.settings.ack_enabled {
            tracing::debug!(
                message_id = %message.message_id,
                "acknowledgment disabled; message will be redelivered"
            );
            return false;
        }

        match self.queue.delete(&message.receipt_handle).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    message_id = %message.message_id,
                    error = %e,
                    "failed to delete processed message; it will be redelivered"
                );
                false
            }
        }
    }

    /// Logs a failure and decides whether the message stays, or goes to the
    /// dead-letter queue.
    async fn settle_failure(&self, message: &RawMessage, error: &HandlerError) -> MessageOutcome {
        let permanent = error.is_permanent();
        let left_on_queue = if permanent {
            MessageOutcome::Rejected
        } else {
            MessageOutcome::Retry
        };

        if permanent {
            tracing::error!(
                message_id = %message.message_id,
                stage = error.stage(),
                error = %error,
                "rejecting unprocessable message"
            );
        } else {
            tracing::warn!(
                message_id = %message.message_id,
                receive_count = message.receive_count,
                stage = error.stage(),
                error = %error,
                "message processing failed; leaving it for redelivery"
            );
        }

        if !self.settings.ack_enabled {
            return left_on_queue;
        }

        let exhausted = message.receive_count >= self.settings.max_receive_count;
        if !permanent && !exhausted {
            return left_on_queue;
        }

        match self.queue.dead_letter(message).await {
            Ok(true) => {
                let removed = match self.queue.delete(&message.receipt_handle).await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(
                            message_id = %message.message_id,
                            error = %e,
                            "dead-lettered message could not be deleted; it may be dead-lettered twice"
                        );
                        false
                    }
                };
                tracing::warn!(
                    message_id = %message.message_id,
                    receive_count = message.receive_count,
                    removed,
                    "forwarded message to dead-letter queue"
                );
                MessageOutcome::DeadLettered { removed }
            }
            Ok(false) => {
                if exhausted && !permanent {
                    tracing::warn!(
                        message_id = %message.message_id,
                        receive_count = message.receive_count,
                        "receive limit reached and no dead-letter queue configured"
                    );
                }
                left_on_queue
            }
            Err(e) => {
                tracing::error!(
                    message_id = %message.message_id,
                    error = %e,
                    "failed to forward message to dead-letter queue"
                );
                left_on_queue
            }
        }
    }
}
