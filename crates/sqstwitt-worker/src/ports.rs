//! Seams between the pipeline and its external collaborators.

use std::fmt::Display;
use std::future::Future;

use serde_json::Value;
use sqstwitt_core::{EnrichedRecord, RawMessage};
use sqstwitt_db::{DbError, PgTweetRepository};
use sqstwitt_sentiment::{ClassifierClient, SentimentError};

/// An at-least-once message queue.
pub trait MessageQueue: Send + Sync + 'static {
    type Error: Display + Send + Sync + 'static;

    /// Long-poll for up to `max_messages` messages, waiting at most `wait_secs`.
    fn receive(
        &self,
        max_messages: i32,
        wait_secs: i32,
    ) -> impl Future<Output = Result<Vec<RawMessage>, Self::Error>> + Send;

    /// Acknowledge one delivery. Deleting an expired or already-deleted
    /// handle is not an error the pipeline distinguishes.
    fn delete(&self, receipt_handle: &str) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Forward the message body to the dead-letter queue.
    ///
    /// Resolves to `Ok(false)` when no dead-letter queue is configured.
    fn dead_letter(
        &self,
        message: &RawMessage,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send;
}

/// Remote sentiment classification.
pub trait SentimentClassifier: Send + Sync + 'static {
    type Error: Display + Send + Sync + 'static;

    fn classify(&self, text: &str) -> impl Future<Output = Result<Value, Self::Error>> + Send;

    /// One result per input, in input order.
    fn classify_batch(
        &self,
        texts: &[&str],
    ) -> impl Future<Output = Result<Vec<Value>, Self::Error>> + Send;
}

/// Document store for enriched tweets.
pub trait TweetRepository: Send + Sync + 'static {
    type Error: Display + Send + Sync + 'static;

    /// Persist one record and return the store-generated key.
    fn insert(
        &self,
        record: &EnrichedRecord,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send;
}

impl SentimentClassifier for ClassifierClient {
    type Error = SentimentError;

    async fn classify(&self, text: &str) -> Result<Value, SentimentError> {
        ClassifierClient::classify(self, text).await
    }

    async fn classify_batch(&self, texts: &[&str]) -> Result<Vec<Value>, SentimentError> {
        ClassifierClient::classify_batch(self, texts).await
    }
}

impl TweetRepository for PgTweetRepository {
    type Error = DbError;

    async fn insert(&self, record: &EnrichedRecord) -> Result<String, DbError> {
        let key = PgTweetRepository::insert(self, record).await?;
        Ok(key.to_string())
    }
}
