//! Queue worker: drains the tweets queue, classifies each tweet's sentiment,
//! and stores the enriched tweet.
//!
//! The pipeline is written against the traits in [`ports`] so the SQS queue,
//! the HTTP classifier, and the Postgres repository can be swapped for
//! in-memory doubles in tests.

pub mod handler;
pub mod poll;
pub mod ports;
pub mod queue;

pub use handler::{HandlerError, HandlerSettings, MessageHandler, MessageOutcome};
pub use poll::{PollLoop, PollSettings, PollStats};
pub use ports::{MessageQueue, SentimentClassifier, TweetRepository};
pub use queue::{QueueError, SqsQueue};
