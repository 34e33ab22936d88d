//! Sentiment classification client for sqstwitt.
//!
//! Posts tweet text to a remote text-classification endpoint
//! (`{"text_list": [...]}` request shape) and returns the classifier's JSON
//! response untouched, so callers can store it verbatim.

pub mod client;
pub mod error;

mod batch;

pub use client::ClassifierClient;
pub use error::SentimentError;
