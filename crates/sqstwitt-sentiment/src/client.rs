//! HTTP client for the remote text classifier.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::batch::split_batch_response;
use crate::error::SentimentError;

/// Longest response body excerpt carried in [`SentimentError::Status`].
const ERROR_BODY_LIMIT: usize = 512;

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    text_list: &'a [&'a str],
}

/// Client for the classification endpoint.
///
/// Holds one pooled `reqwest::Client`, so a single instance can be shared by
/// every concurrent handler. Requests are never retried here: a failed call
/// is reported to the caller, which leaves the message on the queue for
/// redelivery.
#[derive(Clone)]
pub struct ClassifierClient {
    client: Client,
    url: String,
}

impl std::fmt::Debug for ClassifierClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierClient")
            .field("url", &self.url)
            .field("token", &"[redacted]")
            .finish_non_exhaustive()
    }
}

impl ClassifierClient {
    /// Creates a client for `url`, authenticating every request with
    /// `Authorization: <token>` (the value is sent verbatim, e.g. `Token abc`).
    ///
    /// # Errors
    ///
    /// Returns [`SentimentError::Config`] if the token is not a valid header
    /// value, or [`SentimentError::Http`] if the `reqwest::Client` cannot be
    /// built.
    pub fn new(url: &str, token: &str, timeout_secs: u64) -> Result<Self, SentimentError> {
        let mut auth = HeaderValue::from_str(token)
            .map_err(|e| SentimentError::Config(format!("invalid classifier token: {e}")))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("sqstwitt/0.1 (tweet-sentiment)")
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            url: url.to_owned(),
        })
    }

    /// Classifies one text.
    ///
    /// Returns the full response body as JSON; the caller stores it as-is.
    ///
    /// # Errors
    ///
    /// - [`SentimentError::EmptyText`] if `text` is empty.
    /// - [`SentimentError::Http`] on network failure or timeout.
    /// - [`SentimentError::Status`] on a non-2xx response.
    /// - [`SentimentError::Deserialize`] if the body is not JSON.
    pub async fn classify(&self, text: &str) -> Result<Value, SentimentError> {
        if text.is_empty() {
            return Err(SentimentError::EmptyText);
        }
        self.post(&[text]).await
    }

    /// Classifies several texts in one request.
    ///
    /// Returns one value per input, in input order. Each value has the shape a
    /// single-text [`classify`](Self::classify) call would have returned, so
    /// stored records look the same whether or not batching was used.
    ///
    /// # Errors
    ///
    /// Same as [`classify`](Self::classify), plus
    /// [`SentimentError::BatchShape`] if the response does not carry exactly
    /// one result per input.
    pub async fn classify_batch(&self, texts: &[&str]) -> Result<Vec<Value>, SentimentError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.iter().any(|t| t.is_empty()) {
            return Err(SentimentError::EmptyText);
        }
        let body = self.post(texts).await?;
        split_batch_response(body, texts.len())
    }

    async fn post(&self, texts: &[&str]) -> Result<Value, SentimentError> {
        let request = ClassifyRequest { text_list: texts };
        let response = self.client.post(&self.url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > ERROR_BODY_LIMIT {
                let mut cut = ERROR_BODY_LIMIT;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(SentimentError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        let value = serde_json::from_slice(&bytes).map_err(|e| SentimentError::Deserialize {
            context: format!("classify(batch={})", texts.len()),
            source: e,
        })?;

        tracing::debug!(inputs = texts.len(), "classifier call succeeded");
        Ok(value)
    }
}
