use thiserror::Error;

#[derive(Debug, Error)]
pub enum SentimentError {
    /// Network, TLS, or timeout failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The classifier answered with a non-success status.
    #[error("classifier returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not JSON.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// A batch response did not carry one result per input.
    #[error("unexpected batch response shape: {0}")]
    BatchShape(String),

    #[error("cannot classify empty text")]
    EmptyText,

    #[error("invalid classifier configuration: {0}")]
    Config(String),
}
