//! Queue payload types: the raw delivery, the parsed tweet, and the
//! enriched record handed to the store.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Field holding the tweet text. Required on every message.
pub const TEXT_FIELD: &str = "text";
/// Field the classification result is merged into.
pub const SENTIMENT_FIELD: &str = "sentiment";
/// Upstream identity field; the store assigns its own key, so this is dropped.
pub const ID_FIELD: &str = "id";

/// One delivery of a queue message.
///
/// `receipt_handle` identifies this delivery attempt for acknowledgment only;
/// it carries no business identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
    /// How many times the queue has handed this message out, this delivery included.
    pub receive_count: u32,
}

#[derive(Debug, Error)]
pub enum PostError {
    #[error("message body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("message body is not a JSON object")]
    NotAnObject,

    #[error("message body has no `text` field")]
    MissingText,

    #[error("`text` field is not a string")]
    TextNotString,

    #[error("`text` field is empty")]
    EmptyText,
}

/// A decoded tweet with a validated, non-empty `text` field.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPost {
    text: String,
    fields: Map<String, Value>,
}

impl ParsedPost {
    /// Decode a message body.
    ///
    /// # Errors
    ///
    /// Returns [`PostError`] if the body is not a JSON object or lacks a
    /// non-empty string `text` field.
    pub fn parse(body: &str) -> Result<Self, PostError> {
        let Value::Object(fields) = serde_json::from_str::<Value>(body)? else {
            return Err(PostError::NotAnObject);
        };

        let text = match fields.get(TEXT_FIELD) {
            None | Some(Value::Null) => return Err(PostError::MissingText),
            Some(Value::String(s)) if s.is_empty() => return Err(PostError::EmptyText),
            Some(Value::String(s)) => s.clone(),
            Some(_) => return Err(PostError::TextNotString),
        };

        Ok(Self { text, fields })
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Merge `sentiment` into the post and strip the upstream `id`.
    ///
    /// Any `sentiment` already present on the incoming tweet is replaced.
    #[must_use]
    pub fn enrich(self, sentiment: Value) -> EnrichedRecord {
        let mut fields = self.fields;
        fields.insert(SENTIMENT_FIELD.to_string(), sentiment);
        fields.remove(ID_FIELD);
        EnrichedRecord { fields }
    }
}

/// A tweet ready for persistence. Serializes as a flat JSON object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EnrichedRecord {
    fields: Map<String, Value>,
}

impl EnrichedRecord {
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.fields.get(TEXT_FIELD).and_then(Value::as_str)
    }

    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parse_accepts_object_with_text() {
        let post = ParsedPost::parse(r#"{"text":"I love this!","id":"abc"}"#).unwrap();
        assert_eq!(post.text(), "I love this!");
        assert_eq!(post.get("id"), Some(&json!("abc")));
    }

    #[test]
    fn parse_rejects_invalid_json() {
        let err = ParsedPost::parse("not-json").unwrap_err();
        assert!(matches!(err, PostError::InvalidJson(_)), "got {err:?}");
    }

    #[test]
    fn parse_rejects_non_object() {
        let err = ParsedPost::parse(r#"["text"]"#).unwrap_err();
        assert!(matches!(err, PostError::NotAnObject), "got {err:?}");
    }

    #[test]
    fn parse_rejects_missing_text() {
        let err = ParsedPost::parse(r#"{"id":"abc"}"#).unwrap_err();
        assert!(matches!(err, PostError::MissingText), "got {err:?}");

        let err = ParsedPost::parse(r#"{"text":null}"#).unwrap_err();
        assert!(matches!(err, PostError::MissingText), "got {err:?}");
    }

    #[test]
    fn parse_rejects_non_string_text() {
        let err = ParsedPost::parse(r#"{"text":42}"#).unwrap_err();
        assert!(matches!(err, PostError::TextNotString), "got {err:?}");
    }

    #[test]
    fn parse_rejects_empty_text() {
        let err = ParsedPost::parse(r#"{"text":""}"#).unwrap_err();
        assert!(matches!(err, PostError::EmptyText), "got {err:?}");
    }

    #[test]
    fn parse_accepts_whitespace_only_text() {
        let post = ParsedPost::parse(r#"{"text":"   "}"#).unwrap();
        assert_eq!(post.text(), "   ");
    }

    #[test]
    fn enrich_sets_sentiment_and_strips_id() {
        let post = ParsedPost::parse(r#"{"text":"I love this!","id":"abc"}"#).unwrap();
        let sentiment = json!({"results":[{"label":"positive","score":0.9}]});

        let record = post.enrich(sentiment);

        assert_eq!(
            record.into_value(),
            json!({
                "text": "I love this!",
                "sentiment": {"results":[{"label":"positive","score":0.9}]}
            })
        );
    }

    #[test]
    fn enrich_keeps_other_fields_and_overwrites_existing_sentiment() {
        let post = ParsedPost::parse(
            r#"{"text":"meh","id_str":"123","geo":null,"sentiment":"stale"}"#,
        )
        .unwrap();

        let record = post.enrich(json!({"label":"neutral"}));

        assert_eq!(record.get("id_str"), Some(&json!("123")));
        assert_eq!(record.get("geo"), Some(&Value::Null));
        assert_eq!(record.get(SENTIMENT_FIELD), Some(&json!({"label":"neutral"})));
        assert_eq!(record.text(), Some("meh"));
    }

    #[test]
    fn enriched_record_serializes_as_flat_object() {
        let record = ParsedPost::parse(r#"{"text":"hi"}"#)
            .unwrap()
            .enrich(json!([]));
        let encoded = serde_json::to_value(&record).unwrap();
        assert_eq!(encoded, json!({"text":"hi","sentiment":[]}));
    }
}
