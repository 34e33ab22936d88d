//! Splitting a multi-input classifier response into per-input values.

use serde_json::{Map, Value};

use crate::error::SentimentError;

/// Envelope keys that may carry the per-input result array, in lookup order.
const RESULT_KEYS: &[&str] = &["result", "results"];

/// Splits `body` into `expected` single-input responses.
///
/// The classifier answers `{"result": [r0, r1, ...], ...}` with one entry per
/// submitted text, in submission order. Each returned value is the same
/// envelope with the array narrowed to `[r_i]`, matching the shape of a
/// one-text request.
pub(crate) fn split_batch_response(
    body: Value,
    expected: usize,
) -> Result<Vec<Value>, SentimentError> {
    let Value::Object(mut envelope) = body else {
        return Err(SentimentError::BatchShape(
            "response is not a JSON object".to_string(),
        ));
    };

    let key = RESULT_KEYS
        .iter()
        .copied()
        .find(|k| envelope.get(*k).is_some_and(Value::is_array))
        .ok_or_else(|| {
            SentimentError::BatchShape(format!(
                "response has no result array (looked for {})",
                RESULT_KEYS.join(", ")
            ))
        })?;

    let results = match envelope.remove(key) {
        Some(Value::Array(items)) => items,
        _ => {
            return Err(SentimentError::BatchShape(format!(
                "`{key}` is not an array"
            )))
        }
    };

    if results.len() != expected {
        return Err(SentimentError::BatchShape(format!(
            "classifier returned {} results for {expected} inputs",
            results.len()
        )));
    }

    Ok(results
        .into_iter()
        .map(|item| {
            let mut single: Map<String, Value> = envelope.clone();
            single.insert(key.to_string(), Value::Array(vec![item]));
            Value::Object(single)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn splits_in_input_order() {
        let body = json!({
            "result": [
                [{"label": "positive", "probability": 0.9}],
                [{"label": "negative", "probability": 0.8}]
            ]
        });

        let parts = split_batch_response(body, 2).unwrap();

        assert_eq!(
            parts,
            vec![
                json!({"result": [[{"label": "positive", "probability": 0.9}]]}),
                json!({"result": [[{"label": "negative", "probability": 0.8}]]}),
            ]
        );
    }

    #[test]
    fn keeps_sibling_envelope_fields() {
        let body = json!({"results": [{"label": "a"}, {"label": "b"}], "model": "m1"});
        let parts = split_batch_response(body, 2).unwrap();
        assert_eq!(parts[1], json!({"results": [{"label": "b"}], "model": "m1"}));
    }

    #[test]
    fn count_mismatch_is_an_error() {
        let body = json!({"result": [{"label": "a"}]});
        let err = split_batch_response(body, 2).unwrap_err();
        assert!(matches!(err, SentimentError::BatchShape(_)), "got {err:?}");
    }

    #[test]
    fn missing_result_array_is_an_error() {
        let err = split_batch_response(json!({"result": "oops"}), 1).unwrap_err();
        assert!(matches!(err, SentimentError::BatchShape(_)), "got {err:?}");

        let err = split_batch_response(json!([1, 2]), 2).unwrap_err();
        assert!(matches!(err, SentimentError::BatchShape(_)), "got {err:?}");
    }
}
