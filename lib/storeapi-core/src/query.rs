use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::{Map, Value};

use crate::ApiError;

/// Characters escaped in query keys and values: everything but `A-Za-z0-9-_.~`.
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn encode(value: &str) -> String {
    utf8_percent_encode(value, QUERY_COMPONENT).to_string()
}

fn scalar(value: &Value) -> Result<Option<String>, ApiError> {
    let rendered = match value {
        Value::Null => return Ok(None),
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Array(_) | Value::Object(_) => {
            return Err(ApiError::UnsupportedQueryParameterValue {
                value: value.clone(),
            });
        }
    };
    Ok(Some(rendered))
}

/// Serializes query parameters using the comma array format.
///
/// - keys are sorted
/// - arrays become one comma-joined value (`ids=1,2,3`), each element encoded on its own
/// - `null` array elements are dropped, arrays left empty are skipped
/// - a `null` value renders the bare key
/// - nested objects are rejected
///
/// The result has no leading `?` and is empty when there is nothing to send.
///
/// # Errors
///
/// Returns [`ApiError::UnsupportedQueryParameterValue`] for nested objects.
///
/// # Example
///
/// ```rust
/// use storeapi_core::to_query_string;
/// use serde_json::json;
///
/// let query = json!({"ids": [1, 2, 3], "name": "a b"}).as_object().cloned().unwrap_or_default();
/// assert_eq!(to_query_string(&query)?, "ids=1,2,3&name=a%20b");
/// # Ok::<(), storeapi_core::ApiError>(())
/// ```
pub fn to_query_string(query: &Map<String, Value>) -> Result<String, ApiError> {
    let mut keys = query.keys().collect::<Vec<_>>();
    keys.sort();

    let mut pairs = Vec::with_capacity(keys.len());
    for key in keys {
        let Some(value) = query.get(key) else {
            continue;
        };
        let key = encode(key);
        match value {
            Value::Array(items) => {
                let mut rendered = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(item) = scalar(item)? {
                        rendered.push(encode(&item));
                    }
                }
                if !rendered.is_empty() {
                    pairs.push(format!("{key}={}", rendered.join(",")));
                }
            }
            other => match scalar(other)? {
                Some(item) => pairs.push(format!("{key}={}", encode(&item))),
                None => pairs.push(key),
            },
        }
    }

    Ok(pairs.join("&"))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    #[case(json!({}), "")]
    #[case(json!({"ids": [1, 2, 3]}), "ids=1,2,3")]
    #[case(json!({"include_fields": ["sku", "name"]}), "include_fields=sku,name")]
    #[case(json!({"page": 2, "limit": 50}), "limit=50&page=2")]
    #[case(json!({"is_visible": true}), "is_visible=true")]
    #[case(json!({"keyword": "red shoes&more"}), "keyword=red%20shoes%26more")]
    #[case(json!({"names": ["a,b", "c d"]}), "names=a%2Cb,c%20d")]
    #[case(json!({"empty": [], "x": 1}), "x=1")]
    #[case(json!({"flag": null}), "flag")]
    #[case(json!({"ids": [1, null, 2]}), "ids=1,2")]
    #[case(json!({"ids": [null], "x": 1}), "x=1")]
    #[case(json!({"name:in": "x"}), "name%3Ain=x")]
    fn should_serialize_query(#[case] query: Value, #[case] expected: &str) {
        let query = query.as_object().cloned().unwrap_or_default();

        let result = to_query_string(&query).expect("serializable");

        assert_eq!(result, expected);
    }

    #[test]
    fn should_not_repeat_array_keys() {
        let query = json!({"ids": [1, 2, 3]}).as_object().cloned().unwrap_or_default();

        let result = to_query_string(&query).expect("serializable");

        assert_ne!(result, "ids=1&ids=2&ids=3");
        assert_eq!(result, "ids=1,2,3");
    }

    #[rstest]
    #[case(json!({"filter": {"a": 1}}))]
    #[case(json!({"ids": [[1, 2]]}))]
    fn should_reject_nested_values(#[case] query: Value) {
        let query = query.as_object().cloned().unwrap_or_default();

        let result = to_query_string(&query);

        assert!(matches!(
            result,
            Err(ApiError::UnsupportedQueryParameterValue { .. })
        ));
    }
}
