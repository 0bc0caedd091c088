use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::{Map, Value};

use crate::ApiError;

/// Characters escaped in a path segment: everything but `A-Za-z0-9-_.!~*'()`.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub(crate) fn encode_path_param_value(value: &str) -> String {
    utf8_percent_encode(value, PATH_SEGMENT).to_string()
}

/// Returns the placeholder name when the whole segment is `{name}`.
pub(crate) fn placeholder_name(segment: &str) -> Option<&str> {
    segment
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .filter(|name| !name.is_empty())
}

/// Renders a path parameter value, `None` when it counts as missing.
fn path_value(value: &Value) -> Result<Option<String>, ApiError> {
    let rendered = match value {
        Value::Null => return Ok(None),
        Value::String(text) if text.is_empty() => return Ok(None),
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Array(_) | Value::Object(_) => {
            return Err(ApiError::UnsupportedParameterValue {
                message: "path parameters must be scalar".to_string(),
                value: value.clone(),
            });
        }
    };
    Ok(Some(rendered))
}

/// Resolves a templated path.
///
/// Every segment that is exactly `{name}` is replaced by the URI-encoded value of
/// `path_params[name]`; other segments are kept verbatim and in order.
///
/// # Errors
///
/// Returns [`ApiError::MissingParameter`] when a referenced parameter is missing,
/// `null`, or an empty string.
///
/// # Example
///
/// ```rust
/// use storeapi_core::resolve_path;
/// use serde_json::json;
///
/// let params = json!({"id": 123}).as_object().cloned().unwrap_or_default();
/// let path = resolve_path("/products/{id}", &params)?;
/// assert_eq!(path, "/products/123");
/// # Ok::<(), storeapi_core::ApiError>(())
/// ```
pub fn resolve_path(template: &str, path_params: &Map<String, Value>) -> Result<String, ApiError> {
    let segments = template
        .split('/')
        .map(|segment| {
            let Some(name) = placeholder_name(segment) else {
                return Ok(segment.to_string());
            };
            let value = path_params.get(name).map(path_value).transpose()?.flatten();
            let Some(value) = value else {
                return Err(ApiError::MissingParameter {
                    name: name.to_string(),
                    path: template.to_string(),
                });
            };
            Ok(encode_path_param_value(&value))
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    Ok(segments.join("/"))
}
