//! Request parameters for an API call.
//!
//! A [`Parameters`] value has up to four independent slots:
//!
//! - `path` - values for the `{placeholder}`s of the URL template
//! - `query` - filters and pagination, serialized with comma-joined arrays
//! - `body` - the request body, JSON or pre-encoded bytes
//! - `header` - custom headers, merged over the headers the runtime manages

use bytes::Bytes;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::ApiError;

/// Request body content.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// A JSON value, serialized before sending (or sent as-is for a multipart string).
    Json(Value),
    /// Pre-encoded bytes, e.g. a `multipart/form-data` payload.
    Bytes(Bytes),
}

impl RequestBody {
    /// Returns `true` when the body should be considered absent.
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Json(Value::Null))
    }
}

/// Parameters of an API call.
///
/// # Example
///
/// ```rust
/// use storeapi_core::Parameters;
///
/// let params = Parameters::new()
///     .with_path("product_id", 42)
///     .with_query("include_fields", vec!["sku", "price"])
///     .with_header("X-Correlation-Id", "abc-123");
/// # Ok::<(), storeapi_core::ApiError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    /// URL path parameters (e.g. `/products/{id}`).
    pub path: Option<Map<String, Value>>,
    /// URL query parameters.
    pub query: Option<Map<String, Value>>,
    /// Request body data.
    pub body: Option<RequestBody>,
    /// Custom HTTP headers.
    pub header: Option<IndexMap<String, String>>,
}

impl Parameters {
    /// Creates empty parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a path parameter.
    pub fn with_path(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.path
            .get_or_insert_with(Map::new)
            .insert(name.into(), value.into());
        self
    }

    /// Adds a query parameter.
    ///
    /// Arrays are sent as a single comma-joined value (`ids=1,2,3`).
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query
            .get_or_insert_with(Map::new)
            .insert(name.into(), value.into());
        self
    }

    /// Replaces the whole query from any serializable structure.
    ///
    /// # Errors
    ///
    /// Fails if the value does not serialize to a JSON object.
    pub fn with_query_from<T: Serialize>(mut self, query: &T) -> Result<Self, ApiError> {
        match serde_json::to_value(query)? {
            Value::Object(map) => {
                self.query = Some(map);
                Ok(self)
            }
            Value::Null => {
                self.query = None;
                Ok(self)
            }
            other => Err(ApiError::UnsupportedQueryParameterValue { value: other }),
        }
    }

    /// Sets a JSON request body.
    pub fn with_json(mut self, body: impl Into<Value>) -> Self {
        self.body = Some(RequestBody::Json(body.into()));
        self
    }

    /// Sets a JSON request body from any serializable value.
    ///
    /// # Errors
    ///
    /// Fails if the value cannot be serialized to JSON.
    pub fn with_json_from<T: Serialize>(self, body: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)?;
        Ok(self.with_json(value))
    }

    /// Sets a pre-encoded request body.
    pub fn with_bytes(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(RequestBody::Bytes(body.into()));
        self
    }

    /// Adds a custom header. Later values override earlier ones with the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.header
            .get_or_insert_with(IndexMap::new)
            .insert(name.into(), value.into());
        self
    }

    /// Returns the body unless it is absent (missing or JSON `null`).
    pub fn present_body(&self) -> Option<&RequestBody> {
        self.body.as_ref().filter(|body| !body.is_absent())
    }

    /// Looks up a header value, ignoring the header name case.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.header.as_ref().and_then(|headers| {
            headers
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str())
        })
    }

    /// Returns `true` when the caller declared a `multipart/form-data` content type.
    pub fn is_multipart(&self) -> bool {
        let multipart = mime::MULTIPART_FORM_DATA.essence_str();
        self.header.as_ref().is_some_and(|headers| {
            headers.iter().any(|(key, value)| {
                key.eq_ignore_ascii_case(http::header::CONTENT_TYPE.as_str())
                    && value.to_ascii_lowercase().contains(multipart)
            })
        })
    }

    /// Returns a copy of these parameters with the `page` query parameter overridden.
    pub(crate) fn with_page(&self, page: u64) -> Self {
        self.clone().with_query("page", page)
    }
}

impl From<()> for Parameters {
    fn from((): ()) -> Self {
        Self::default()
    }
}
