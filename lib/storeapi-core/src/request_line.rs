use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ApiError;

/// HTTP methods supported by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RequestMethod {
    /// `DELETE`
    Delete,
    /// `GET`
    Get,
    /// `PATCH`
    Patch,
    /// `POST`
    Post,
    /// `PUT`
    Put,
}

impl RequestMethod {
    /// All supported methods, in request line order.
    pub const ALL: [Self; 5] = [Self::Delete, Self::Get, Self::Patch, Self::Post, Self::Put];

    /// The uppercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Get => "GET",
            Self::Patch => "PATCH",
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }

    /// Matches the lowercase key used by OpenAPI path items (`get`, `post`, ...).
    ///
    /// Any other key, including uppercase variants, is not an operation.
    pub fn from_spec_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|method| method.as_str().to_ascii_lowercase() == key)
    }
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestMethod {
    type Err = ApiError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|method| method.as_str() == value)
            .ok_or_else(|| ApiError::InvalidRequestLine {
                line: value.to_string(),
            })
    }
}

impl From<RequestMethod> for http::Method {
    fn from(value: RequestMethod) -> Self {
        match value {
            RequestMethod::Delete => Self::DELETE,
            RequestMethod::Get => Self::GET,
            RequestMethod::Patch => Self::PATCH,
            RequestMethod::Post => Self::POST,
            RequestMethod::Put => Self::PUT,
        }
    }
}

/// An API operation identifier, rendered as `"METHOD /path/{param}"`.
///
/// # Example
///
/// ```rust
/// use storeapi_core::{RequestLine, RequestMethod};
///
/// let line: RequestLine = "GET /catalog/products/{product_id}".parse()?;
/// assert_eq!(line.method(), RequestMethod::Get);
/// assert_eq!(line.path(), "/catalog/products/{product_id}");
/// assert_eq!(line.to_string(), "GET /catalog/products/{product_id}");
/// # Ok::<(), storeapi_core::ApiError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestLine {
    method: RequestMethod,
    path: String,
}

impl RequestLine {
    /// Creates a request line from its parts.
    pub fn new(method: RequestMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }

    /// The HTTP method.
    pub fn method(&self) -> RequestMethod {
        self.method
    }

    /// The URL template.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Strips a version prefix from the path, e.g. `/v3` from `GET /v3/foo/bar`.
    ///
    /// Returns `None` unless the path continues with `/` after the prefix.
    pub fn strip_path_prefix(&self, prefix: &str) -> Option<Self> {
        let rest = self.path.strip_prefix(prefix)?;
        rest.starts_with('/').then(|| Self::new(self.method, rest))
    }
}

impl fmt::Display for RequestLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

impl FromStr for RequestLine {
    type Err = ApiError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let invalid = || ApiError::InvalidRequestLine {
            line: line.to_string(),
        };

        let (method, path) = line.split_once(' ').ok_or_else(invalid)?;
        let method = method.parse::<RequestMethod>().map_err(|_| invalid())?;
        if !path.starts_with('/') || path.chars().any(char::is_whitespace) {
            return Err(invalid());
        }

        Ok(Self::new(method, path))
    }
}

impl TryFrom<&str> for RequestLine {
    type Error = ApiError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl Serialize for RequestLine {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RequestLine {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let line = String::deserialize(deserializer)?;
        line.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("GET /store", RequestMethod::Get, "/store")]
    #[case("DELETE /catalog/products", RequestMethod::Delete, "/catalog/products")]
    #[case("PATCH /a/{b}", RequestMethod::Patch, "/a/{b}")]
    #[case("POST /orders", RequestMethod::Post, "/orders")]
    #[case("PUT /catalog/trees/categories", RequestMethod::Put, "/catalog/trees/categories")]
    fn should_parse_request_line(
        #[case] line: &str,
        #[case] method: RequestMethod,
        #[case] path: &str,
    ) {
        let parsed = line.parse::<RequestLine>().expect("valid request line");

        assert_eq!(parsed.method(), method);
        assert_eq!(parsed.path(), path);
        assert_eq!(parsed.to_string(), line);
    }

    #[rstest]
    #[case("")]
    #[case("GET")]
    #[case("GET ")]
    #[case("get /store")]
    #[case("HEAD /store")]
    #[case("GET store")]
    #[case("GET /store extra")]
    #[case(" /store")]
    fn should_reject_invalid_request_line(#[case] line: &str) {
        let result = line.parse::<RequestLine>();

        assert!(
            matches!(result, Err(ApiError::InvalidRequestLine { .. })),
            "{line:?} should be rejected, got {result:?}"
        );
    }

    #[test]
    fn should_only_accept_lowercase_spec_keys() {
        assert_eq!(RequestMethod::from_spec_key("get"), Some(RequestMethod::Get));
        assert_eq!(
            RequestMethod::from_spec_key("delete"),
            Some(RequestMethod::Delete)
        );
        assert_eq!(RequestMethod::from_spec_key("GET"), None);
        assert_eq!(RequestMethod::from_spec_key("head"), None);
        assert_eq!(RequestMethod::from_spec_key("parameters"), None);
    }

    #[test]
    fn should_strip_version_prefix() {
        let line: RequestLine = "GET /v3/foo/bar".parse().expect("valid");

        let stripped = line.strip_path_prefix("/v3");

        assert_eq!(stripped.map(|it| it.to_string()).as_deref(), Some("GET /foo/bar"));
        assert!(line.strip_path_prefix("/v2").is_none());
        assert!(
            "GET /v30/foo"
                .parse::<RequestLine>()
                .expect("valid")
                .strip_path_prefix("/v3")
                .is_none()
        );
    }

    #[test]
    fn should_serialize_as_string() {
        let line = RequestLine::new(RequestMethod::Put, "/catalog/products/{id}");

        let json = serde_json::to_value(&line).expect("serialize");
        assert_eq!(json, serde_json::json!("PUT /catalog/products/{id}"));

        let back: RequestLine = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, line);
    }
}
