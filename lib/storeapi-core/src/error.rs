use std::fmt::Debug;

use crate::request_line::RequestLine;

/// Errors that can occur when calling the store management API.
///
/// Parameter and formatting errors are raised before any network I/O.
/// HTTP-level failures only surface as [`ApiError::RequestFailed`] once the
/// transport retry policy gave up.
#[derive(Debug, derive_more::Error, derive_more::Display, derive_more::From)]
pub enum ApiError {
    /// HTTP client error from the underlying reqwest library.
    ///
    /// Occurs when the connection fails, a timeout occurs, or the body cannot be read.
    /// These are never retried by the default policy.
    Transport(reqwest::Error),

    /// URL parsing error when joining the base URL with the resolved path.
    Url(url::ParseError),

    /// Invalid HTTP header name supplied in the `header` parameters.
    InvalidHeaderName(http::header::InvalidHeaderName),

    /// Invalid HTTP header value supplied in the `header` parameters.
    InvalidHeaderValue(http::header::InvalidHeaderValue),

    /// JSON serialization/deserialization error.
    ///
    /// Occurs when encoding a request body, parsing a response body,
    /// or converting a payload into the caller's type.
    Json(serde_json::Error),

    /// A path placeholder was not supplied, or was `null` or empty.
    #[display("Path param {name} must be specified (in '{path}')")]
    #[from(skip)]
    MissingParameter {
        /// The placeholder name.
        name: String,
        /// The path template.
        path: String,
    },

    /// The request line is not `"<METHOD> <path>"`.
    #[display("Invalid request line: '{line}'")]
    #[from(skip)]
    InvalidRequestLine {
        /// The rejected request line.
        line: String,
    },

    /// The server answered with a status greater than 299.
    #[display("ERROR DURING {request_line}: {status} - {body}")]
    #[from(skip)]
    RequestFailed {
        /// The request line, e.g. `GET /catalog/products`.
        request_line: RequestLine,
        /// The HTTP status code.
        status: u16,
        /// The response body, `null` when the response was empty.
        body: serde_json::Value,
    },

    /// A path parameter value cannot be rendered into a URL segment.
    #[display("Unsupported parameter value: {message}. Got: {value}")]
    #[from(skip)]
    UnsupportedParameterValue {
        /// Why the value was rejected.
        message: String,
        /// The rejected value.
        value: serde_json::Value,
    },

    /// Query parameter value type is not supported.
    #[display(
        "Unsupported query parameter value: objects are not supported for query parameters. Got: {value}"
    )]
    #[from(skip)]
    UnsupportedQueryParameterValue {
        /// The rejected value.
        value: serde_json::Value,
    },

    /// A multipart request carries a JSON body that is not already encoded.
    #[display("Multipart body must be pre-encoded bytes or a string, got: {value}")]
    #[from(skip)]
    UnsupportedMultipartBody {
        /// The rejected body.
        value: serde_json::Value,
    },

    /// Parameters do not satisfy the operation contract.
    #[display("Invalid parameters for {request_line}: {reason}")]
    #[from(skip)]
    InvalidParameters {
        /// The request line being validated.
        request_line: RequestLine,
        /// What is wrong.
        reason: String,
    },

    /// The request line is neither documented nor declared as a custom endpoint.
    #[display("Unknown operation: {request_line}")]
    #[from(skip)]
    UnknownOperation {
        /// The rejected request line.
        request_line: RequestLine,
    },

    /// The operation does not return a `{ data: [...] }` collection.
    #[display("Operation {request_line} cannot be listed")]
    #[from(skip)]
    NotListable {
        /// The rejected request line.
        request_line: RequestLine,
    },
}

impl ApiError {
    /// Returns the HTTP status carried by a [`ApiError::RequestFailed`].
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors raised while loading specification documents or deriving an operation index.
///
/// These are build-time signals: the documents are fixed once generated.
#[derive(Debug, derive_more::Error, derive_more::Display, derive_more::From)]
pub enum IndexError {
    /// Reading a document from disk failed.
    Io(std::io::Error),

    /// A JSON document could not be parsed.
    Json(serde_json::Error),

    /// A YAML document could not be parsed.
    #[display("Invalid YAML in '{path}': {message}")]
    #[from(skip)]
    Yaml {
        /// The document path.
        path: String,
        /// The parser message.
        message: String,
    },

    /// Two path entries produce the same request line.
    #[display("Duplicate request line: {request_line}")]
    #[from(skip)]
    DuplicateRequestLine {
        /// The request line produced twice.
        request_line: RequestLine,
    },

    /// The document does not have the expected OpenAPI structure.
    #[display("Invalid specification: {message}")]
    #[from(skip)]
    InvalidSpec {
        /// What is wrong.
        message: String,
    },
}
