//! Operation index: the flat mapping from request lines to operation contracts.
//!
//! An [`OperationIndex`] is derived once from a parsed OpenAPI (3.x) or Swagger (2.0)
//! document, see [`derive_operation_index`], and never mutated afterwards.
//! Dispatch clients use it to validate parameters before any I/O and to
//! describe the response union of an operation.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::params::Parameters;
use crate::request_line::{RequestLine, RequestMethod};
use crate::{ApiError, IndexError};

mod derive;
pub use self::derive::derive_operation_index;

mod load;
pub use self::load::{ApiGroup, load_directory, load_document};

mod sniff;
pub use self::sniff::missing_data_envelope;

/// Status codes treated as non-error outcomes.
pub const SUCCESS_STATUSES: [u16; 3] = [200, 201, 204];

/// A declared path, query or header parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    /// Parameter name.
    pub name: String,
    /// Whether the caller must supply it.
    pub required: bool,
    /// JSON schema of the value.
    pub schema: Value,
}

/// A declared JSON request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BodySpec {
    /// Whether the caller must supply it.
    pub required: bool,
    /// JSON schema of the body.
    pub schema: Value,
}

/// The parameter slots of an operation.
///
/// `body` is only present when the document declares an `application/json`
/// request body; it is omitted entirely otherwise, not serialized as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParameterSlots {
    /// Path parameters, in template order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<ParamSpec>,
    /// Query parameters.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub query: Vec<ParamSpec>,
    /// Custom headers, without `Accept` and `Content-Type`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub header: Vec<ParamSpec>,
    /// The JSON request body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<BodySpec>,
}

/// The status key of a response variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResponseStatus {
    /// A numeric status such as `200`.
    Code(u16),
    /// The `default` response.
    Default,
    /// Any other key, e.g. `2XX`.
    Pattern(String),
}

impl ResponseStatus {
    /// Parses a response key from the document.
    pub fn parse(key: &str) -> Self {
        if key == "default" {
            return Self::Default;
        }
        key.parse::<u16>()
            .map_or_else(|_| Self::Pattern(key.to_string()), Self::Code)
    }

    /// The numeric status, if any.
    pub fn code(&self) -> Option<u16> {
        match self {
            Self::Code(code) => Some(*code),
            Self::Default | Self::Pattern(_) => None,
        }
    }

    /// Whether this status is one of [`SUCCESS_STATUSES`].
    pub fn is_success(&self) -> bool {
        self.code().is_some_and(|code| SUCCESS_STATUSES.contains(&code))
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "{code}"),
            Self::Default => f.write_str("default"),
            Self::Pattern(pattern) => f.write_str(pattern),
        }
    }
}

impl Serialize for ResponseStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Code(code) => serializer.serialize_u16(*code),
            Self::Default | Self::Pattern(_) => serializer.collect_str(self),
        }
    }
}

/// One `{status, body}` member of a response union.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseVariant {
    /// The declared status.
    pub status: ResponseStatus,
    /// The `application/json` schema, absent for responses without JSON content (e.g. 204).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl ResponseVariant {
    /// Whether the status is a success status.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Parameters and response union of one operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OperationContract {
    /// The parameter slots.
    pub parameters: ParameterSlots,
    /// One variant per declared status code.
    pub response: Vec<ResponseVariant>,
}

impl OperationContract {
    /// Success variants only.
    pub fn success_responses(&self) -> impl Iterator<Item = &ResponseVariant> {
        self.response.iter().filter(|variant| variant.is_success())
    }

    /// Whether the operation can be called without any parameter.
    pub fn requires_params(&self) -> bool {
        !self.parameters.path.is_empty()
            || self.parameters.body.as_ref().is_some_and(|body| body.required)
            || self.parameters.header.iter().any(|header| header.required)
    }

    /// Whether a success body is a `{ data: [...] }` collection.
    pub fn returns_collection(&self) -> bool {
        self.success_responses()
            .filter_map(|variant| variant.body.as_ref())
            .filter_map(|body| schema_property(body, "data"))
            .any(is_array_schema)
    }

    /// Checks caller parameters against this contract.
    ///
    /// # Errors
    ///
    /// - [`ApiError::MissingParameter`] for a missing path parameter
    /// - [`ApiError::InvalidParameters`] for an unexpected or missing body,
    ///   or a missing required header
    pub fn validate(&self, request_line: &RequestLine, params: &Parameters) -> Result<(), ApiError> {
        for spec in &self.parameters.path {
            let supplied = params
                .path
                .as_ref()
                .and_then(|path| path.get(&spec.name))
                .is_some_and(|value| !value.is_null() && value.as_str() != Some(""));
            if !supplied {
                return Err(ApiError::MissingParameter {
                    name: spec.name.clone(),
                    path: request_line.path().to_string(),
                });
            }
        }

        let invalid = |reason: String| ApiError::InvalidParameters {
            request_line: request_line.clone(),
            reason,
        };

        match (&self.parameters.body, params.present_body()) {
            (None, Some(_)) => {
                return Err(invalid("the operation accepts no request body".to_string()));
            }
            (Some(body), None) if body.required => {
                return Err(invalid("a request body is required".to_string()));
            }
            _ => {}
        }

        if let Some(header) = self
            .parameters
            .header
            .iter()
            .find(|header| header.required && params.header_value(&header.name).is_none())
        {
            return Err(invalid(format!("missing required header '{}'", header.name)));
        }

        Ok(())
    }
}

/// Looks up a property of an object schema, following `allOf` members.
pub(crate) fn schema_property<'a>(schema: &'a Value, name: &str) -> Option<&'a Value> {
    if let Some(property) = schema.get("properties").and_then(|props| props.get(name)) {
        return Some(property);
    }
    schema
        .get("allOf")
        .and_then(Value::as_array)
        .and_then(|members| members.iter().find_map(|member| schema_property(member, name)))
}

fn is_array_schema(schema: &Value) -> bool {
    schema.get("type").and_then(Value::as_str) == Some("array") || schema.get("items").is_some()
}

/// Mapping from request lines to operation contracts for one API version.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct OperationIndex {
    operations: IndexMap<RequestLine, OperationContract>,
}

impl OperationIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives an index from a parsed OpenAPI or Swagger document.
    ///
    /// # Errors
    ///
    /// See [`derive_operation_index`].
    pub fn from_document(document: &Value) -> Result<Self, IndexError> {
        derive_operation_index(document)
    }

    /// Adds an operation.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::DuplicateRequestLine`] if the request line is already present.
    pub fn insert(
        &mut self,
        request_line: RequestLine,
        contract: OperationContract,
    ) -> Result<(), IndexError> {
        if self.operations.contains_key(&request_line) {
            return Err(IndexError::DuplicateRequestLine { request_line });
        }
        self.operations.insert(request_line, contract);
        Ok(())
    }

    /// Merges another index into this one, e.g. one per resource document.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::DuplicateRequestLine`] on the first collision.
    pub fn merge(&mut self, other: Self) -> Result<(), IndexError> {
        for (request_line, contract) in other.operations {
            self.insert(request_line, contract)?;
        }
        Ok(())
    }

    /// Returns the contract of an operation.
    pub fn get(&self, request_line: &RequestLine) -> Option<&OperationContract> {
        self.operations.get(request_line)
    }

    /// Whether the operation is documented.
    pub fn contains(&self, request_line: &RequestLine) -> bool {
        self.operations.contains_key(request_line)
    }

    /// Iterates over all operations, in derivation order.
    pub fn iter(&self) -> impl Iterator<Item = (&RequestLine, &OperationContract)> {
        self.operations.iter()
    }

    /// All request lines, in derivation order.
    pub fn request_lines(&self) -> impl Iterator<Item = &RequestLine> {
        self.operations.keys()
    }

    /// Request lines of one method that can be called without parameters.
    pub fn no_params_request_lines(
        &self,
        method: RequestMethod,
    ) -> impl Iterator<Item = &RequestLine> {
        self.operations
            .iter()
            .filter(move |(line, contract)| line.method() == method && !contract.requires_params())
            .map(|(line, _)| line)
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the index has no operation.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
