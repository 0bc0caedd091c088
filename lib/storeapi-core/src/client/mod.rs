//! Per-version dispatch clients.
//!
//! A [`DispatchClient`] binds a [`Transport`], an optional [`OperationIndex`] and
//! the response narrowing rules of its API version into callable verbs. Each verb
//! has its own status policy:
//!
//! | verb     | `204`  | `404`  | other `> 299` | success          |
//! |----------|--------|--------|---------------|------------------|
//! | `get`    | `None` | `None` | error         | payload          |
//! | `delete` | `None` | error  | error         | payload          |
//! | `post`   | payload| error  | error         | payload          |
//! | `put`    | payload| error  | error         | payload          |
//!
//! `get` short-circuits `204`/`404` before checking the status, `delete` checks the
//! status first. [`DispatchClient::send`] returns the raw [`Response`].
//!
//! The payload is the body itself for v2, and the `data` member of the envelope for v3.

use std::collections::HashSet;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::index::{OperationIndex, ResponseVariant};
use crate::narrowing::NarrowingRules;
use crate::params::Parameters;
use crate::request_line::{RequestLine, RequestMethod};
use crate::transport::{HttpTransport, Response, Transport};
use crate::ApiError;

mod envelope;
pub use self::envelope::{Envelope, Meta, Pagination};

mod list;
pub use self::list::ListStream;

mod root;
pub use self::root::{Client, partition_custom_endpoints};

/// An API generation.
pub trait ApiVersion: Debug + Send + Sync + 'static {
    /// Last segment of the base URL, e.g. `v3`.
    const SEGMENT: &'static str;

    /// Extracts the payload from a response body.
    fn payload(body: Option<Value>) -> Value;

    /// Narrowing rules applied by default.
    fn narrowing() -> NarrowingRules;
}

/// Management API v2: bodies are the payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct V2;

impl ApiVersion for V2 {
    const SEGMENT: &'static str = "v2";

    fn payload(body: Option<Value>) -> Value {
        body.unwrap_or_default()
    }

    fn narrowing() -> NarrowingRules {
        NarrowingRules::v2()
    }
}

/// Management API v3: the payload is wrapped in a `{data, meta}` envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct V3;

impl ApiVersion for V3 {
    const SEGMENT: &'static str = "v3";

    fn payload(body: Option<Value>) -> Value {
        match body {
            Some(Value::Object(mut envelope)) => envelope.remove("data").unwrap_or_default(),
            _ => Value::Null,
        }
    }

    fn narrowing() -> NarrowingRules {
        NarrowingRules::v3()
    }
}

/// The v2 client.
pub type V2Client<T = HttpTransport> = DispatchClient<V2, T>;

/// The v3 client.
pub type V3Client<T = HttpTransport> = DispatchClient<V3, T>;

/// Fails with [`ApiError::RequestFailed`] when the status is greater than 299.
///
/// # Errors
///
/// See above; the error carries the request line, the status and the body (`null` if empty).
pub fn check_response_status(request_line: &RequestLine, response: &Response) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    Err(ApiError::RequestFailed {
        request_line: request_line.clone(),
        status: response.status,
        body: response.body.clone().unwrap_or_default(),
    })
}

/// The client of one API version.
///
/// Without an operation index the client is untyped and sends any request line.
/// With one, parameters of documented operations are validated before any I/O and
/// undocumented request lines are rejected, unless declared as custom endpoints.
///
/// # Example
///
/// ```rust,no_run
/// use serde_json::Value;
/// use storeapi_core::{Config, Parameters, V3Client};
///
/// # async fn example() -> Result<(), storeapi_core::ApiError> {
/// let config = Config::builder("abc123", "my-token").build()?;
/// let client: V3Client = V3Client::from_config(&config)?;
///
/// let product: Option<Value> = client
///     .get("/catalog/products/{product_id}", Parameters::new().with_path("product_id", 42))
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DispatchClient<V: ApiVersion, T = HttpTransport> {
    transport: Arc<T>,
    index: Option<Arc<OperationIndex>>,
    custom_endpoints: Arc<HashSet<RequestLine>>,
    narrowing: Arc<NarrowingRules>,
    version: PhantomData<V>,
}

impl<V: ApiVersion, T> Clone for DispatchClient<V, T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            index: self.index.clone(),
            custom_endpoints: Arc::clone(&self.custom_endpoints),
            narrowing: Arc::clone(&self.narrowing),
            version: PhantomData,
        }
    }
}

impl<V: ApiVersion> DispatchClient<V, HttpTransport> {
    /// Creates an untyped client over HTTP, with the custom endpoints of `config` for this version.
    ///
    /// # Errors
    ///
    /// Fails if the base URL cannot be built.
    pub fn from_config(config: &crate::Config) -> Result<Self, ApiError> {
        let client = Self::new(config.transport::<V>()?)
            .with_custom_endpoints(config.custom_endpoints_for::<V>());
        Ok(client)
    }
}

impl<V: ApiVersion, T: Transport> DispatchClient<V, T> {
    /// Creates an untyped client.
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            index: None,
            custom_endpoints: Arc::default(),
            narrowing: Arc::new(V::narrowing()),
            version: PhantomData,
        }
    }

    /// Validates calls against `index`.
    #[must_use]
    pub fn with_operations(mut self, index: impl Into<Arc<OperationIndex>>) -> Self {
        self.index = Some(index.into());
        self
    }

    /// Allows undocumented request lines.
    #[must_use]
    pub fn with_custom_endpoints(mut self, request_lines: impl IntoIterator<Item = RequestLine>) -> Self {
        let mut custom = self.custom_endpoints.as_ref().clone();
        custom.extend(request_lines);
        self.custom_endpoints = Arc::new(custom);
        self
    }

    /// Replaces the narrowing rules.
    #[must_use]
    pub fn with_narrowing(mut self, rules: NarrowingRules) -> Self {
        self.narrowing = Arc::new(rules);
        self
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The operation index, if any.
    pub fn operations(&self) -> Option<&OperationIndex> {
        self.index.as_deref()
    }

    /// Whether `request_line` was declared as a custom endpoint.
    pub fn is_custom_endpoint(&self, request_line: &RequestLine) -> bool {
        self.custom_endpoints.contains(request_line)
    }

    fn verb_line(method: RequestMethod, path: &str) -> Result<RequestLine, ApiError> {
        format!("{method} {path}").parse()
    }

    pub(crate) fn check_parameters(
        &self,
        request_line: &RequestLine,
        params: &Parameters,
    ) -> Result<(), ApiError> {
        let Some(index) = &self.index else {
            return Ok(());
        };
        match index.get(request_line) {
            Some(contract) => contract.validate(request_line, params),
            None if self.is_custom_endpoint(request_line) => Ok(()),
            None => Err(ApiError::UnknownOperation {
                request_line: request_line.clone(),
            }),
        }
    }

    async fn call(&self, request_line: &RequestLine, params: &Parameters) -> Result<Response, ApiError> {
        self.check_parameters(request_line, params)?;
        ensure_path_resolvable(request_line, params)?;
        let response = self.transport.send(request_line, params).await?;
        debug!(%request_line, status = response.status, "response received");
        Ok(response)
    }

    fn decode<R: DeserializeOwned>(body: Option<Value>) -> Result<R, ApiError> {
        Ok(serde_json::from_value(V::payload(body))?)
    }

    /// Sends a request and returns the raw response, whatever its status.
    ///
    /// # Errors
    ///
    /// Fails on an invalid request line or parameters, or a transport error.
    pub async fn send(
        &self,
        request_line: &str,
        params: impl Into<Parameters>,
    ) -> Result<Response, ApiError> {
        let request_line = request_line.parse::<RequestLine>()?;
        self.call(&request_line, &params.into()).await
    }

    /// Sends a `GET` request.
    ///
    /// Returns `None` on `204` and `404`.
    ///
    /// # Errors
    ///
    /// Fails with [`ApiError::RequestFailed`] on any other status greater than 299.
    pub async fn get<R: DeserializeOwned>(
        &self,
        path: &str,
        params: impl Into<Parameters>,
    ) -> Result<Option<R>, ApiError> {
        let request_line = Self::verb_line(RequestMethod::Get, path)?;
        let response = self.call(&request_line, &params.into()).await?;

        if matches!(response.status, 204 | 404) {
            return Ok(None);
        }
        check_response_status(&request_line, &response)?;
        Self::decode(response.body).map(Some)
    }

    /// Sends a `POST` request.
    ///
    /// # Errors
    ///
    /// Fails with [`ApiError::RequestFailed`] on a status greater than 299.
    pub async fn post<R: DeserializeOwned>(
        &self,
        path: &str,
        params: impl Into<Parameters>,
    ) -> Result<R, ApiError> {
        let request_line = Self::verb_line(RequestMethod::Post, path)?;
        let response = self.call(&request_line, &params.into()).await?;

        check_response_status(&request_line, &response)?;
        Self::decode(response.body)
    }

    /// Sends a `PUT` request.
    ///
    /// # Errors
    ///
    /// Fails with [`ApiError::RequestFailed`] on a status greater than 299.
    pub async fn put<R: DeserializeOwned>(
        &self,
        path: &str,
        params: impl Into<Parameters>,
    ) -> Result<R, ApiError> {
        let request_line = Self::verb_line(RequestMethod::Put, path)?;
        let response = self.call(&request_line, &params.into()).await?;

        check_response_status(&request_line, &response)?;
        Self::decode(response.body)
    }

    /// Sends a `DELETE` request.
    ///
    /// The status is checked first, then `204` gives `None`. Unlike [`Self::get`],
    /// a `404` is an error.
    ///
    /// # Errors
    ///
    /// Fails with [`ApiError::RequestFailed`] on a status greater than 299.
    pub async fn delete<R: DeserializeOwned>(
        &self,
        path: &str,
        params: impl Into<Parameters>,
    ) -> Result<Option<R>, ApiError> {
        let request_line = Self::verb_line(RequestMethod::Delete, path)?;
        let response = self.call(&request_line, &params.into()).await?;

        check_response_status(&request_line, &response)?;
        if response.status == 204 {
            return Ok(None);
        }
        Self::decode(response.body).map(Some)
    }

    /// The response union of a documented operation, narrowed for `params`.
    ///
    /// Returns `None` for an undocumented operation or an untyped client.
    pub fn infer_response(
        &self,
        request_line: &RequestLine,
        params: &Parameters,
    ) -> Option<Vec<ResponseVariant>> {
        let contract = self.index.as_ref()?.get(request_line)?;
        Some(
            self.narrowing
                .narrow(request_line, params, contract.response.clone()),
        )
    }
}

impl<T: Transport> DispatchClient<V3, T> {
    /// Lists a collection, one item at a time.
    ///
    /// Pages are requested lazily with `page=1`, `page=2`, ... (overriding any
    /// caller-supplied `page`), until a page has an empty or missing `data`.
    ///
    /// # Errors
    ///
    /// Fails before any I/O on an invalid path or parameters, or with
    /// [`ApiError::NotListable`] when the documented operation does not return a collection.
    pub fn list<R: DeserializeOwned>(
        &self,
        path: &str,
        params: impl Into<Parameters>,
    ) -> Result<ListStream<R, T>, ApiError> {
        let request_line = Self::verb_line(RequestMethod::Get, path)?;
        let params = params.into();

        if let Some(contract) = self.operations().and_then(|index| index.get(&request_line))
            && !contract.returns_collection()
        {
            return Err(ApiError::NotListable { request_line });
        }
        self.check_parameters(&request_line, &params)?;
        ensure_path_resolvable(&request_line, &params)?;

        Ok(ListStream::new(self.clone(), request_line, params))
    }

    pub(crate) async fn fetch_page(
        &self,
        request_line: &RequestLine,
        params: &Parameters,
    ) -> Result<Response, ApiError> {
        self.transport.send(request_line, params).await
    }
}

/// Fails fast on a missing path parameter, whatever the transport.
fn ensure_path_resolvable(request_line: &RequestLine, params: &Parameters) -> Result<(), ApiError> {
    let empty = serde_json::Map::new();
    crate::resolve_path(request_line.path(), params.path.as_ref().unwrap_or(&empty)).map(|_| ())
}
