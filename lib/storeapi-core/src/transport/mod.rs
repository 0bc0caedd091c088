//! One HTTP round trip per call, with retry.
//!
//! [`HttpTransport`] is the real implementation used by the clients.
//! [`FnTransport`] adapts any async closure, which is how tests and mocks
//! replace the network entirely.

use std::fmt;
use std::future::Future;

use serde_json::Value;

use crate::ApiError;
use crate::params::Parameters;
use crate::request_line::RequestLine;

mod http_transport;
pub use self::http_transport::HttpTransport;

mod retry;
pub use self::retry::{DefaultRetry, Retry, RetryStrategy};

/// Raw outcome of a transport call.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Parsed JSON body, `None` when the response text was empty.
    pub body: Option<Value>,
}

impl Response {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Option<Value>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is at most 299.
    pub fn is_success(&self) -> bool {
        self.status <= 299
    }
}

/// Performs one API call.
///
/// Retries, if any, happen inside `send`: a returned error or non-success
/// status is final.
pub trait Transport: Send + Sync {
    /// Sends the request described by `request_line` and `params`.
    fn send(
        &self,
        request_line: &RequestLine,
        params: &Parameters,
    ) -> impl Future<Output = Result<Response, ApiError>> + Send;
}

/// A [`Transport`] backed by an async function.
///
/// ```rust
/// use storeapi_core::{FnTransport, Response};
/// use serde_json::json;
///
/// let transport = FnTransport::new(|_line: storeapi_core::RequestLine, _params: storeapi_core::Parameters| async {
///     Ok::<_, storeapi_core::ApiError>(Response::new(200, json!({"data": []})))
/// });
/// ```
pub struct FnTransport<F> {
    send: F,
}

impl<F> FnTransport<F> {
    /// Wraps `send`.
    pub fn new(send: F) -> Self {
        Self { send }
    }
}

impl<F> fmt::Debug for FnTransport<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTransport").finish_non_exhaustive()
    }
}

impl<F, Fut> Transport for FnTransport<F>
where
    F: Fn(RequestLine, Parameters) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, ApiError>> + Send,
{
    fn send(
        &self,
        request_line: &RequestLine,
        params: &Parameters,
    ) -> impl Future<Output = Result<Response, ApiError>> + Send {
        (self.send)(request_line.clone(), params.clone())
    }
}
