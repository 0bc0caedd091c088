use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use headers::{ContentType, HeaderMapExt};
use http::header::{ACCEPT, ACCEPT_ENCODING, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Body, Request};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::{Response, Retry};
use crate::auth::SecureString;
use crate::params::{Parameters, RequestBody};
use crate::request_line::RequestLine;
use crate::{ApiError, resolve_path, to_query_string};

/// [`Transport`](super::Transport) over HTTP, backed by a shared [`reqwest::Client`].
///
/// Every request carries `Accept-Encoding: gzip`, `Accept: application/json` and the
/// `X-Auth-Token` header. JSON bodies get `Content-Type: application/json`. Caller
/// headers are applied last and win.
///
/// A request whose `Content-Type` header contains `multipart/form-data` is sent with
/// `Accept: */*` and its body untouched.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
    access_token: SecureString,
    retry: Retry,
    timeout: Option<Duration>,
}

impl HttpTransport {
    /// Creates a transport sending to `base_url`, e.g. `https://api.bigcommerce.com/stores/abc/v3`.
    pub fn new(client: reqwest::Client, base_url: Url, access_token: SecureString) -> Self {
        Self {
            client,
            base_url,
            access_token,
            retry: Retry::default(),
            timeout: None,
        }
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: impl Into<Retry>) -> Self {
        self.retry = retry.into();
        self
    }

    /// Sets a per-attempt timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The base URL every path is appended to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn build_url(
        &self,
        request_line: &RequestLine,
        params: &Parameters,
    ) -> Result<Url, ApiError> {
        let empty = serde_json::Map::new();
        let path = resolve_path(request_line.path(), params.path.as_ref().unwrap_or(&empty))?;
        let url = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let mut url = url.parse::<Url>()?;

        if let Some(query) = &params.query {
            let query_string = to_query_string(query)?;
            if !query_string.is_empty() {
                url.set_query(Some(&query_string));
            }
        }

        Ok(url)
    }

    pub(crate) fn build_headers(&self, params: &Parameters) -> Result<HeaderMap, ApiError> {
        let multipart = params.is_multipart();
        let mut headers = HeaderMap::new();

        if !multipart && params.present_body().is_some() {
            headers.typed_insert(ContentType::json());
        }

        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
        let accept = if multipart {
            HeaderValue::from_static("*/*")
        } else {
            HeaderValue::from_static("application/json")
        };
        headers.insert(ACCEPT, accept);
        let (name, value) = self.access_token.to_header()?;
        headers.insert(name, value);

        for (name, value) in params.header.iter().flatten() {
            headers.insert(
                HeaderName::from_bytes(name.as_bytes())?,
                HeaderValue::from_str(value)?,
            );
        }

        Ok(headers)
    }

    pub(crate) fn build_body(params: &Parameters) -> Result<Option<Bytes>, ApiError> {
        let Some(body) = params.present_body() else {
            return Ok(None);
        };

        let bytes = match body {
            RequestBody::Bytes(bytes) => bytes.clone(),
            RequestBody::Json(Value::String(text)) if params.is_multipart() => {
                Bytes::from(text.clone())
            }
            RequestBody::Json(value) if params.is_multipart() => {
                return Err(ApiError::UnsupportedMultipartBody {
                    value: value.clone(),
                });
            }
            RequestBody::Json(value) => Bytes::from(serde_json::to_vec(value)?),
        };
        Ok(Some(bytes))
    }

    async fn read_response(response: reqwest::Response) -> Result<Response, ApiError> {
        let status = response.status().as_u16();
        let text = response.text().await?;
        if text.is_empty() {
            return Ok(Response::new(status, None));
        }

        let body = serde_json::from_str(&text).unwrap_or_else(|err| {
            debug!(%status, %err, "response body is not JSON, keeping the raw text");
            Value::String(text)
        });
        Ok(Response::new(status, body))
    }

    async fn execute(
        &self,
        request_line: &RequestLine,
        params: &Parameters,
    ) -> Result<Response, ApiError> {
        let url = self.build_url(request_line, params)?;
        let headers = self.build_headers(params)?;
        let body = Self::build_body(params)?;
        let method = http::Method::from(request_line.method());

        let mut attempt = 1;
        loop {
            let mut request = Request::new(method.clone(), url.clone());
            *request.headers_mut() = headers.clone();
            if let Some(bytes) = &body {
                *request.body_mut() = Some(Body::from(bytes.clone()));
            }
            if let Some(timeout) = self.timeout {
                *request.timeout_mut() = Some(timeout);
            }

            debug!(?request, "sending...");
            let response = self.client.execute(request).await?;
            debug!(?response, "...receiving");

            if !response.status().is_success()
                && let Some(strategy) = self.retry.strategy()
                && strategy.should_retry(attempt, &response, request_line)
            {
                let delay = strategy.backoff_time(attempt, &response, request_line);
                warn!(
                    %request_line,
                    status = response.status().as_u16(),
                    attempt,
                    ?delay,
                    "retrying request"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            return Self::read_response(response).await;
        }
    }
}

impl super::Transport for HttpTransport {
    fn send(
        &self,
        request_line: &RequestLine,
        params: &Parameters,
    ) -> impl Future<Output = Result<Response, ApiError>> + Send {
        self.execute(request_line, params)
    }
}
