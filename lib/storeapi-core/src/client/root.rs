use std::sync::Arc;

use indexmap::IndexMap;
use tracing::warn;

use super::{ApiVersion, DispatchClient, V2, V2Client, V3, V3Client};
use crate::index::OperationIndex;
use crate::request_line::RequestLine;
use crate::transport::{HttpTransport, Transport};
use crate::{ApiError, Config};

/// Splits custom endpoints by version prefix, keyed by `"v2"` and `"v3"`.
///
/// `GET /v3/foo` lands in `"v3"` as `GET /foo`. Request lines with no version
/// prefix are dropped with a warning.
pub fn partition_custom_endpoints(
    request_lines: impl IntoIterator<Item = RequestLine>,
) -> IndexMap<&'static str, Vec<RequestLine>> {
    let mut partition = IndexMap::from([(V2::SEGMENT, Vec::new()), (V3::SEGMENT, Vec::new())]);

    for request_line in request_lines {
        let routed = partition.iter_mut().find_map(|(segment, lines)| {
            request_line
                .strip_path_prefix(&format!("/{segment}"))
                .map(|stripped| lines.push(stripped))
        });
        if routed.is_none() {
            warn!(%request_line, "custom endpoint without a /v2 or /v3 prefix ignored");
        }
    }
    partition
}

/// Both API versions under one configuration.
///
/// ```rust
/// use storeapi_core::{Client, Config};
///
/// let config = Config::builder("abc123", "my-token")
///     .with_custom_endpoint("GET /v3/content/preview".parse()?)
///     .build()?;
/// let client = Client::new(&config)?;
///
/// assert!(client.v3().is_custom_endpoint(&"GET /content/preview".parse()?));
/// # Ok::<(), storeapi_core::ApiError>(())
/// ```
#[derive(Debug)]
pub struct Client<T = HttpTransport> {
    v2: V2Client<T>,
    v3: V3Client<T>,
}

impl<T> Clone for Client<T> {
    fn clone(&self) -> Self {
        Self {
            v2: self.v2.clone(),
            v3: self.v3.clone(),
        }
    }
}

impl Client<HttpTransport> {
    /// Creates both clients over HTTP, sharing the connection pool of `config`.
    ///
    /// # Errors
    ///
    /// Fails if a base URL cannot be built.
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        Ok(Self {
            v2: DispatchClient::from_config(config)?,
            v3: DispatchClient::from_config(config)?,
        })
    }
}

impl<T: Transport> Client<T> {
    /// Creates both clients from raw transports, bypassing [`Config`].
    ///
    /// Custom endpoints are routed by their `/v2` or `/v3` prefix.
    pub fn with_transports(
        v2: T,
        v3: T,
        custom_endpoints: impl IntoIterator<Item = RequestLine>,
    ) -> Self {
        let mut partition = partition_custom_endpoints(custom_endpoints);
        let v2_custom = partition.shift_remove(V2::SEGMENT).unwrap_or_default();
        let v3_custom = partition.shift_remove(V3::SEGMENT).unwrap_or_default();

        Self {
            v2: DispatchClient::new(v2).with_custom_endpoints(v2_custom),
            v3: DispatchClient::new(v3).with_custom_endpoints(v3_custom),
        }
    }

    /// Validates v2 calls against `index`.
    #[must_use]
    pub fn with_v2_operations(mut self, index: impl Into<Arc<OperationIndex>>) -> Self {
        self.v2 = self.v2.with_operations(index);
        self
    }

    /// Validates v3 calls against `index`.
    #[must_use]
    pub fn with_v3_operations(mut self, index: impl Into<Arc<OperationIndex>>) -> Self {
        self.v3 = self.v3.with_operations(index);
        self
    }

    /// The v2 client.
    pub fn v2(&self) -> &V2Client<T> {
        &self.v2
    }

    /// The v3 client.
    pub fn v3(&self) -> &V3Client<T> {
        &self.v3
    }
}
