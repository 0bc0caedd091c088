use std::time::Duration;

use http::uri::Scheme;
use tracing::debug;
use url::Url;

use crate::auth::SecureString;
use crate::client::{ApiVersion, partition_custom_endpoints};
use crate::request_line::RequestLine;
use crate::transport::{HttpTransport, Retry};
use crate::ApiError;

/// Default API host.
pub const DEFAULT_HOST: &str = "api.bigcommerce.com";

/// Idle keep-alive connections kept per host by the default connection pool.
const POOL_MAX_IDLE_PER_HOST: usize = 10;

/// Connection settings shared by the v2 and v3 clients.
///
/// Immutable once built; see [`ConfigBuilder`].
#[derive(Debug, Clone)]
pub struct Config {
    store_hash: String,
    access_token: SecureString,
    scheme: Scheme,
    host: String,
    retry: Retry,
    timeout: Option<Duration>,
    client: reqwest::Client,
    custom_endpoints: Vec<RequestLine>,
}

impl Config {
    /// Starts a configuration for one store.
    pub fn builder(
        store_hash: impl Into<String>,
        access_token: impl Into<SecureString>,
    ) -> ConfigBuilder {
        ConfigBuilder {
            store_hash: store_hash.into(),
            access_token: access_token.into(),
            scheme: Scheme::HTTPS,
            host: DEFAULT_HOST.to_string(),
            retry: Retry::default(),
            timeout: None,
            client: None,
            custom_endpoints: Vec::new(),
        }
    }

    /// The store identifier.
    pub fn store_hash(&self) -> &str {
        &self.store_hash
    }

    /// The API host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The retry policy.
    pub fn retry(&self) -> &Retry {
        &self.retry
    }

    /// Custom endpoints as declared, with their `/v2` or `/v3` prefix.
    pub fn custom_endpoints(&self) -> &[RequestLine] {
        &self.custom_endpoints
    }

    /// `<scheme>://<host>/stores/<store_hash>/<version>`.
    ///
    /// # Errors
    ///
    /// Fails if the host does not form a valid URL.
    pub fn base_url<V: ApiVersion>(&self) -> Result<Url, ApiError> {
        let store_hash = crate::path::encode_path_param_value(&self.store_hash);
        let url = format!(
            "{}://{}/stores/{store_hash}/{}",
            self.scheme,
            self.host,
            V::SEGMENT
        );
        Ok(url.parse()?)
    }

    /// Builds the HTTP transport of one version, sharing the connection pool.
    ///
    /// # Errors
    ///
    /// Fails if the base URL cannot be built.
    pub fn transport<V: ApiVersion>(&self) -> Result<HttpTransport, ApiError> {
        let mut transport = HttpTransport::new(
            self.client.clone(),
            self.base_url::<V>()?,
            self.access_token.clone(),
        )
        .with_retry(self.retry.clone());
        if let Some(timeout) = self.timeout {
            transport = transport.with_timeout(timeout);
        }
        debug!(base_url = %transport.base_url(), "transport created");
        Ok(transport)
    }

    /// Custom endpoints of one version, without the version prefix.
    pub fn custom_endpoints_for<V: ApiVersion>(&self) -> Vec<RequestLine> {
        partition_custom_endpoints(self.custom_endpoints.iter().cloned())
            .shift_remove(V::SEGMENT)
            .unwrap_or_default()
    }
}

/// Builder for [`Config`].
///
/// # Defaults
///
/// - scheme: HTTPS
/// - host: `api.bigcommerce.com`
/// - retry: enabled, see [`DefaultRetry`](crate::DefaultRetry)
/// - timeout: none
/// - connection pool: keep-alive, at most 10 idle connections per host
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use storeapi_core::Config;
///
/// let config = Config::builder("abc123", "my-token")
///     .with_retry(false)
///     .with_timeout(Duration::from_secs(30))
///     .with_custom_endpoint("GET /v3/content/widgets-preview".parse()?)
///     .build()?;
///
/// assert_eq!(config.host(), "api.bigcommerce.com");
/// # Ok::<(), storeapi_core::ApiError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    store_hash: String,
    access_token: SecureString,
    scheme: Scheme,
    host: String,
    retry: Retry,
    timeout: Option<Duration>,
    client: Option<reqwest::Client>,
    custom_endpoints: Vec<RequestLine>,
}

impl ConfigBuilder {
    /// Sets the URL scheme, HTTPS by default.
    #[must_use]
    pub fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Sets the API host, with an optional port (`localhost:8080`).
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the retry policy; `true` and `false` convert.
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

    /// Uses an existing connection pool.
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Declares an undocumented endpoint, prefixed with `/v2` or `/v3`.
    #[must_use]
    pub fn with_custom_endpoint(mut self, request_line: RequestLine) -> Self {
        self.custom_endpoints.push(request_line);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Fails if the default connection pool cannot be created.
    pub fn build(self) -> Result<Config, ApiError> {
        let Self {
            store_hash,
            access_token,
            scheme,
            host,
            retry,
            timeout,
            client,
            custom_endpoints,
        } = self;

        let client = match client {
            Some(client) => client,
            None => reqwest::Client::builder()
                .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
                .build()?,
        };

        Ok(Config {
            store_hash,
            access_token,
            scheme,
            host,
            retry,
            timeout,
            client,
            custom_endpoints,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{V2, V3};

    fn line(value: &str) -> RequestLine {
        value.parse().expect("request line")
    }

    #[test]
    fn should_build_base_urls() {
        let config = Config::builder("abc123", "token").build().expect("config");

        insta::assert_snapshot!(config.base_url::<V2>().expect("url"), @"https://api.bigcommerce.com/stores/abc123/v2");
        insta::assert_snapshot!(config.base_url::<V3>().expect("url"), @"https://api.bigcommerce.com/stores/abc123/v3");
    }

    #[test]
    fn should_use_custom_scheme_and_host() {
        let config = Config::builder("store", "token")
            .with_scheme(Scheme::HTTP)
            .with_host("127.0.0.1:8080")
            .build()
            .expect("config");

        let url = config.base_url::<V3>().expect("url");

        assert_eq!(url.as_str(), "http://127.0.0.1:8080/stores/store/v3");
    }

    #[test]
    fn should_not_leak_token_in_debug_output() {
        let config = Config::builder("abc123", "a-very-secret-token")
            .build()
            .expect("config");

        let debug = format!("{config:?}");

        assert!(!debug.contains("a-very-secret-token"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn should_split_custom_endpoints_per_version() {
        let config = Config::builder("abc123", "token")
            .with_custom_endpoint(line("GET /v3/content/preview"))
            .with_custom_endpoint(line("POST /v2/orders/{id}/refund_quotes"))
            .with_custom_endpoint(line("GET /v3/catalog/summary"))
            .build()
            .expect("config");

        assert_eq!(
            config.custom_endpoints_for::<V3>(),
            vec![line("GET /content/preview"), line("GET /catalog/summary")]
        );
        assert_eq!(
            config.custom_endpoints_for::<V2>(),
            vec![line("POST /orders/{id}/refund_quotes")]
        );
        assert_eq!(config.custom_endpoints().len(), 3);
    }
}
