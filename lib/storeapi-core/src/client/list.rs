use std::collections::VecDeque;
use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::{DispatchClient, Meta, V3, check_response_status};
use crate::params::Parameters;
use crate::request_line::RequestLine;
use crate::transport::{HttpTransport, Transport};
use crate::ApiError;

/// A lazy stream over the items of a paginated v3 collection.
///
/// One page is fetched per pull, only once the previous page is consumed.
/// The stream ends on the first page whose `data` is empty, `null` or missing.
/// After an error, the stream is over; items already returned stay valid.
///
/// # Example
///
/// ```rust,no_run
/// use serde_json::Value;
/// use storeapi_core::{Config, Parameters, V3Client};
///
/// # async fn example() -> Result<(), storeapi_core::ApiError> {
/// let client = V3Client::from_config(&Config::builder("abc123", "my-token").build()?)?;
///
/// let mut products = client.list::<Value>("/catalog/products", Parameters::new().with_query("limit", 250))?;
/// while let Some(product) = products.next().await? {
///     println!("{product}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct ListStream<R, T = HttpTransport> {
    client: DispatchClient<V3, T>,
    request_line: RequestLine,
    params: Parameters,
    page: u64,
    max_pages: Option<u64>,
    buffer: VecDeque<R>,
    done: bool,
}

impl<R, T> fmt::Debug for ListStream<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListStream")
            .field("request_line", &self.request_line)
            .field("page", &self.page)
            .field("max_pages", &self.max_pages)
            .field("buffered", &self.buffer.len())
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl<R: DeserializeOwned, T: Transport> ListStream<R, T> {
    pub(crate) fn new(
        client: DispatchClient<V3, T>,
        request_line: RequestLine,
        params: Parameters,
    ) -> Self {
        Self {
            client,
            request_line,
            params,
            page: 1,
            max_pages: None,
            buffer: VecDeque::new(),
            done: false,
        }
    }

    /// Stops after `max_pages` pages, even if the server has more.
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u64) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    /// Number of pages that yielded items so far.
    pub fn pages_fetched(&self) -> u64 {
        self.page - 1
    }

    /// Returns the next item, fetching the next page when needed.
    ///
    /// Returns `Ok(None)` once the collection is exhausted.
    ///
    /// # Errors
    ///
    /// Fails on a transport error, a status greater than 299, or an item that
    /// does not deserialize into `R`.
    pub async fn next(&mut self) -> Result<Option<R>, ApiError> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Ok(Some(item));
            }
            if self.done {
                return Ok(None);
            }
            if self.max_pages.is_some_and(|max_pages| self.page > max_pages) {
                debug!(request_line = %self.request_line, "page limit reached");
                self.done = true;
                return Ok(None);
            }

            match self.fetch_page().await {
                Ok(items) => self.buffer = items,
                Err(err) => {
                    self.done = true;
                    return Err(err);
                }
            }
        }
    }

    /// Collects all remaining items.
    ///
    /// # Errors
    ///
    /// Fails on the first error, dropping the items collected so far.
    pub async fn collect(mut self) -> Result<Vec<R>, ApiError> {
        let mut all = Vec::new();
        while let Some(item) = self.next().await? {
            all.push(item);
        }
        Ok(all)
    }

    async fn fetch_page(&mut self) -> Result<VecDeque<R>, ApiError> {
        let page = self.page;
        let params = self.params.with_page(page);
        debug!(request_line = %self.request_line, page, "fetching page");

        let response = self.client.fetch_page(&self.request_line, &params).await?;
        check_response_status(&self.request_line, &response)?;

        let Some(Value::Object(mut body)) = response.body else {
            self.done = true;
            return Ok(VecDeque::new());
        };
        if let Some(meta) = body
            .remove("meta")
            .and_then(|meta| serde_json::from_value::<Meta>(meta).ok())
            .and_then(|meta| meta.pagination)
        {
            debug!(
                current_page = meta.current_page,
                total_pages = meta.total_pages,
                "page metadata"
            );
        }

        match body.remove("data") {
            Some(Value::Array(items)) if !items.is_empty() => {
                self.page += 1;
                items
                    .into_iter()
                    .map(|item| serde_json::from_value(item).map_err(ApiError::from))
                    .collect()
            }
            _ => {
                debug!(request_line = %self.request_line, page, "last page reached");
                self.done = true;
                Ok(VecDeque::new())
            }
        }
    }
}
