//! # Storeapi Core
//!
//! Typed client runtime for the v2 and v3 store management REST APIs.
//!
//! The crate has two halves:
//! - **the operation index** - [`derive_operation_index`] walks an OpenAPI 3.x or
//!   Swagger 2.0 document and produces a flat [`OperationIndex`], mapping every
//!   `"METHOD /path"` [`RequestLine`] to its parameters and response union
//! - **the runtime** - [`Client`] bundles a [`V2Client`] and a [`V3Client`]; each
//!   resolves paths, serializes queries, sends through a [`Transport`] with retry, and
//!   interprets the status of every verb
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use serde_json::Value;
//! use storeapi_core::{Client, Config, Parameters};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::builder("abc123", "my-access-token").build()?;
//! let client = Client::new(&config)?;
//!
//! // v3 payloads are unwrapped from their `{data, meta}` envelope
//! let product: Option<Value> = client
//!     .v3()
//!     .get("/catalog/products/{product_id}", Parameters::new().with_path("product_id", 42))
//!     .await?;
//!
//! // collections are paginated lazily
//! let mut products = client.v3().list::<Value>("/catalog/products", ())?;
//! while let Some(product) = products.next().await? {
//!     println!("{product}");
//! }
//!
//! // v2 has no envelope
//! let store: Option<Value> = client.v2().get("/store", ()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Typed calls
//!
//! With an operation index, calls are checked before any network I/O:
//!
//! ```rust
//! use serde_json::json;
//! use storeapi_core::{Client, Config, derive_operation_index};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let document = json!({
//!     "openapi": "3.0.0",
//!     "paths": {"/catalog/products/{product_id}": {"get": {"responses": {}}}}
//! });
//! let index = derive_operation_index(&document)?;
//!
//! let config = Config::builder("abc123", "my-access-token").build()?;
//! let client = Client::new(&config)?.with_v3_operations(index);
//! assert!(client.v3().operations().is_some());
//! # Ok(())
//! # }
//! ```
//!
//! ## Status handling
//!
//! | verb     | `204`  | `404`  | other `> 299` |
//! |----------|--------|--------|---------------|
//! | `get`    | `None` | `None` | error         |
//! | `delete` | `None` | error  | error         |
//! | `post`   | body   | error  | error         |
//! | `put`    | body   | error  | error         |
//!
//! `send` returns the raw [`Response`] whatever its status.
//!
//! ## Retries
//!
//! By default, `429` responses are retried up to 50 attempts and `5xx` up to 5,
//! waiting `failures * 500ms` (with jitter) in between. See [`Retry`] and
//! [`RetryStrategy`] to change this.

mod auth;
pub use self::auth::{AUTH_TOKEN_HEADER, SecureString};

mod client;
pub use self::client::{
    ApiVersion, Client, DispatchClient, Envelope, ListStream, Meta, Pagination, V2, V2Client, V3,
    V3Client, check_response_status, partition_custom_endpoints,
};

mod config;
pub use self::config::{Config, ConfigBuilder, DEFAULT_HOST};

mod error;
pub use self::error::{ApiError, IndexError};

mod index;
pub use self::index::{
    ApiGroup, BodySpec, OperationContract, OperationIndex, ParamSpec, ParameterSlots,
    ResponseStatus, ResponseVariant, SUCCESS_STATUSES, derive_operation_index, load_directory,
    load_document, missing_data_envelope,
};

mod narrowing;
pub use self::narrowing::{IncludeFields, NarrowResponse, NarrowingRules};

mod params;
pub use self::params::{Parameters, RequestBody};

mod path;
pub use self::path::resolve_path;

mod query;
pub use self::query::to_query_string;

mod request_line;
pub use self::request_line::{RequestLine, RequestMethod};

mod transport;
pub use self::transport::{
    DefaultRetry, FnTransport, HttpTransport, Response, Retry, RetryStrategy, Transport,
};
