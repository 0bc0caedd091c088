#![allow(
    clippy::missing_errors_doc,
    dead_code,
    missing_docs,
    clippy::expect_used
)]
use std::collections::VecDeque;
use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use http::uri::Scheme;
use serde_json::Value;
use tracing::info;

use storeapi_core::{Client, Config, ConfigBuilder, Retry};

pub const STORE_HASH: &str = "test-store";
pub const ACCESS_TOKEN: &str = "test-token";

/// A request as received by the mock store.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("JSON request body")
    }
}

#[derive(Debug, Clone, Default)]
struct MockState {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    responses: Arc<Mutex<VecDeque<(u16, Option<Value>)>>>,
}

/// An HTTP server replaying scripted responses, in order, and recording every request.
///
/// When the script is exhausted, it answers `404` with an empty body.
#[derive(Debug)]
pub struct MockStore {
    addr: SocketAddr,
    state: MockState,
}

async fn replay(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.requests.lock().expect("lock").push(RecordedRequest {
        method,
        path: uri.path().to_string(),
        query: uri.query().map(ToString::to_string),
        headers,
        body,
    });

    let scripted = state.responses.lock().expect("lock").pop_front();
    let (status, body) = scripted.unwrap_or((404, None));
    let status = StatusCode::from_u16(status).expect("valid status");
    match body {
        Some(body) => (
            status,
            [(header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response(),
        None => status.into_response(),
    }
}

impl MockStore {
    pub async fn start() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").context("bind mock store")?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;
        let listener = tokio::net::TcpListener::from_std(listener)?;

        let state = MockState::default();
        let router = Router::new().fallback(replay).with_state(state.clone());
        info!(%addr, "launching mock store");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("mock store running");
        });

        Ok(Self { addr, state })
    }

    /// Queues a response.
    pub fn respond(&self, status: u16, body: impl Into<Option<Value>>) -> &Self {
        self.state
            .responses
            .lock()
            .expect("lock")
            .push_back((status, body.into()));
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().expect("lock").clone()
    }

    pub fn config(&self) -> ConfigBuilder {
        Config::builder(STORE_HASH, ACCESS_TOKEN)
            .with_scheme(Scheme::HTTP)
            .with_host(self.addr.to_string())
    }

    /// A client retrying with the default decisions but no delay.
    pub fn client(&self) -> Client {
        let config = self
            .config()
            .with_retry(Retry::custom(super::ImmediateRetry))
            .build()
            .expect("valid config");
        Client::new(&config).expect("valid client")
    }
}
