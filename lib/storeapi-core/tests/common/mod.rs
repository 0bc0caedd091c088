use std::time::Duration;

use rstest::fixture;
use tracing::info;

use storeapi_core::{RequestLine, RetryStrategy};

mod mock_store;
pub use self::mock_store::*;

pub fn init_tracing() {
    // should be run once, fail otherwise, we skip that error
    let _ = tracing_subscriber::fmt()
        .pretty()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();

    info!("Tracing initialized");
}

/// Default retry decisions, without waiting.
#[derive(Debug)]
pub struct ImmediateRetry;

impl RetryStrategy for ImmediateRetry {
    fn backoff_time(&self, _: u32, _: &reqwest::Response, _: &RequestLine) -> Duration {
        Duration::ZERO
    }
}

#[fixture]
pub async fn store() -> MockStore {
    init_tracing();
    match MockStore::start().await {
        Ok(store) => store,
        Err(error) => {
            panic!("fail to start mock store: {error:?}");
        }
    }
}
