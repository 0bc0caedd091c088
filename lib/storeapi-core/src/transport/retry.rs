use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::request_line::RequestLine;

/// Attempts allowed for a rate-limited (429) request.
const RATE_LIMITED_ATTEMPTS: u32 = 50;

/// Attempts allowed for a request failing with a 5xx status.
const SERVER_ERROR_ATTEMPTS: u32 = 5;

const BACKOFF_STEP: Duration = Duration::from_millis(500);

/// Decides whether a non-success response is retried, and how long to wait.
///
/// Both hooks have defaults implementing [`DefaultRetry`], so a strategy may
/// override only one of them.
///
/// Only HTTP responses reach a strategy: connection errors are never retried.
pub trait RetryStrategy: Debug + Send + Sync {
    /// Whether to send the request again after the `attempt`-th (1-based) failed response.
    fn should_retry(
        &self,
        attempt: u32,
        response: &reqwest::Response,
        request_line: &RequestLine,
    ) -> bool {
        let _ = request_line;
        default_should_retry(attempt, response.status().as_u16())
    }

    /// Delay before the next attempt, after `num_failures` failed responses.
    fn backoff_time(
        &self,
        num_failures: u32,
        response: &reqwest::Response,
        request_line: &RequestLine,
    ) -> Duration {
        let _ = (response, request_line);
        default_backoff(num_failures, rand::rng().random_range(0.0..0.2))
    }
}

/// The default policy.
///
/// - 429 is retried up to 50 attempts, any 5xx up to 5 attempts
/// - the delay is linear: `num_failures * 500ms`, scaled by a random factor in `[0.9, 1.1)`
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRetry;

impl RetryStrategy for DefaultRetry {}

fn default_should_retry(attempt: u32, status: u16) -> bool {
    match status {
        429 => attempt < RATE_LIMITED_ATTEMPTS,
        500..=599 => attempt < SERVER_ERROR_ATTEMPTS,
        _ => false,
    }
}

fn default_backoff(num_failures: u32, jitter: f64) -> Duration {
    BACKOFF_STEP
        .saturating_mul(num_failures)
        .mul_f64(0.9 + jitter)
}

/// Retry policy of an [`HttpTransport`](super::HttpTransport).
///
/// `true` converts to the default policy, `false` disables retries.
#[derive(Debug, Clone)]
pub enum Retry {
    /// Every response is final.
    Disabled,
    /// Non-success responses are handed to the strategy.
    Enabled(Arc<dyn RetryStrategy>),
}

impl Retry {
    /// Uses a custom strategy.
    pub fn custom(strategy: impl RetryStrategy + 'static) -> Self {
        Self::Enabled(Arc::new(strategy))
    }

    pub(crate) fn strategy(&self) -> Option<&dyn RetryStrategy> {
        match self {
            Self::Disabled => None,
            Self::Enabled(strategy) => Some(strategy.as_ref()),
        }
    }
}

impl Default for Retry {
    fn default() -> Self {
        Self::custom(DefaultRetry)
    }
}

impl From<bool> for Retry {
    fn from(enabled: bool) -> Self {
        if enabled {
            Self::default()
        } else {
            Self::Disabled
        }
    }
}
