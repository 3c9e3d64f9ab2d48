// Retrying fetcher: wraps a transport with bounded exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::FetchError;
use crate::transport::{DerivativeTransport, FetchedMedia};

/// Backoff policy for derivative fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry, doubled for each one after it
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt`, counted from 0.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        2_u32
            .checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }
}

/// Fetches derivatives, retrying transient failures.
#[derive(Clone)]
pub struct RetryingFetcher {
    transport: Arc<dyn DerivativeTransport>,
    policy: RetryPolicy,
}

impl RetryingFetcher {
    pub fn new(transport: Arc<dyn DerivativeTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch `url`, retrying on network errors, 429 and 5xx.
    /// Any other failure is returned at once; once retries are exhausted the
    /// last error is returned.
    pub async fn fetch(&self, url: &str) -> Result<FetchedMedia, FetchError> {
        let mut attempt = 0;
        loop {
            match self.transport.fetch(url).await {
                Ok(media) => return Ok(media),
                Err(e) if e.is_transient() && attempt < self.policy.max_retries => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        attempt = attempt + 1,
                        url = %url,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying media cache request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    debug!(url = %url, error = %e, attempts = attempt + 1, "Giving up on request");
                    return Err(e);
                }
            }
        }
    }
}
