use async_trait::async_trait;
use tokio::time::sleep;
use tracing::debug;
use url::Url;

use crate::{
    error::NetError,
    traits::{FetchedBytes, Net},
    types::RetryPolicy,
};

/// Retry decorator for Net implementations.
///
/// Re-issues the request on transient failures (see [`NetError::is_retryable`])
/// with the policy's exponential backoff. Exhaustion wraps the last error in
/// [`NetError::RetryExhausted`]; non-transient errors pass through untouched.
pub struct RetryNet<N> {
    inner: N,
    policy: RetryPolicy,
}

impl<N: Net> RetryNet<N> {
    pub fn new(inner: N, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<N: Net> Net for RetryNet<N> {
    async fn get_bytes(&self, url: Url) -> Result<FetchedBytes, NetError> {
        let mut last_error = None;

        for attempt in 0..=self.policy.max_retries {
            let delay = self.policy.delay_for_attempt(attempt);
            if !delay.is_zero() {
                sleep(delay).await;
            }

            match self.inner.get_bytes(url.clone()).await {
                Ok(fetched) => return Ok(fetched),
                Err(error) => {
                    if !error.is_retryable() {
                        return Err(error);
                    }
                    debug!(
                        url = %url,
                        attempt,
                        max_retries = self.policy.max_retries,
                        error = %error,
                        "transient fetch failure"
                    );
                    last_error = Some(error);
                }
            }
        }

        Err(NetError::RetryExhausted {
            attempts: self.policy.max_retries + 1,
            source: Box::new(last_error.unwrap_or(NetError::Timeout)),
        })
    }
}
