use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::{
    error::NetError,
    traits::{FetchedBytes, Net},
};

/// Timeout decorator for Net implementations.
pub struct TimeoutNet<N> {
    inner: N,
    timeout: Duration,
}

impl<N: Net> TimeoutNet<N> {
    pub fn new(inner: N, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<N: Net> Net for TimeoutNet<N> {
    async fn get_bytes(&self, url: Url) -> Result<FetchedBytes, NetError> {
        tokio::time::timeout(self.timeout, self.inner.get_bytes(url))
            .await
            .map_err(|_| NetError::timeout())?
    }
}
