use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::{
    error::NetError,
    traits::{FetchedBytes, Net},
    types::NetOptions,
};

/// Plain reqwest-backed HTTP client.
///
/// Carries no timeout or retry behavior of its own; compose those with
/// [`NetExt::with_timeout`](crate::NetExt::with_timeout) and
/// [`NetExt::with_retry`](crate::NetExt::with_retry).
#[derive(Clone, Debug)]
pub struct HttpClient {
    inner: Client,
}

impl HttpClient {
    /// # Panics
    ///
    /// Panics if the `reqwest::Client` builder fails to build.
    #[must_use]
    pub fn new(options: &NetOptions) -> Self {
        let inner = Client::builder()
            .pool_max_idle_per_host(options.pool_max_idle_per_host)
            .build()
            .expect("failed to build reqwest client");
        Self { inner }
    }
}

#[async_trait]
impl Net for HttpClient {
    async fn get_bytes(&self, url: Url) -> Result<FetchedBytes, NetError> {
        let resp = self.inner.get(url.clone()).send().await.map_err(NetError::from)?;
        let status = resp.status();

        if !status.is_success() {
            return Err(NetError::http_status(status.as_u16(), url.to_string()));
        }

        let bytes = resp.bytes().await.map_err(NetError::from)?;
        Ok(FetchedBytes {
            status: status.as_u16(),
            bytes,
        })
    }
}
