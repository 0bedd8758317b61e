use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::{
    error::NetError,
    retry::RetryNet,
    timeout::TimeoutNet,
    types::RetryPolicy,
};

/// A fully buffered successful HTTP response.
///
/// `status` is always a success code; error statuses surface as
/// [`NetError::HttpStatus`] instead.
#[derive(Clone, Debug)]
pub struct FetchedBytes {
    pub status: u16,
    pub bytes: Bytes,
}

impl FetchedBytes {
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg_attr(any(test, feature = "mock"), unimock::unimock(api = NetMock))]
#[async_trait]
pub trait Net: Send + Sync {
    /// Fetch the whole resource at `url` into memory.
    async fn get_bytes(&self, url: Url) -> Result<FetchedBytes, NetError>;
}

pub trait NetExt: Net + Sized {
    /// Add a per-request timeout layer.
    fn with_timeout(self, timeout: Duration) -> TimeoutNet<Self> {
        TimeoutNet::new(self, timeout)
    }

    /// Add a retry layer for transient failures.
    fn with_retry(self, policy: RetryPolicy) -> RetryNet<Self> {
        RetryNet::new(self, policy)
    }
}

impl<T: Net> NetExt for T {}
