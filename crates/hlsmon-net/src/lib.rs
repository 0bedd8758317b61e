#![forbid(unsafe_code)]

mod client;
mod error;
mod retry;
mod timeout;
mod traits;
mod types;

pub use crate::{
    client::HttpClient,
    error::{NetError, NetResult},
    retry::RetryNet,
    timeout::TimeoutNet,
    traits::{FetchedBytes, Net, NetExt},
    types::{NetOptions, RetryPolicy},
};

#[cfg(feature = "mock")]
pub mod mock {
    pub use crate::traits::NetMock;
}
