use thiserror::Error;

/// Manifest retrieval and parsing errors.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest unreachable: {0}")]
    Unreachable(String),

    #[error("manifest malformed: {0}")]
    Malformed(String),

    #[error("manifest request timed out")]
    Timeout,

    /// The server answered 404/410 on a live re-fetch: the stream is over.
    #[error("stream ended")]
    Ended,
}

impl From<hlsmon_net::NetError> for ManifestError {
    fn from(error: hlsmon_net::NetError) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Unreachable(error.to_string())
        }
    }
}

pub type HlsResult<T> = Result<T, ManifestError>;
