use thiserror::Error;

/// Centralized error type for hlsmon-net.
#[derive(Debug, Error, Clone)]
pub enum NetError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("timeout")]
    Timeout,
    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("request failed after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: u32,
        source: Box<NetError>,
    },
}

impl NetError {
    /// Creates an HTTP status error.
    pub fn http_status(status: u16, url: String) -> Self {
        Self::HttpStatus { status, url }
    }

    /// Creates a timeout error.
    pub fn timeout() -> Self {
        Self::Timeout
    }

    /// Checks if this error is considered transient and worth retrying.
    ///
    /// Transient means: timeouts, connection failures (refused, reset),
    /// and server-side HTTP statuses (5xx plus 408/429).
    pub fn is_retryable(&self) -> bool {
        match self {
            NetError::Timeout | NetError::Connect(_) => true,
            NetError::HttpStatus { status, .. } => {
                *status >= 500 || *status == 429 || *status == 408
            }
            NetError::Request(_) | NetError::RetryExhausted { .. } => false,
        }
    }

    /// Checks if this error indicates a timeout, looking through retry wrappers.
    pub fn is_timeout(&self) -> bool {
        match self {
            NetError::Timeout => true,
            NetError::RetryExhausted { source, .. } => source.is_timeout(),
            _ => false,
        }
    }

    /// Gets the HTTP status code if one was observed, looking through retry wrappers.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            NetError::HttpStatus { status, .. } => Some(*status),
            NetError::RetryExhausted { source, .. } => source.status_code(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for NetError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_connect() {
            Self::Connect(error.to_string())
        } else {
            Self::Request(error.to_string())
        }
    }
}

pub type NetResult<T> = Result<T, NetError>;
