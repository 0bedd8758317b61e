use hlsmon_hls::ManifestError;
use hlsmon_net::NetError;
use thiserror::Error;

/// Errors that end a session before or while it runs.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// A single segment that could not be brought into the buffer.
///
/// Non-fatal: the downloader records a stall and moves on to the next
/// segment.
#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("segment {sequence} fetch failed: {source}")]
    Fetch {
        sequence: u64,
        #[source]
        source: NetError,
    },

    #[error("segment {sequence} returned an empty body")]
    Empty { sequence: u64 },

    #[error("segment {sequence} has an unresolvable URI: {message}")]
    InvalidUri { sequence: u64, message: String },
}

impl SegmentError {
    pub fn sequence(&self) -> u64 {
        match self {
            SegmentError::Fetch { sequence, .. }
            | SegmentError::Empty { sequence }
            | SegmentError::InvalidUri { sequence, .. } => *sequence,
        }
    }
}
