#![forbid(unsafe_code)]

//! A monitoring session over one HLS stream.
//!
//! Three cooperating tasks — live-playlist refresh, sequential segment
//! download, and a fixed-cadence reporting tick — share a buffer model and
//! a download-record log behind one lock. Consumers observe the session
//! through a broadcast event stream; every two seconds a
//! [`MetricsSnapshot`] event carries the aggregated playback-health view.

mod buffer;
mod config;
mod downloader;
mod error;
mod events;
mod metrics;
mod records;
mod refresh;
mod session;
mod state;

pub use crate::{
    buffer::{BufferState, StallEdge, TimeRange},
    config::MonitorOptions,
    error::{SegmentError, SessionError, SessionResult},
    events::{EventEmitter, SessionEvent},
    metrics::{MetricsSnapshot, SessionPhase, StreamDuration},
    records::{DownloadLog, DownloadRecord},
    session::MonitorSession,
};

pub use hlsmon_abr::SwitchReason;
