use std::time::Duration;

use hlsmon_abr::AbrOptions;
use hlsmon_net::{NetOptions, RetryPolicy};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Configuration for a monitoring session.
#[derive(Clone, Debug)]
pub struct MonitorOptions {
    /// Stream URL (master or media playlist).
    pub url: Url,
    /// Network configuration for manifest fetches.
    pub net: NetOptions,
    /// Budget for a single segment request.
    pub segment_timeout: Duration,
    /// Retry schedule for segment fetches (3 attempts total by default).
    pub segment_retry: RetryPolicy,
    /// Rendition-selection configuration.
    pub abr: AbrOptions,
    /// Cadence of the reporting tick.
    pub report_interval: Duration,
    /// The downloader pauses while this much content is buffered ahead.
    pub max_buffer_secs: f64,
    /// Occupancy above which playback is considered likely to keep up.
    pub keep_up_buffer_secs: f64,
    /// Capacity of the download-record log.
    pub download_log_cap: usize,
    /// Capacity of the events broadcast channel.
    pub events_channel_capacity: usize,
    /// Cancellation token for graceful shutdown (created if not provided).
    pub cancel: Option<CancellationToken>,
}

impl MonitorOptions {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            net: NetOptions::default(),
            segment_timeout: Duration::from_secs(15),
            segment_retry: RetryPolicy::new(
                2,
                Duration::from_millis(500),
                Duration::from_secs(5),
            ),
            abr: AbrOptions::default(),
            report_interval: Duration::from_secs(2),
            max_buffer_secs: 30.0,
            keep_up_buffer_secs: 3.0,
            download_log_cap: 64,
            events_channel_capacity: 32,
            cancel: None,
        }
    }

    /// Set network options for manifest fetches.
    pub fn with_net(mut self, net: NetOptions) -> Self {
        self.net = net;
        self
    }

    /// Set the per-segment request budget.
    pub fn with_segment_timeout(mut self, timeout: Duration) -> Self {
        self.segment_timeout = timeout;
        self
    }

    /// Set the segment retry schedule.
    pub fn with_segment_retry(mut self, policy: RetryPolicy) -> Self {
        self.segment_retry = policy;
        self
    }

    /// Set ABR options.
    pub fn with_abr(mut self, abr: AbrOptions) -> Self {
        self.abr = abr;
        self
    }

    /// Set the reporting cadence.
    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    /// Set the download-ahead limit in seconds of content.
    pub fn with_max_buffer_secs(mut self, secs: f64) -> Self {
        self.max_buffer_secs = secs;
        self
    }

    /// Set the cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}
