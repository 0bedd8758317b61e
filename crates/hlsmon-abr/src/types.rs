use std::time::Duration;

/// ABR configuration.
#[derive(Clone, Debug)]
pub struct AbrOptions {
    /// EWMA smoothing factor for the throughput estimate.
    pub ewma_alpha: f64,
    /// Fraction of the estimated throughput a candidate's bandwidth may use.
    pub safety_factor: f64,
    /// Completed segments required on the current variant before an
    /// up-switch is allowed.
    pub up_switch_min_segments: u32,
}

impl Default for AbrOptions {
    fn default() -> Self {
        Self {
            ewma_alpha: 0.3,
            safety_factor: 0.8,
            up_switch_min_segments: 2,
        }
    }
}

/// Minimal variant information needed for selection decisions.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Variant {
    /// Index into the master playlist's variant list.
    pub index: usize,
    pub bandwidth_bps: u64,
}

/// One completed transfer, as observed by the downloader.
#[derive(Clone, Copy, Debug)]
pub struct ThroughputSample {
    pub bytes: u64,
    pub duration: Duration,
}

impl ThroughputSample {
    /// Instantaneous rate in bits per second.
    ///
    /// The duration is clamped to 1 ms so loopback-fast transfers do not
    /// blow the estimate up to infinity.
    pub fn bits_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64().max(0.001);
        (self.bytes as f64) * 8.0 / secs
    }
}
