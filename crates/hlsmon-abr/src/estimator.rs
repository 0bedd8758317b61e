use crate::types::{AbrOptions, ThroughputSample};

/// Exponentially-weighted moving average of observed throughput.
///
/// Seeded by the first sample; every later sample blends in as
/// `new = alpha * instantaneous + (1 - alpha) * old`.
#[derive(Clone, Debug)]
pub struct ThroughputEstimator {
    alpha: f64,
    estimate_bps: Option<f64>,
}

impl ThroughputEstimator {
    pub fn new(cfg: &AbrOptions) -> Self {
        Self {
            alpha: cfg.ewma_alpha,
            estimate_bps: None,
        }
    }

    /// Current estimate in bits per second. `None` until the first sample.
    pub fn estimate_bps(&self) -> Option<u64> {
        self.estimate_bps.map(|e| e.round() as u64)
    }

    pub fn push_sample(&mut self, sample: ThroughputSample) {
        let instantaneous = sample.bits_per_second();
        self.estimate_bps = Some(match self.estimate_bps {
            None => instantaneous,
            Some(prev) => self.alpha * instantaneous + (1.0 - self.alpha) * prev,
        });
    }
}
