use tracing::debug;

use crate::types::{AbrOptions, Variant};

/// Why a selection decision landed where it did.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SwitchReason {
    Initial,
    UpSwitch,
    DownSwitch,
    /// Down-switch forced by a playback stall, bypassing hysteresis.
    StallDownSwitch,
    /// An up-switch candidate exists but the hysteresis window blocks it.
    Hold,
    NoEstimate,
    AlreadyOptimal,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SwitchDecision {
    pub target: usize,
    pub reason: SwitchReason,
    pub changed: bool,
}

/// Chooses the active rendition from observed throughput.
///
/// Starts on the lowest-bandwidth variant for fast startup. A candidate is
/// the highest-bandwidth variant whose advertised rate fits within
/// `estimate * safety_factor`; up-switches additionally wait until at least
/// `up_switch_min_segments` segments completed on the current variant, and
/// stalls force an immediate step down.
///
/// Decisions are pure; callers commit them with [`apply`](Self::apply) once
/// the new variant's playlist is actually in hand.
#[derive(Clone, Debug)]
pub struct RenditionSelector {
    cfg: AbrOptions,
    /// Variants sorted by ascending bandwidth.
    ladder: Vec<Variant>,
    current: usize,
    segments_since_switch: u32,
}

impl RenditionSelector {
    pub fn new(mut variants: Vec<Variant>, cfg: AbrOptions) -> Self {
        variants.sort_by_key(|v| v.bandwidth_bps);
        let current = variants.first().map(|v| v.index).unwrap_or(0);
        Self {
            cfg,
            ladder: variants,
            current,
            segments_since_switch: 0,
        }
    }

    /// Index of the active variant in the master playlist.
    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_bandwidth(&self) -> Option<u64> {
        self.ladder
            .iter()
            .find(|v| v.index == self.current)
            .map(|v| v.bandwidth_bps)
    }

    /// Record a completed segment on the current variant.
    pub fn on_segment_complete(&mut self) {
        self.segments_since_switch = self.segments_since_switch.saturating_add(1);
    }

    /// Re-evaluate the active variant against the throughput estimate.
    pub fn decide(&self, estimate_bps: Option<u64>) -> SwitchDecision {
        let Some(estimate) = estimate_bps else {
            return self.unchanged(SwitchReason::NoEstimate);
        };

        let Some(candidate) = self.candidate_for(estimate) else {
            return self.unchanged(SwitchReason::AlreadyOptimal);
        };

        let current_bw = self.current_bandwidth().unwrap_or(0);
        if candidate.bandwidth_bps > current_bw {
            if self.segments_since_switch < self.cfg.up_switch_min_segments {
                debug!(
                    current = self.current,
                    candidate = candidate.index,
                    segments_since_switch = self.segments_since_switch,
                    "up-switch held back by hysteresis"
                );
                return self.unchanged(SwitchReason::Hold);
            }
            return self.changed_to(candidate.index, SwitchReason::UpSwitch);
        }

        if candidate.bandwidth_bps < current_bw {
            return self.changed_to(candidate.index, SwitchReason::DownSwitch);
        }

        self.unchanged(SwitchReason::AlreadyOptimal)
    }

    /// A stall invalidates the current choice: step down immediately,
    /// ignoring the up-switch hysteresis window.
    pub fn on_stall(&self, estimate_bps: Option<u64>) -> SwitchDecision {
        let current_bw = self.current_bandwidth().unwrap_or(0);

        // Best fit below the current rung; estimate-based when available,
        // otherwise one rung down.
        let target = estimate_bps
            .and_then(|estimate| {
                let budget = estimate as f64 * self.cfg.safety_factor;
                self.ladder
                    .iter()
                    .filter(|v| v.bandwidth_bps < current_bw)
                    .filter(|v| (v.bandwidth_bps as f64) <= budget)
                    .max_by_key(|v| v.bandwidth_bps)
                    .copied()
            })
            .or_else(|| {
                self.ladder
                    .iter()
                    .filter(|v| v.bandwidth_bps < current_bw)
                    .max_by_key(|v| v.bandwidth_bps)
                    .copied()
            });

        match target {
            Some(v) => self.changed_to(v.index, SwitchReason::StallDownSwitch),
            None => self.unchanged(SwitchReason::AlreadyOptimal),
        }
    }

    /// Commit a decision once the target variant is usable.
    pub fn apply(&mut self, decision: &SwitchDecision) {
        if !decision.changed || decision.target == self.current {
            return;
        }
        debug!(
            from = self.current,
            to = decision.target,
            reason = ?decision.reason,
            "variant switch applied"
        );
        self.current = decision.target;
        self.segments_since_switch = 0;
    }

    fn candidate_for(&self, estimate_bps: u64) -> Option<Variant> {
        let budget = estimate_bps as f64 * self.cfg.safety_factor;
        self.ladder
            .iter()
            .filter(|v| (v.bandwidth_bps as f64) <= budget)
            .max_by_key(|v| v.bandwidth_bps)
            .copied()
            .or_else(|| self.ladder.first().copied())
    }

    fn changed_to(&self, target: usize, reason: SwitchReason) -> SwitchDecision {
        SwitchDecision {
            target,
            reason,
            changed: target != self.current,
        }
    }

    fn unchanged(&self, reason: SwitchReason) -> SwitchDecision {
        SwitchDecision {
            target: self.current,
            reason,
            changed: false,
        }
    }
}
