//! Simulated playback buffer.
//!
//! Tracks which parts of the media timeline have been downloaded and moves
//! a playback clock through them. Occupancy is downloaded-but-unconsumed
//! content; the clock running out of content is a stall.

/// Tolerance for merging and comparing range endpoints.
const EPS: f64 = 1e-9;

/// A half-open interval of the media timeline, in seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// Edge of a stall episode, reported by [`BufferState::advance`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StallEdge {
    Started,
    Ended,
}

/// Playback buffer model.
#[derive(Clone, Debug, Default)]
pub struct BufferState {
    /// Downloaded ranges: always pairwise disjoint and sorted by start.
    loaded: Vec<TimeRange>,
    playhead_secs: f64,
    stalled: bool,
    stall_count: u64,
}

impl BufferState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register downloaded content covering `[start, start + duration)`.
    ///
    /// Overlapping or adjacent ranges are merged, keeping `loaded`
    /// disjoint and sorted.
    pub fn push_range(&mut self, start: f64, duration: f64) {
        if duration <= EPS {
            return;
        }
        let range = TimeRange {
            start,
            end: start + duration,
        };

        let idx = self
            .loaded
            .partition_point(|r| r.start < range.start - EPS);
        self.loaded.insert(idx, range);

        // Merge around the insertion point.
        let mut merged: Vec<TimeRange> = Vec::with_capacity(self.loaded.len());
        for r in self.loaded.drain(..) {
            match merged.last_mut() {
                Some(prev) if r.start <= prev.end + EPS => {
                    prev.end = prev.end.max(r.end);
                }
                _ => merged.push(r),
            }
        }
        self.loaded = merged;
    }

    /// Advance the playback clock by `elapsed` seconds of wall time.
    ///
    /// Consumption is clamped to available content; wanting more content
    /// than is buffered starts a stall episode (counted once on the
    /// transition). Gaps left by skipped segments are jumped over once the
    /// far side is present. With `at_end` set, running out of content is
    /// stream completion, not a stall.
    pub fn advance(&mut self, elapsed: f64, at_end: bool) -> Option<StallEdge> {
        let was_stalled = self.stalled;
        let mut remaining = elapsed.max(0.0);

        while remaining > EPS {
            let Some(range) = self.next_range_with_content() else {
                break;
            };
            if self.playhead_secs < range.start - EPS {
                // Content gap (failed/skipped segment): resume at the far side.
                self.playhead_secs = range.start;
            }
            let step = remaining.min(range.end - self.playhead_secs);
            self.playhead_secs += step;
            remaining -= step;
        }

        let starved = remaining > EPS;
        self.stalled = starved && !at_end;

        if self.stalled && !was_stalled {
            self.stall_count += 1;
            Some(StallEdge::Started)
        } else if !self.stalled && was_stalled {
            Some(StallEdge::Ended)
        } else {
            None
        }
    }

    /// Count a stall that did not come from the playback clock
    /// (a segment abandoned after retry exhaustion).
    pub fn record_stall(&mut self) {
        self.stall_count += 1;
    }

    /// Seconds of downloaded content at or ahead of the playhead.
    pub fn occupancy_secs(&self) -> f64 {
        self.loaded
            .iter()
            .map(|r| (r.end - r.start.max(self.playhead_secs)).max(0.0))
            .sum()
    }

    pub fn playhead_secs(&self) -> f64 {
        self.playhead_secs
    }

    pub fn is_stalled(&self) -> bool {
        self.stalled
    }

    pub fn stall_count(&self) -> u64 {
        self.stall_count
    }

    pub fn loaded(&self) -> &[TimeRange] {
        &self.loaded
    }

    fn next_range_with_content(&self) -> Option<TimeRange> {
        self.loaded
            .iter()
            .find(|r| r.end > self.playhead_secs + EPS)
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn assert_disjoint_sorted(buffer: &BufferState) {
        let ranges = buffer.loaded();
        for r in ranges {
            assert!(r.start <= r.end, "degenerate range: {:?}", ranges);
        }
        for w in ranges.windows(2) {
            assert!(
                w[1].start > w[0].end + EPS,
                "ranges overlap, touch or are unsorted: {:?}",
                ranges
            );
        }
    }

    #[rstest]
    #[case::contiguous(vec![(0.0, 10.0), (10.0, 10.0), (20.0, 10.0)], 1)]
    #[case::gap_then_fill(vec![(0.0, 4.0), (8.0, 4.0), (4.0, 4.0)], 1)]
    #[case::with_gap(vec![(0.0, 4.0), (8.0, 4.0), (16.0, 4.0)], 3)]
    #[case::overlapping(vec![(0.0, 6.0), (4.0, 6.0)], 1)]
    #[case::duplicate_arrival(vec![(0.0, 4.0), (0.0, 4.0), (4.0, 4.0)], 1)]
    fn ranges_stay_disjoint_and_sorted(
        #[case] arrivals: Vec<(f64, f64)>,
        #[case] expected_ranges: usize,
    ) {
        let mut buffer = BufferState::new();
        for (start, duration) in arrivals {
            buffer.push_range(start, duration);
            assert_disjoint_sorted(&buffer);
        }
        assert_eq!(buffer.loaded().len(), expected_ranges);
    }

    #[test]
    fn occupancy_counts_content_ahead_of_playhead() {
        let mut buffer = BufferState::new();
        buffer.push_range(0.0, 10.0);
        buffer.push_range(10.0, 10.0);
        assert!((buffer.occupancy_secs() - 20.0).abs() < 1e-6);

        buffer.advance(5.0, false);
        assert!((buffer.occupancy_secs() - 15.0).abs() < 1e-6);
        assert!((buffer.playhead_secs() - 5.0).abs() < 1e-6);
        assert!(!buffer.is_stalled());
    }

    #[test]
    fn starvation_counts_one_stall_per_episode() {
        let mut buffer = BufferState::new();
        buffer.push_range(0.0, 4.0);

        // Consumes the 4 s of content, then starves.
        let edge = buffer.advance(6.0, false);
        assert_eq!(edge, Some(StallEdge::Started));
        assert!(buffer.is_stalled());
        assert_eq!(buffer.stall_count(), 1);

        // Still starved on following ticks: no further increments.
        assert_eq!(buffer.advance(2.0, false), None);
        assert_eq!(buffer.advance(2.0, false), None);
        assert_eq!(buffer.stall_count(), 1);

        // Content arrives; the episode ends.
        buffer.push_range(4.0, 10.0);
        let edge = buffer.advance(1.0, false);
        assert_eq!(edge, Some(StallEdge::Ended));
        assert!(!buffer.is_stalled());
        assert_eq!(buffer.stall_count(), 1);

        // A second episode increments again.
        let edge = buffer.advance(60.0, false);
        assert_eq!(edge, Some(StallEdge::Started));
        assert_eq!(buffer.stall_count(), 2);
    }

    #[test]
    fn stall_count_is_monotonic() {
        let mut buffer = BufferState::new();
        let mut last = 0;
        buffer.push_range(0.0, 1.0);
        for i in 0..50 {
            if i % 7 == 0 {
                buffer.push_range(i as f64, 1.5);
            }
            if i % 11 == 0 {
                buffer.record_stall();
            }
            buffer.advance(0.7, false);
            assert!(buffer.stall_count() >= last);
            last = buffer.stall_count();
        }
    }

    #[test]
    fn playback_jumps_over_skipped_segment_gap() {
        let mut buffer = BufferState::new();
        buffer.push_range(0.0, 4.0);
        // Segment covering [4, 8) failed; the next one landed.
        buffer.push_range(8.0, 4.0);

        let edge = buffer.advance(6.0, false);
        assert_eq!(edge, None);
        // 4 s consumed from the first range, 2 s from the second.
        assert!((buffer.playhead_secs() - 10.0).abs() < 1e-6);
        assert!(!buffer.is_stalled());
    }

    #[test]
    fn draining_at_end_of_stream_is_not_a_stall() {
        let mut buffer = BufferState::new();
        buffer.push_range(0.0, 4.0);

        let edge = buffer.advance(10.0, true);
        assert_eq!(edge, None);
        assert!(!buffer.is_stalled());
        assert_eq!(buffer.stall_count(), 0);
        assert!(buffer.occupancy_secs() < 1e-6);
    }

    #[test]
    fn external_stalls_accumulate() {
        let mut buffer = BufferState::new();
        buffer.record_stall();
        buffer.record_stall();
        assert_eq!(buffer.stall_count(), 2);
    }
}
