//! Per-interval metrics aggregation.

use chrono::{DateTime, Local};
use tokio::time::Instant;

use crate::{buffer::StallEdge, state::SharedState};

/// Session lifecycle phase.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionPhase {
    /// Before the first successful segment download.
    Connecting,
    /// Steady state: snapshots are produced on every tick.
    Monitoring,
    /// Explicit shutdown, stream end or unrecoverable manifest error.
    Stopped,
}

/// Total stream duration, when known.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StreamDuration {
    Vod(f64),
    Live,
}

/// Read-only view over the session state at one reporting tick.
///
/// Derived, never persisted; recomputed each interval from the download
/// log and the buffer model.
#[derive(Clone, Debug)]
pub struct MetricsSnapshot {
    pub captured_at: DateTime<Local>,
    pub position_secs: f64,
    pub duration: StreamDuration,
    pub resolution: Option<(u32, u32)>,
    /// Advertised bandwidth of the active variant.
    pub indicated_bps: Option<u64>,
    /// Measured rate over the recent download window.
    pub observed_bps: Option<f64>,
    pub buffer_secs: f64,
    pub stall_count: u64,
    /// Segments whose download took longer than their media duration.
    pub missed_deadlines: u64,
    pub bytes_transferred: u64,
    /// Session-cumulative wire rate.
    pub transfer_bps: Option<f64>,
    pub buffer_empty: bool,
    pub likely_to_keep_up: bool,
}

/// Records whose observed window feeds the observed-bitrate figure.
const OBSERVED_WINDOW: usize = 10;

/// Occupancy below this is an empty buffer (absorbs float residue from
/// playback-clock arithmetic).
const EMPTY_EPS_SECS: f64 = 1e-9;

/// Outcome of one aggregation tick.
pub(crate) struct TickOutcome {
    pub snapshot: Option<MetricsSnapshot>,
    pub stall_edge: Option<StallEdge>,
    /// The stream is fully downloaded and fully played out.
    pub finished: bool,
}

/// Advance the playback clock and compute the tick's snapshot.
///
/// Produces no snapshot while connecting. Must run under the state lock so
/// counters and timestamps are taken together.
pub(crate) fn sample(
    state: &mut SharedState,
    now: Instant,
    keep_up_buffer_secs: f64,
) -> TickOutcome {
    if state.phase != SessionPhase::Monitoring {
        return TickOutcome {
            snapshot: None,
            stall_edge: None,
            finished: false,
        };
    }

    let elapsed = state
        .last_tick
        .map(|t| now.duration_since(t).as_secs_f64())
        .unwrap_or(0.0);
    state.last_tick = Some(now);

    let at_end = state.download_complete;
    let stall_edge = state.buffer.advance(elapsed, at_end);

    let occupancy = state.buffer.occupancy_secs();
    let observed = state.log.observed_bps(OBSERVED_WINDOW);
    let indicated = state.active.bandwidth_bps;

    let buffer_empty = state.buffer.is_stalled() || occupancy <= EMPTY_EPS_SECS;
    let likely_to_keep_up = !state.buffer.is_stalled()
        && (occupancy >= keep_up_buffer_secs
            || matches!((observed, indicated), (Some(o), Some(i)) if o >= i as f64));

    let snapshot = MetricsSnapshot {
        captured_at: Local::now(),
        position_secs: state.buffer.playhead_secs(),
        duration: match state.stream_duration_secs {
            Some(total) => StreamDuration::Vod(total),
            None => StreamDuration::Live,
        },
        resolution: state.active.resolution,
        indicated_bps: indicated,
        observed_bps: observed,
        buffer_secs: occupancy,
        stall_count: state.buffer.stall_count(),
        missed_deadlines: state.missed_deadlines,
        bytes_transferred: state.log.total_bytes(),
        transfer_bps: state.log.transfer_bps(),
        buffer_empty,
        likely_to_keep_up,
    };

    let finished = at_end && occupancy <= EMPTY_EPS_SECS;
    if finished {
        state.phase = SessionPhase::Stopped;
    }

    TickOutcome {
        snapshot: Some(snapshot),
        stall_edge,
        finished,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        records::DownloadRecord,
        state::{ActiveVariant, SharedState},
    };

    fn monitoring_state() -> SharedState {
        let mut state = SharedState::for_tests();
        state.phase = SessionPhase::Monitoring;
        state.active = ActiveVariant {
            index: 0,
            bandwidth_bps: Some(1_280_000),
            resolution: Some((854, 480)),
        };
        state
    }

    #[tokio::test]
    async fn no_snapshot_while_connecting() {
        let mut state = SharedState::for_tests();
        assert_eq!(state.phase, SessionPhase::Connecting);

        let outcome = sample(&mut state, Instant::now(), 3.0);
        assert!(outcome.snapshot.is_none());
        assert!(!outcome.finished);
    }

    #[tokio::test]
    async fn snapshot_reflects_buffer_and_log() {
        let mut state = monitoring_state();
        state.buffer.push_range(0.0, 10.0);
        state.buffer.push_range(10.0, 10.0);
        state.stream_duration_secs = Some(30.0);

        let started = Instant::now();
        state.log.push(DownloadRecord {
            sequence: 0,
            variant_index: 0,
            bytes: 400_000,
            started_at: started,
            finished_at: started + Duration::from_secs(1),
            http_status: 200,
        });

        let t0 = Instant::now();
        state.last_tick = Some(t0);
        let outcome = sample(&mut state, t0 + Duration::from_secs(2), 3.0);
        let snap = outcome.snapshot.unwrap();

        assert!((snap.position_secs - 2.0).abs() < 1e-6);
        assert!((snap.buffer_secs - 18.0).abs() < 1e-6);
        assert_eq!(snap.duration, StreamDuration::Vod(30.0));
        assert_eq!(snap.resolution, Some((854, 480)));
        assert_eq!(snap.indicated_bps, Some(1_280_000));
        assert!((snap.observed_bps.unwrap() - 3_200_000.0).abs() < 1.0);
        assert_eq!(snap.bytes_transferred, 400_000);
        assert_eq!(snap.stall_count, 0);
        assert!(!snap.buffer_empty);
        assert!(snap.likely_to_keep_up);
        assert!(!outcome.finished);
    }

    #[tokio::test]
    async fn starved_tick_reports_empty_buffer_and_stall() {
        let mut state = monitoring_state();
        state.buffer.push_range(0.0, 1.0);

        let t0 = Instant::now();
        state.last_tick = Some(t0);
        let outcome = sample(&mut state, t0 + Duration::from_secs(4), 3.0);
        let snap = outcome.snapshot.unwrap();

        assert_eq!(outcome.stall_edge, Some(StallEdge::Started));
        assert_eq!(snap.stall_count, 1);
        assert!(snap.buffer_empty);
        assert!(!snap.likely_to_keep_up);
    }

    #[tokio::test]
    async fn playout_of_completed_download_finishes_session() {
        let mut state = monitoring_state();
        state.buffer.push_range(0.0, 2.0);
        state.download_complete = true;
        state.stream_duration_secs = Some(2.0);

        let t0 = Instant::now();
        state.last_tick = Some(t0);
        let outcome = sample(&mut state, t0 + Duration::from_secs(3), 3.0);

        assert!(outcome.finished);
        assert_eq!(outcome.stall_edge, None);
        assert_eq!(state.phase, SessionPhase::Stopped);
        let snap = outcome.snapshot.unwrap();
        assert_eq!(snap.stall_count, 0);

        // Further ticks produce nothing.
        let outcome = sample(&mut state, t0 + Duration::from_secs(5), 3.0);
        assert!(outcome.snapshot.is_none());
    }
}
