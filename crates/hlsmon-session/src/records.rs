//! In-memory download-record log.
//!
//! The functional analogue of a player framework's access log: one record
//! per completed segment fetch, capped and time-ordered.

use std::{collections::VecDeque, time::Duration};

use tokio::time::Instant;

/// One completed segment transfer.
#[derive(Clone, Copy, Debug)]
pub struct DownloadRecord {
    pub sequence: u64,
    pub variant_index: usize,
    pub bytes: u64,
    pub started_at: Instant,
    pub finished_at: Instant,
    pub http_status: u16,
}

impl DownloadRecord {
    pub fn duration(&self) -> Duration {
        self.finished_at.duration_since(self.started_at)
    }
}

/// Capped, append-only log of [`DownloadRecord`]s.
///
/// Cumulative byte/transfer counters survive eviction of old records.
#[derive(Clone, Debug)]
pub struct DownloadLog {
    records: VecDeque<DownloadRecord>,
    cap: usize,
    total_bytes: u64,
    total_transfer: Duration,
}

impl DownloadLog {
    pub fn new(cap: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(cap.min(64)),
            cap: cap.max(1),
            total_bytes: 0,
            total_transfer: Duration::ZERO,
        }
    }

    pub fn push(&mut self, record: DownloadRecord) {
        self.total_bytes += record.bytes;
        self.total_transfer += record.duration();
        if self.records.len() == self.cap {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&DownloadRecord> {
        self.records.back()
    }

    /// Observed bitrate over the most recent `window` records, in bits/s.
    pub fn observed_bps(&self, window: usize) -> Option<f64> {
        let start = self.records.len().saturating_sub(window);
        let mut bytes = 0u64;
        let mut secs = 0f64;
        for record in self.records.iter().skip(start) {
            bytes += record.bytes;
            secs += record.duration().as_secs_f64();
        }
        if secs > 0.0 {
            Some(bytes as f64 * 8.0 / secs)
        } else {
            None
        }
    }

    /// Cumulative bytes transferred for the session.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Session-cumulative transfer rate in bits/s: total bytes over total
    /// time spent on the wire.
    pub fn transfer_bps(&self) -> Option<f64> {
        let secs = self.total_transfer.as_secs_f64();
        if secs > 0.0 {
            Some(self.total_bytes as f64 * 8.0 / secs)
        } else {
            None
        }
    }
}
