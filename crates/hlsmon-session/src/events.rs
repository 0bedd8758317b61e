use std::time::Duration;

use hlsmon_abr::SwitchReason;
use tokio::sync::broadcast;

use crate::metrics::MetricsSnapshot;

/// Everything observable about a running session.
#[derive(Clone, Debug)]
pub enum SessionEvent {
    /// First segment landed; the stream is ready to play.
    Ready {
        variant_index: usize,
        resolution: Option<(u32, u32)>,
    },
    VariantSwitched {
        from: usize,
        to: usize,
        reason: SwitchReason,
    },
    SegmentCompleted {
        sequence: u64,
        bytes: u64,
        duration: Duration,
    },
    SegmentFailed {
        sequence: u64,
        error: String,
    },
    StallStarted {
        stall_count: u64,
    },
    StallEnded,
    /// Periodic aggregated metrics.
    Snapshot(MetricsSnapshot),
    StreamEnded,
    /// Unrecoverable failure; the session is stopping.
    FatalError {
        message: String,
    },
}

#[derive(Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventEmitter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub fn emit_ready(&self, variant_index: usize, resolution: Option<(u32, u32)>) {
        let _ = self.tx.send(SessionEvent::Ready {
            variant_index,
            resolution,
        });
    }

    pub fn emit_variant_switched(&self, from: usize, to: usize, reason: SwitchReason) {
        let _ = self.tx.send(SessionEvent::VariantSwitched { from, to, reason });
    }

    pub fn emit_segment_completed(&self, sequence: u64, bytes: u64, duration: Duration) {
        let _ = self.tx.send(SessionEvent::SegmentCompleted {
            sequence,
            bytes,
            duration,
        });
    }

    pub fn emit_segment_failed(&self, sequence: u64, error: &str) {
        let _ = self.tx.send(SessionEvent::SegmentFailed {
            sequence,
            error: error.to_string(),
        });
    }

    pub fn emit_stall_started(&self, stall_count: u64) {
        let _ = self.tx.send(SessionEvent::StallStarted { stall_count });
    }

    pub fn emit_stall_ended(&self) {
        let _ = self.tx.send(SessionEvent::StallEnded);
    }

    pub fn emit_snapshot(&self, snapshot: MetricsSnapshot) {
        let _ = self.tx.send(SessionEvent::Snapshot(snapshot));
    }

    pub fn emit_stream_ended(&self) {
        let _ = self.tx.send(SessionEvent::StreamEnded);
    }

    pub fn emit_fatal(&self, message: String) {
        let _ = self.tx.send(SessionEvent::FatalError { message });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_receives_emitted_events() {
        let emitter = EventEmitter::new(8);
        let mut rx = emitter.subscribe();

        emitter.emit_stream_ended();

        let event = rx.try_recv().ok();
        assert!(matches!(event, Some(SessionEvent::StreamEnded)));
    }

    #[test]
    fn events_without_subscribers_are_dropped_silently() {
        let emitter = EventEmitter::new(8);
        emitter.emit_stall_started(1);
        emitter.emit_stall_ended();
    }
}
