//! Console rendering of session events and metrics snapshots.
//!
//! Pure formatting over [`MetricsSnapshot`]; the only state is the previous
//! snapshot, used to highlight changes between ticks.

use hlsmon_session::{MetricsSnapshot, SessionEvent, StreamDuration};

pub mod style {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const CYAN: &str = "\x1b[36m";
}

const SEPARATOR: &str = "──────────────────";
const LABEL_WIDTH: usize = 12;

pub struct ConsoleReporter {
    previous: Option<MetricsSnapshot>,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self { previous: None }
    }

    /// Render one session event to stdout.
    pub fn handle(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::Ready { .. } => {
                println!("{}Stream ready to play{}", style::GREEN, style::RESET);
            }
            SessionEvent::VariantSwitched { from, to, reason } => {
                println!(
                    "{}Quality switch: variant {from} -> {to} ({reason:?}){}",
                    style::CYAN,
                    style::RESET
                );
            }
            SessionEvent::SegmentFailed { sequence, error } => {
                println!(
                    "{}Segment {sequence} failed: {error}{}",
                    style::RED,
                    style::RESET
                );
            }
            SessionEvent::StallStarted { stall_count } => {
                println!(
                    "{}Playback stalled (stall #{stall_count}){}",
                    style::YELLOW,
                    style::RESET
                );
            }
            SessionEvent::StallEnded => {
                println!("{}Playback resumed{}", style::GREEN, style::RESET);
            }
            SessionEvent::Snapshot(snapshot) => {
                print!("{}", self.format_block(snapshot));
                self.previous = Some(snapshot.clone());
            }
            SessionEvent::StreamEnded => {
                println!("{}Stream ended{}", style::YELLOW, style::RESET);
            }
            SessionEvent::FatalError { message } => {
                println!("{}Error: {message}{}", style::RED, style::RESET);
            }
            SessionEvent::SegmentCompleted { .. } => {}
        }
    }

    /// The fixed-width metrics block.
    pub fn format_block(&self, snapshot: &MetricsSnapshot) -> String {
        let stalls_grew = self
            .previous
            .as_ref()
            .is_some_and(|prev| snapshot.stall_count > prev.stall_count);

        let mut out = String::new();
        out.push_str(&format!(
            "\n{}{}▶️  HLS Metrics{}\n",
            style::CYAN,
            style::BOLD,
            style::RESET
        ));
        out.push_str(SEPARATOR);
        out.push('\n');

        push_line(
            &mut out,
            "Time",
            &snapshot.captured_at.format("%H:%M:%S").to_string(),
            None,
        );
        push_line(
            &mut out,
            "Position",
            &format!("{:.2}s", snapshot.position_secs),
            None,
        );
        push_line(
            &mut out,
            "Duration",
            &match snapshot.duration {
                StreamDuration::Vod(total) => format!("{total:.2}s"),
                StreamDuration::Live => "live".to_string(),
            },
            None,
        );
        push_line(
            &mut out,
            "Quality",
            &snapshot
                .resolution
                .map(|(w, h)| format!("{w}x{h}"))
                .unwrap_or_else(|| "unknown".to_string()),
            None,
        );
        push_line(&mut out, "Indicated", &fmt_mbps_u64(snapshot.indicated_bps), None);
        push_line(&mut out, "Observed", &fmt_mbps_f64(snapshot.observed_bps), None);
        push_line(
            &mut out,
            "Buffer",
            &format!("{:.1}s", snapshot.buffer_secs),
            None,
        );
        push_line(
            &mut out,
            "Stalls",
            &snapshot.stall_count.to_string(),
            stalls_grew.then_some(style::RED),
        );
        push_line(
            &mut out,
            "Dropped",
            &snapshot.missed_deadlines.to_string(),
            None,
        );
        push_line(
            &mut out,
            "Bytes",
            &format!("{:.2} MB", snapshot.bytes_transferred as f64 / 1_000_000.0),
            None,
        );
        push_line(&mut out, "Transfer", &fmt_mbps_f64(snapshot.transfer_bps), None);
        push_line(
            &mut out,
            "Empty",
            yes_no(snapshot.buffer_empty),
            snapshot.buffer_empty.then_some(style::YELLOW),
        );
        push_line(&mut out, "KeepUp", yes_no(snapshot.likely_to_keep_up), None);

        out.push_str(SEPARATOR);
        out.push('\n');
        out
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn push_line(out: &mut String, label: &str, value: &str, color: Option<&str>) {
    match color {
        Some(color) => out.push_str(&format!(
            "{label:<LABEL_WIDTH$}: {color}{value}{}\n",
            style::RESET
        )),
        None => out.push_str(&format!("{label:<LABEL_WIDTH$}: {value}\n")),
    }
}

fn fmt_mbps_u64(bps: Option<u64>) -> String {
    match bps {
        Some(bps) => format!("{:.2} Mbps", bps as f64 / 1_000_000.0),
        None => "n/a".to_string(),
    }
}

fn fmt_mbps_f64(bps: Option<f64>) -> String {
    match bps {
        Some(bps) => format!("{:.2} Mbps", bps / 1_000_000.0),
        None => "n/a".to_string(),
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

#[cfg(test)]
mod tests {
    use chrono::Local;
    use hlsmon_session::StreamDuration;

    use super::*;

    fn snapshot() -> MetricsSnapshot {
        MetricsSnapshot {
            captured_at: Local::now(),
            position_secs: 12.34,
            duration: StreamDuration::Vod(300.0),
            resolution: Some((1920, 1080)),
            indicated_bps: Some(4_500_000),
            observed_bps: Some(4_120_000.0),
            buffer_secs: 8.0,
            stall_count: 0,
            missed_deadlines: 0,
            bytes_transferred: 3_210_000,
            transfer_bps: Some(5_600_000.0),
            buffer_empty: false,
            likely_to_keep_up: true,
        }
    }

    #[test]
    fn block_carries_every_labelled_field() {
        let reporter = ConsoleReporter::new();
        let block = reporter.format_block(&snapshot());

        assert!(block.contains("HLS Metrics"));
        assert!(block.contains("Position    : 12.34s"));
        assert!(block.contains("Duration    : 300.00s"));
        assert!(block.contains("Quality     : 1920x1080"));
        assert!(block.contains("Indicated   : 4.50 Mbps"));
        assert!(block.contains("Observed    : 4.12 Mbps"));
        assert!(block.contains("Buffer      : 8.0s"));
        assert!(block.contains("Stalls      : 0"));
        assert!(block.contains("Dropped     : 0"));
        assert!(block.contains("Bytes       : 3.21 MB"));
        assert!(block.contains("Transfer    : 5.60 Mbps"));
        assert!(block.contains("Empty       : No"));
        assert!(block.contains("KeepUp      : Yes"));
    }

    #[test]
    fn live_stream_uses_the_live_sentinel() {
        let reporter = ConsoleReporter::new();
        let mut snap = snapshot();
        snap.duration = StreamDuration::Live;
        snap.indicated_bps = None;
        snap.observed_bps = None;

        let block = reporter.format_block(&snap);
        assert!(block.contains("Duration    : live"));
        assert!(block.contains("Indicated   : n/a"));
        assert!(block.contains("Observed    : n/a"));
    }

    #[test]
    fn stall_growth_colors_the_stalls_line() {
        let mut reporter = ConsoleReporter::new();
        reporter.handle(&SessionEvent::Snapshot(snapshot()));

        let mut snap = snapshot();
        snap.stall_count = 2;
        let block = reporter.format_block(&snap);
        assert!(block.contains(&format!("{}2{}", style::RED, style::RESET)));
    }
}
